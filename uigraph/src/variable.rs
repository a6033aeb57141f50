use crate::{DType, FlatArray, IntPair, VarType};

/// A variable of a computation graph, with everything a UI needs to draw and link it.
///
/// Strings distinguish absent (`None`) from empty (`Some("")`). Lists do not: an empty list is
/// not written, and an absent list reads back empty.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UiVariable {
    /// Identity of the variable in the graph.
    pub id: Option<IntPair>,
    /// Unique name, such as `conv1/kernel`.
    pub name: Option<String>,
    /// Role of the variable.
    pub var_type: VarType,
    /// Element type.
    pub datatype: DType,
    /// Static shape. Empty when unknown or scalar.
    pub shape: Vec<i64>,
    /// Names of the variables this one must wait on.
    pub control_deps: Vec<String>,
    /// The op that produces this variable.
    pub output_of_op: Option<String>,
    /// Ops consuming this variable as an input.
    pub inputs_for_op: Vec<String>,
    /// Ops with a control dependency on this variable.
    pub control_deps_for_op: Vec<String>,
    /// Variables with a control dependency on this variable.
    pub control_deps_for_var: Vec<String>,
    /// Name of the variable holding this variable's gradient.
    pub gradient_variable: Option<String>,
    /// Extra text shown beside the variable's label.
    pub ui_label_extra: Option<String>,
    /// The value of a constant.
    pub constant_value: Option<FlatArray>,
}

impl UiVariable {
    /// Create a variable with the given name and type, leaving everything else unset.
    pub fn new(name: impl Into<String>, var_type: VarType) -> Self {
        Self {
            name: Some(name.into()),
            var_type,
            ..Default::default()
        }
    }

    /// The rank of the variable, which is zero when the shape is unknown.
    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    /// Whether the variable carries a constant value.
    pub fn is_constant(&self) -> bool {
        self.var_type == VarType::Constant || self.constant_value.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_sets_name_and_type() {
        let var = UiVariable::new("x", VarType::Placeholder);
        assert_eq!(var.name.as_deref(), Some("x"));
        assert_eq!(var.var_type, VarType::Placeholder);
        assert_eq!(var.datatype, DType::Inherit);
        assert_eq!(var.rank(), 0);
        assert!(!var.is_constant());
    }

    #[test]
    fn constants() {
        assert!(UiVariable::new("c", VarType::Constant).is_constant());

        let mut var = UiVariable::new("v", VarType::Variable);
        var.constant_value = Some(FlatArray::default());
        assert!(var.is_constant());
    }
}
