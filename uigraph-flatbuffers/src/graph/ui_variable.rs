use std::fmt::{Debug, Formatter};

use uigraph_error::UiGraphResult;

use crate::graph::{DType, FlatArray, FlatArrayOffset, IntPair, IntPairOffset, VarType};
use crate::{
    Follow, Offset, SIZE_UOFFSET, Slot, Table, TableBuilder, TableOffset, TableWriter, Vector,
    Verifiable, Verifier, root, root_unchecked, size_prefixed_root,
};

pub enum UiVariableOffset {}

impl TableOffset for UiVariableOffset {}

/// One variable of a computation graph, as shown by the UI.
///
/// Every field is optional. Absent scalars read as their zero default, absent strings and tables
/// as `None`, and absent vectors as `None` with a length of 0.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct UiVariable<'buf> {
    tab: Table<'buf>,
}

impl<'buf> UiVariable<'buf> {
    pub const VT_ID: Slot = Slot::new(0);
    pub const VT_NAME: Slot = Slot::new(1);
    pub const VT_TYPE: Slot = Slot::new(2);
    pub const VT_DATATYPE: Slot = Slot::new(3);
    pub const VT_SHAPE: Slot = Slot::new(4);
    pub const VT_CONTROL_DEPS: Slot = Slot::new(5);
    pub const VT_OUTPUT_OF_OP: Slot = Slot::new(6);
    pub const VT_INPUTS_FOR_OP: Slot = Slot::new(7);
    pub const VT_CONTROL_DEPS_FOR_OP: Slot = Slot::new(8);
    pub const VT_CONTROL_DEPS_FOR_VAR: Slot = Slot::new(9);
    pub const VT_GRADIENT_VARIABLE: Slot = Slot::new(10);
    pub const VT_UI_LABEL_EXTRA: Slot = Slot::new(11);
    pub const VT_CONSTANT_VALUE: Slot = Slot::new(12);
    pub const FIELD_COUNT: u16 = 13;

    #[inline]
    pub fn init_from_table(table: Table<'buf>) -> Self {
        Self { tab: table }
    }

    /// The underlying table, for presence queries through [`Table::is_present`].
    pub fn as_table(&self) -> Table<'buf> {
        self.tab
    }

    pub fn create(fbb: &mut TableBuilder, args: &UiVariableArgs) -> Offset<UiVariableOffset> {
        let mut builder = UiVariableBuilder::new(fbb);
        if let Some(x) = args.constant_value {
            builder.add_constant_value(x);
        }
        if let Some(x) = args.ui_label_extra {
            builder.add_ui_label_extra(x);
        }
        if let Some(x) = args.gradient_variable {
            builder.add_gradient_variable(x);
        }
        if let Some(x) = args.control_deps_for_var {
            builder.add_control_deps_for_var(x);
        }
        if let Some(x) = args.control_deps_for_op {
            builder.add_control_deps_for_op(x);
        }
        if let Some(x) = args.inputs_for_op {
            builder.add_inputs_for_op(x);
        }
        if let Some(x) = args.output_of_op {
            builder.add_output_of_op(x);
        }
        if let Some(x) = args.control_deps {
            builder.add_control_deps(x);
        }
        if let Some(x) = args.shape {
            builder.add_shape(x);
        }
        if let Some(x) = args.name {
            builder.add_name(x);
        }
        if let Some(x) = args.id {
            builder.add_id(x);
        }
        builder.add_datatype(args.datatype);
        builder.add_type_(args.type_);
        builder.finish()
    }

    #[inline]
    pub fn id(&self) -> Option<IntPair<'buf>> {
        self.tab
            .nested_table(Self::VT_ID)
            .map(IntPair::init_from_table)
    }

    #[inline]
    pub fn name(&self) -> Option<&'buf str> {
        self.tab.string(Self::VT_NAME)
    }

    #[inline]
    pub fn type_(&self) -> VarType {
        VarType(self.tab.scalar::<i8>(Self::VT_TYPE, 0))
    }

    #[inline]
    pub fn datatype(&self) -> DType {
        DType(self.tab.scalar::<i8>(Self::VT_DATATYPE, 0))
    }

    #[inline]
    pub fn shape(&self) -> Option<Vector<'buf, i64>> {
        self.tab.vector::<i64>(Self::VT_SHAPE)
    }

    #[inline]
    pub fn shape_len(&self) -> usize {
        self.tab.vector_len(Self::VT_SHAPE)
    }

    #[inline]
    pub fn control_deps(&self) -> Option<Vector<'buf, &'buf str>> {
        self.tab.vector::<&str>(Self::VT_CONTROL_DEPS)
    }

    #[inline]
    pub fn control_deps_len(&self) -> usize {
        self.tab.vector_len(Self::VT_CONTROL_DEPS)
    }

    /// Name of the op producing this variable.
    #[inline]
    pub fn output_of_op(&self) -> Option<&'buf str> {
        self.tab.string(Self::VT_OUTPUT_OF_OP)
    }

    /// Names of the ops consuming this variable.
    #[inline]
    pub fn inputs_for_op(&self) -> Option<Vector<'buf, &'buf str>> {
        self.tab.vector::<&str>(Self::VT_INPUTS_FOR_OP)
    }

    #[inline]
    pub fn inputs_for_op_len(&self) -> usize {
        self.tab.vector_len(Self::VT_INPUTS_FOR_OP)
    }

    #[inline]
    pub fn control_deps_for_op(&self) -> Option<Vector<'buf, &'buf str>> {
        self.tab.vector::<&str>(Self::VT_CONTROL_DEPS_FOR_OP)
    }

    #[inline]
    pub fn control_deps_for_op_len(&self) -> usize {
        self.tab.vector_len(Self::VT_CONTROL_DEPS_FOR_OP)
    }

    #[inline]
    pub fn control_deps_for_var(&self) -> Option<Vector<'buf, &'buf str>> {
        self.tab.vector::<&str>(Self::VT_CONTROL_DEPS_FOR_VAR)
    }

    #[inline]
    pub fn control_deps_for_var_len(&self) -> usize {
        self.tab.vector_len(Self::VT_CONTROL_DEPS_FOR_VAR)
    }

    #[inline]
    pub fn gradient_variable(&self) -> Option<&'buf str> {
        self.tab.string(Self::VT_GRADIENT_VARIABLE)
    }

    #[inline]
    pub fn ui_label_extra(&self) -> Option<&'buf str> {
        self.tab.string(Self::VT_UI_LABEL_EXTRA)
    }

    #[inline]
    pub fn constant_value(&self) -> Option<FlatArray<'buf>> {
        self.tab
            .nested_table(Self::VT_CONSTANT_VALUE)
            .map(FlatArray::init_from_table)
    }
}

impl<'buf> Follow<'buf> for UiVariable<'buf> {
    type Inner = UiVariable<'buf>;
    const WIDTH: usize = SIZE_UOFFSET;

    #[inline]
    fn follow(buf: &'buf [u8], loc: usize) -> Self::Inner {
        Self::init_from_table(Table::follow(buf, loc))
    }
}

impl Verifiable for UiVariable<'_> {
    const INLINE_WIDTH: usize = SIZE_UOFFSET;

    fn run_verifier(v: &mut Verifier<'_, '_>, pos: usize) -> UiGraphResult<()> {
        let table = v.deref_uoffset(pos)?;
        v.visit_table(table)?
            .visit_field::<IntPair<'_>>("id", Self::VT_ID, false)?
            .visit_field::<&str>("name", Self::VT_NAME, false)?
            .visit_field::<VarType>("type", Self::VT_TYPE, false)?
            .visit_field::<DType>("datatype", Self::VT_DATATYPE, false)?
            .visit_field::<Vector<'_, i64>>("shape", Self::VT_SHAPE, false)?
            .visit_field::<Vector<'_, &str>>("controlDeps", Self::VT_CONTROL_DEPS, false)?
            .visit_field::<&str>("outputOfOp", Self::VT_OUTPUT_OF_OP, false)?
            .visit_field::<Vector<'_, &str>>("inputsForOp", Self::VT_INPUTS_FOR_OP, false)?
            .visit_field::<Vector<'_, &str>>(
                "controlDepsForOp",
                Self::VT_CONTROL_DEPS_FOR_OP,
                false,
            )?
            .visit_field::<Vector<'_, &str>>(
                "controlDepsForVar",
                Self::VT_CONTROL_DEPS_FOR_VAR,
                false,
            )?
            .visit_field::<&str>("gradientVariable", Self::VT_GRADIENT_VARIABLE, false)?
            .visit_field::<&str>("uiLabelExtra", Self::VT_UI_LABEL_EXTRA, false)?
            .visit_field::<FlatArray<'_>>("constantValue", Self::VT_CONSTANT_VALUE, false)?
            .finish();
        Ok(())
    }
}

impl Debug for UiVariable<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UiVariable")
            .field("id", &self.id())
            .field("name", &self.name())
            .field("type", &self.type_())
            .field("datatype", &self.datatype())
            .field("shape", &self.shape())
            .field("control_deps", &self.control_deps())
            .field("output_of_op", &self.output_of_op())
            .field("inputs_for_op", &self.inputs_for_op())
            .field("control_deps_for_op", &self.control_deps_for_op())
            .field("control_deps_for_var", &self.control_deps_for_var())
            .field("gradient_variable", &self.gradient_variable())
            .field("ui_label_extra", &self.ui_label_extra())
            .field("constant_value", &self.constant_value())
            .finish()
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct UiVariableArgs {
    pub id: Option<Offset<IntPairOffset>>,
    pub name: Option<Offset<str>>,
    pub type_: VarType,
    pub datatype: DType,
    pub shape: Option<Offset<[i64]>>,
    pub control_deps: Option<Offset<[Offset<str>]>>,
    pub output_of_op: Option<Offset<str>>,
    pub inputs_for_op: Option<Offset<[Offset<str>]>>,
    pub control_deps_for_op: Option<Offset<[Offset<str>]>>,
    pub control_deps_for_var: Option<Offset<[Offset<str>]>>,
    pub gradient_variable: Option<Offset<str>>,
    pub ui_label_extra: Option<Offset<str>>,
    pub constant_value: Option<Offset<FlatArrayOffset>>,
}

pub struct UiVariableBuilder<'b> {
    table: TableWriter<'b>,
}

impl<'b> UiVariableBuilder<'b> {
    pub fn new(fbb: &'b mut TableBuilder) -> Self {
        Self {
            table: fbb.start_table(UiVariable::FIELD_COUNT),
        }
    }

    #[inline]
    pub fn add_id(&mut self, id: Offset<IntPairOffset>) {
        self.table.push_offset(UiVariable::VT_ID, id);
    }

    #[inline]
    pub fn add_name(&mut self, name: Offset<str>) {
        self.table.push_offset(UiVariable::VT_NAME, name);
    }

    #[inline]
    pub fn add_type_(&mut self, type_: VarType) {
        self.table
            .push_slot(UiVariable::VT_TYPE, type_, VarType::VARIABLE);
    }

    #[inline]
    pub fn add_datatype(&mut self, datatype: DType) {
        self.table
            .push_slot(UiVariable::VT_DATATYPE, datatype, DType::INHERIT);
    }

    #[inline]
    pub fn add_shape(&mut self, shape: Offset<[i64]>) {
        self.table.push_offset(UiVariable::VT_SHAPE, shape);
    }

    #[inline]
    pub fn add_control_deps(&mut self, control_deps: Offset<[Offset<str>]>) {
        self.table
            .push_offset(UiVariable::VT_CONTROL_DEPS, control_deps);
    }

    #[inline]
    pub fn add_output_of_op(&mut self, output_of_op: Offset<str>) {
        self.table
            .push_offset(UiVariable::VT_OUTPUT_OF_OP, output_of_op);
    }

    #[inline]
    pub fn add_inputs_for_op(&mut self, inputs_for_op: Offset<[Offset<str>]>) {
        self.table
            .push_offset(UiVariable::VT_INPUTS_FOR_OP, inputs_for_op);
    }

    #[inline]
    pub fn add_control_deps_for_op(&mut self, control_deps_for_op: Offset<[Offset<str>]>) {
        self.table
            .push_offset(UiVariable::VT_CONTROL_DEPS_FOR_OP, control_deps_for_op);
    }

    #[inline]
    pub fn add_control_deps_for_var(&mut self, control_deps_for_var: Offset<[Offset<str>]>) {
        self.table
            .push_offset(UiVariable::VT_CONTROL_DEPS_FOR_VAR, control_deps_for_var);
    }

    #[inline]
    pub fn add_gradient_variable(&mut self, gradient_variable: Offset<str>) {
        self.table
            .push_offset(UiVariable::VT_GRADIENT_VARIABLE, gradient_variable);
    }

    #[inline]
    pub fn add_ui_label_extra(&mut self, ui_label_extra: Offset<str>) {
        self.table
            .push_offset(UiVariable::VT_UI_LABEL_EXTRA, ui_label_extra);
    }

    #[inline]
    pub fn add_constant_value(&mut self, constant_value: Offset<FlatArrayOffset>) {
        self.table
            .push_offset(UiVariable::VT_CONSTANT_VALUE, constant_value);
    }

    pub fn finish(self) -> Offset<UiVariableOffset> {
        self.table.finish()
    }
}

/// Verify a buffer and return its root `UiVariable`.
#[inline]
pub fn root_as_ui_variable(buf: &[u8]) -> UiGraphResult<UiVariable<'_>> {
    root::<UiVariable<'_>>(buf)
}

/// Verify a size-prefixed buffer and return its root `UiVariable`.
#[inline]
pub fn size_prefixed_root_as_ui_variable(buf: &[u8]) -> UiGraphResult<UiVariable<'_>> {
    size_prefixed_root::<UiVariable<'_>>(buf)
}

/// Return the root `UiVariable` of a buffer without verifying it.
#[inline]
pub fn root_as_ui_variable_unchecked(buf: &[u8]) -> UiVariable<'_> {
    root_unchecked::<UiVariable<'_>>(buf)
}

#[inline]
pub fn finish_ui_variable_buffer(fbb: &mut TableBuilder, root: Offset<UiVariableOffset>) {
    fbb.finish(root);
}

#[inline]
pub fn finish_size_prefixed_ui_variable_buffer(
    fbb: &mut TableBuilder,
    root: Offset<UiVariableOffset>,
) {
    fbb.finish_size_prefixed(root, None);
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::graph::{ByteOrder, FlatArrayArgs, IntPairArgs};
    use crate::{BuilderOptions, TableMarker};

    fn conv1_kernel(fbb: &mut TableBuilder) -> Offset<UiVariableOffset> {
        let name = fbb.create_string("conv1/kernel");
        let shape = fbb.create_vector(&[3i64, 3, 64, 128]);
        let control_deps = fbb.create_vector_of_strings(&["init_op"]);
        let output_of_op = fbb.create_string("conv1/kernel/read");
        UiVariable::create(
            fbb,
            &UiVariableArgs {
                name: Some(name),
                type_: VarType(2),
                datatype: DType(3),
                shape: Some(shape),
                control_deps: Some(control_deps),
                output_of_op: Some(output_of_op),
                ..Default::default()
            },
        )
    }

    #[test]
    fn conv1_kernel_example() {
        let mut fbb = TableBuilder::new();
        let root = conv1_kernel(&mut fbb);
        finish_ui_variable_buffer(&mut fbb, root);

        let var = root_as_ui_variable(fbb.finished_data()).unwrap();
        assert_eq!(var.name(), Some("conv1/kernel"));
        assert_eq!(var.type_(), VarType::ARRAY);
        assert_eq!(var.datatype(), DType::HALF);
        assert_eq!(var.shape_len(), 4);
        assert_eq!(
            var.shape().unwrap().iter().collect::<Vec<_>>(),
            vec![3, 3, 64, 128]
        );
        assert_eq!(var.control_deps_len(), 1);
        assert_eq!(var.control_deps().unwrap().get(0), "init_op");
        assert_eq!(var.output_of_op(), Some("conv1/kernel/read"));
        assert_eq!(var.gradient_variable(), None);
        assert!(var.constant_value().is_none());
        assert!(var.id().is_none());
        assert_eq!(var.inputs_for_op_len(), 0);
    }

    #[test]
    fn nested_tables() {
        let mut fbb = TableBuilder::new();
        let id = IntPair::create(
            &mut fbb,
            &IntPairArgs {
                first: 7,
                second: -1,
            },
        );
        let data = fbb.create_byte_vector(&[0, 0, 128, 63]);
        let array = FlatArray::create(
            &mut fbb,
            &FlatArrayArgs {
                buffer: Some(data),
                dtype: DType::FLOAT,
                byte_order: ByteOrder::LE,
                ..Default::default()
            },
        );
        let root = UiVariable::create(
            &mut fbb,
            &UiVariableArgs {
                id: Some(id),
                type_: VarType::CONSTANT,
                constant_value: Some(array),
                ..Default::default()
            },
        );
        fbb.finish(root);

        let var = root_as_ui_variable(fbb.finished_data()).unwrap();
        let id = var.id().unwrap();
        assert_eq!((id.first(), id.second()), (7, -1));
        let array = var.constant_value().unwrap();
        assert_eq!(array.dtype(), DType::FLOAT);
        assert_eq!(array.buffer_bytes(), Some([0u8, 0, 128, 63].as_slice()));
        assert!(array.shape().is_none());
    }

    #[rstest]
    #[case(false)]
    #[case(true)]
    fn defaults_are_transparent(#[case] force_defaults: bool) {
        let mut fbb = TableBuilder::with_options(BuilderOptions {
            force_defaults,
            ..Default::default()
        });
        let root = UiVariable::create(
            &mut fbb,
            &UiVariableArgs {
                type_: VarType::VARIABLE,
                datatype: DType::INHERIT,
                ..Default::default()
            },
        );
        fbb.finish(root);

        let var = root_as_ui_variable(fbb.finished_data()).unwrap();
        assert_eq!(var.type_(), VarType::VARIABLE);
        assert_eq!(var.datatype(), DType::INHERIT);
        assert_eq!(
            var.as_table().is_present(UiVariable::VT_TYPE),
            force_defaults
        );
    }

    #[test]
    fn unknown_tags_survive() {
        let mut fbb = TableBuilder::new();
        let root = UiVariable::create(
            &mut fbb,
            &UiVariableArgs {
                type_: VarType(42),
                datatype: DType(-7),
                ..Default::default()
            },
        );
        fbb.finish(root);

        let var = root_as_ui_variable(fbb.finished_data()).unwrap();
        assert_eq!(var.type_(), VarType(42));
        assert_eq!(var.datatype(), DType(-7));
        assert!(format!("{var:?}").contains("<UNKNOWN 42>"));
    }

    #[test]
    fn newer_writer_extra_slot_is_ignored() {
        // A future schema appends a 14th field, here an i64.
        let extra = Slot::new(UiVariable::FIELD_COUNT);
        let mut fbb = TableBuilder::new();
        let name = fbb.create_string("dense/bias");
        let mut table = fbb.start_table(UiVariable::FIELD_COUNT + 1);
        table.push_slot::<i64>(extra, 99, 0);
        table.push_offset(UiVariable::VT_NAME, name);
        table.push_slot::<i8>(UiVariable::VT_DATATYPE, DType::FLOAT.0, 0);
        let root = table.finish::<TableMarker>();
        fbb.finish(root);
        let buf = fbb.finished_data();

        let var = root_as_ui_variable(buf).unwrap();
        assert_eq!(var.name(), Some("dense/bias"));
        assert_eq!(var.datatype(), DType::FLOAT);
        assert_eq!(var.as_table().scalar::<i64>(extra, 0), 99);
    }

    #[test]
    fn older_writer_reads_defaults() {
        // An older schema that stopped after `datatype`.
        let mut fbb = TableBuilder::new();
        let name = fbb.create_string("x");
        let mut table = fbb.start_table(4);
        table.push_offset(UiVariable::VT_NAME, name);
        table.push_slot::<i8>(UiVariable::VT_TYPE, VarType::PLACEHOLDER.0, 0);
        let root = table.finish::<TableMarker>();
        fbb.finish(root);

        let var = root_as_ui_variable(fbb.finished_data()).unwrap();
        assert_eq!(var.type_(), VarType::PLACEHOLDER);
        let num_fields = var.as_table().vtable().num_fields();
        assert!(num_fields < UiVariable::FIELD_COUNT as usize);
        assert_eq!(var.shape_len(), 0);
        assert!(var.control_deps_for_var().is_none());
        assert!(var.ui_label_extra().is_none());
        assert!(var.constant_value().is_none());
    }

    #[test]
    fn size_prefixed() {
        let mut fbb = TableBuilder::new();
        let root = conv1_kernel(&mut fbb);
        finish_size_prefixed_ui_variable_buffer(&mut fbb, root);

        let var = size_prefixed_root_as_ui_variable(fbb.finished_data()).unwrap();
        assert_eq!(var.name(), Some("conv1/kernel"));
    }

    #[test]
    fn unchecked_matches_verified() {
        let mut fbb = TableBuilder::new();
        let root = conv1_kernel(&mut fbb);
        fbb.finish(root);
        let buf = fbb.finished_data();

        let checked = root_as_ui_variable(buf).unwrap();
        let unchecked = root_as_ui_variable_unchecked(buf);
        assert_eq!(checked, unchecked);
        assert_eq!(format!("{checked:?}"), format!("{unchecked:?}"));
    }

    #[test]
    fn corrupted_string_vector_is_rejected() {
        let mut fbb = TableBuilder::new();
        let root = conv1_kernel(&mut fbb);
        fbb.finish(root);
        let mut buf = fbb.finished_data().to_vec();

        // Point the first control dependency far past the end of the buffer.
        let var = root_as_ui_variable_unchecked(&buf);
        let deps = var.control_deps().unwrap();
        let element = deps.loc() + SIZE_UOFFSET;
        buf[element..element + 4].copy_from_slice(&0x00FF_FFFFu32.to_le_bytes());

        let err = root_as_ui_variable(&buf).unwrap_err();
        assert!(err.to_string().contains("controlDeps"));
    }
}
