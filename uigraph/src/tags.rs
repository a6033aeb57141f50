use num_enum::FromPrimitive;

use crate::flatbuffers as fb;

/// Defines a model enum for a `byte` tag of the schema.
///
/// Tags outside the declared set decode to the `Unknown` variant, which keeps the raw value so
/// that re-serializing a variable never loses it.
macro_rules! tag_enum {
    (
        $(#[$meta:meta])*
        $name:ident (default = $default:ident) {
            $(
                $(#[$vmeta:meta])*
                $variant:ident = $value:literal,
            )+
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, FromPrimitive)]
        #[repr(i8)]
        pub enum $name {
            $(
                $(#[$vmeta])*
                $variant = $value,
            )+
            /// A tag this schema does not declare.
            #[num_enum(catch_all)]
            Unknown(i8),
        }

        impl Default for $name {
            fn default() -> Self {
                Self::$default
            }
        }

        impl From<$name> for i8 {
            fn from(value: $name) -> Self {
                match value {
                    $($name::$variant => $value,)+
                    $name::Unknown(tag) => tag,
                }
            }
        }

        impl From<fb::$name> for $name {
            fn from(value: fb::$name) -> Self {
                Self::from_primitive(value.0)
            }
        }

        impl From<$name> for fb::$name {
            fn from(value: $name) -> Self {
                Self(i8::from(value))
            }
        }
    };
}

tag_enum!(
    /// The role a variable plays in the graph.
    VarType (default = Variable) {
        /// A trainable variable.
        Variable = 0,
        /// A constant, whose value is usually attached.
        Constant = 1,
        /// The output array of an op.
        Array = 2,
        /// An input fed at execution time.
        Placeholder = 3,
    }
);

tag_enum!(
    /// Element type of a variable or array.
    DType (default = Inherit) {
        /// Inherit the data type from context.
        Inherit = 0,
        /// Boolean.
        Bool = 1,
        /// 8-bit float.
        Float8 = 2,
        /// IEEE 754 half precision.
        Half = 3,
        /// Two packed halves.
        Half2 = 4,
        /// IEEE 754 single precision.
        Float = 5,
        /// IEEE 754 double precision.
        Double = 6,
        /// Signed 8-bit integer.
        Int8 = 7,
        /// Signed 16-bit integer.
        Int16 = 8,
        /// Signed 32-bit integer.
        Int32 = 9,
        /// Signed 64-bit integer.
        Int64 = 10,
        /// Unsigned 8-bit integer.
        UInt8 = 11,
        /// Unsigned 16-bit integer.
        UInt16 = 12,
        /// Unsigned 32-bit integer.
        UInt32 = 13,
        /// Unsigned 64-bit integer.
        UInt64 = 14,
        /// Quantized 8-bit integer.
        QInt8 = 15,
        /// Quantized 16-bit integer.
        QInt16 = 16,
        /// bfloat16.
        BFloat16 = 17,
        /// UTF-8 strings.
        Utf8 = 50,
        /// UTF-16 strings.
        Utf16 = 51,
        /// UTF-32 strings.
        Utf32 = 52,
    }
);

tag_enum!(
    /// Byte order of an array's raw data.
    ByteOrder (default = Little) {
        /// Little endian.
        Little = 0,
        /// Big endian.
        Big = 1,
    }
);

impl DType {
    /// Width in bytes of one element, `None` for variable-width and unknown types.
    pub fn byte_width(&self) -> Option<usize> {
        match self {
            DType::Bool | DType::Float8 | DType::Int8 | DType::UInt8 | DType::QInt8 => Some(1),
            DType::Half | DType::BFloat16 | DType::Int16 | DType::UInt16 | DType::QInt16 => Some(2),
            DType::Half2 | DType::Float | DType::Int32 | DType::UInt32 => Some(4),
            DType::Double | DType::Int64 | DType::UInt64 => Some(8),
            DType::Inherit | DType::Utf8 | DType::Utf16 | DType::Utf32 | DType::Unknown(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(fb::DType::INHERIT, DType::Inherit)]
    #[case(fb::DType::BFLOAT16, DType::BFloat16)]
    #[case(fb::DType::UTF32, DType::Utf32)]
    #[case(fb::DType(18), DType::Unknown(18))]
    fn dtype_from_schema(#[case] tag: fb::DType, #[case] expected: DType) {
        assert_eq!(DType::from(tag), expected);
        assert_eq!(fb::DType::from(expected), tag);
    }

    #[test]
    fn unknown_tags_keep_their_value() {
        assert_eq!(VarType::from_primitive(-3), VarType::Unknown(-3));
        assert_eq!(i8::from(VarType::Unknown(-3)), -3);
        assert_eq!(i8::from(ByteOrder::Big), 1);
    }

    #[test]
    fn every_schema_tag_is_known() {
        for tag in fb::DType::ENUM_VALUES {
            assert!(!matches!(DType::from(*tag), DType::Unknown(_)));
        }
        for tag in fb::VarType::ENUM_VALUES {
            assert!(!matches!(VarType::from(*tag), VarType::Unknown(_)));
        }
    }

    #[test]
    fn widths() {
        assert_eq!(DType::Half.byte_width(), Some(2));
        assert_eq!(DType::Half2.byte_width(), Some(4));
        assert_eq!(DType::Utf8.byte_width(), None);
    }
}
