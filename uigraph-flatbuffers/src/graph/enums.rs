use std::fmt::{Debug, Formatter};

use uigraph_error::UiGraphResult;

use crate::{Follow, Primitive, Push, Verifiable, Verifier, read_scalar_at};

/// Declares a `byte` schema enum as a transparent newtype.
///
/// A newtype rather than a Rust enum keeps tags written by newer schemas readable: unknown values
/// are carried through untouched and print as `<UNKNOWN n>`.
macro_rules! flatbuffer_enum {
    (
        $(#[$meta:meta])*
        $name:ident { $($variant:ident = $value:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
        #[repr(transparent)]
        pub struct $name(pub i8);

        impl $name {
            $(pub const $variant: Self = Self($value);)+

            /// Every tag the schema declares, in declaration order.
            pub const ENUM_VALUES: &'static [Self] = &[$(Self::$variant),+];

            /// The declared name of this tag, `None` if the schema does not know it.
            pub fn variant_name(self) -> Option<&'static str> {
                match self {
                    $(Self::$variant => Some(stringify!($variant)),)+
                    _ => None,
                }
            }
        }

        impl Debug for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
                match self.variant_name() {
                    Some(name) => f.write_str(name),
                    None => write!(f, "<UNKNOWN {}>", self.0),
                }
            }
        }

        impl<'buf> Follow<'buf> for $name {
            type Inner = Self;
            const WIDTH: usize = 1;

            #[inline]
            fn follow(buf: &'buf [u8], loc: usize) -> Self::Inner {
                Self(read_scalar_at::<i8>(buf, loc))
            }
        }

        impl Push for $name {
            const SIZE: usize = 1;
            const ALIGNMENT: usize = 1;

            #[inline]
            fn push(&self, dst: &mut [u8], _written_len: usize) {
                self.0.write_le(dst);
            }
        }

        impl Verifiable for $name {
            const INLINE_WIDTH: usize = 1;
            const IS_SCALAR: bool = true;

            #[inline]
            fn run_verifier(v: &mut Verifier<'_, '_>, pos: usize) -> UiGraphResult<()> {
                v.in_buffer::<i8>(pos)
            }
        }
    };
}

flatbuffer_enum!(
    /// The role a variable plays in the graph.
    VarType {
        VARIABLE = 0,
        CONSTANT = 1,
        ARRAY = 2,
        PLACEHOLDER = 3,
    }
);

flatbuffer_enum!(
    /// Element type of an array.
    DType {
        INHERIT = 0,
        BOOL = 1,
        FLOAT8 = 2,
        HALF = 3,
        HALF2 = 4,
        FLOAT = 5,
        DOUBLE = 6,
        INT8 = 7,
        INT16 = 8,
        INT32 = 9,
        INT64 = 10,
        UINT8 = 11,
        UINT16 = 12,
        UINT32 = 13,
        UINT64 = 14,
        QINT8 = 15,
        QINT16 = 16,
        BFLOAT16 = 17,
        UTF8 = 50,
        UTF16 = 51,
        UTF32 = 52,
    }
);

flatbuffer_enum!(
    /// Byte order of an array's raw data.
    ByteOrder {
        LE = 0,
        BE = 1,
    }
);

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(DType::BFLOAT16, "BFLOAT16")]
    #[case(DType::UTF8, "UTF8")]
    #[case(DType(18), "<UNKNOWN 18>")]
    #[case(DType(-1), "<UNKNOWN -1>")]
    fn debug_names(#[case] dtype: DType, #[case] expected: &str) {
        assert_eq!(format!("{dtype:?}"), expected);
    }

    #[test]
    fn declared_values() {
        assert_eq!(VarType::ENUM_VALUES.len(), 4);
        assert_eq!(DType::ENUM_VALUES.len(), 21);
        assert_eq!(VarType::default(), VarType::VARIABLE);
        assert_eq!(ByteOrder::BE.0, 1);
        assert_eq!(VarType(9).variant_name(), None);
    }
}
