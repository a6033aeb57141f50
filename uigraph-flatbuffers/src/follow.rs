use std::str;

use uigraph_error::uigraph_panic;

use crate::primitives::{Primitive, SIZE_UOFFSET, UOffset, follow_uoffset, read_scalar_at};

/// Decode a value of some wire type found at a position of the buffer.
///
/// Scalars are decoded in place. Strings and tables are stored as a [`UOffset`] to their data, so
/// following them costs one indirection.
pub trait Follow<'buf> {
    /// The decoded value, usually borrowing from the buffer.
    type Inner;

    /// Bytes occupied by one value inline in a table field or a vector element.
    const WIDTH: usize;

    /// Decode the value stored at `loc`.
    fn follow(buf: &'buf [u8], loc: usize) -> Self::Inner;
}

macro_rules! impl_follow_primitive {
    ($($T:ty),* $(,)?) => {
        $(
            impl<'buf> Follow<'buf> for $T {
                type Inner = $T;
                const WIDTH: usize = <$T as Primitive>::WIDTH;

                #[inline]
                fn follow(buf: &'buf [u8], loc: usize) -> Self::Inner {
                    read_scalar_at::<$T>(buf, loc)
                }
            }
        )*
    };
}

impl_follow_primitive!(bool, u8, i8, u16, i16, u32, i32, u64, i64, f32, f64);

impl<'buf> Follow<'buf> for &'buf str {
    type Inner = &'buf str;
    const WIDTH: usize = SIZE_UOFFSET;

    #[inline]
    fn follow(buf: &'buf [u8], loc: usize) -> Self::Inner {
        read_str(buf, follow_uoffset(buf, loc))
    }
}

/// Read the length-prefixed string whose prefix starts at `loc`.
///
/// ## Panics
///
/// Panics if the string runs past the end of the buffer or is not valid UTF-8. Buffers from
/// untrusted sources should be checked with the [`Verifier`](crate::Verifier) first.
pub fn read_str(buf: &[u8], loc: usize) -> &str {
    let len = read_scalar_at::<UOffset>(buf, loc) as usize;
    let start = loc + SIZE_UOFFSET;
    let bytes = &buf[start..start + len];
    str::from_utf8(bytes)
        .unwrap_or_else(|e| uigraph_panic!("string at {} is not valid UTF-8: {}", loc, e))
}
