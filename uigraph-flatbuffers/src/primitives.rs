//! Fixed-width scalars and the offset types of the wire format.

use std::fmt::Debug;

use uigraph_error::uigraph_panic;

/// An unsigned offset, relative to the position it is stored at. Always points forward.
pub type UOffset = u32;
/// A signed offset from a table to its vtable.
pub type SOffset = i32;
/// An offset stored inside a vtable, relative to the start of its table.
pub type VOffset = u16;

/// Width of a [`UOffset`] in bytes.
pub const SIZE_UOFFSET: usize = size_of::<UOffset>();
/// Width of a [`SOffset`] in bytes.
pub const SIZE_SOFFSET: usize = size_of::<SOffset>();
/// Width of a [`VOffset`] in bytes.
pub const SIZE_VOFFSET: usize = size_of::<VOffset>();
/// Length of the optional file identifier that follows the root offset.
pub const FILE_IDENTIFIER_LENGTH: usize = 4;
/// Largest buffer the format can address with signed 32-bit offsets.
pub const MAX_BUFFER_SIZE: usize = 0x7FFF_FFFF;

/// The declared position of a field within a table's schema.
///
/// Slots are assigned when the schema is authored and are never reused or reordered. Slot `n`
/// lives at byte `4 + 2n` of the vtable, after the vtable and table sizes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Slot(u16);

impl Slot {
    /// The last slot a vtable can hold, since the vtable's own length is a [`VOffset`].
    pub const MAX_INDEX: u16 = u16::MAX / 2 - 3;

    /// Slot for the field declared at `index`.
    pub const fn new(index: u16) -> Self {
        Self(index)
    }

    /// The declared index of this slot.
    pub const fn index(self) -> u16 {
        self.0
    }

    /// Byte offset of this slot's entry within a vtable, for any index.
    ///
    /// Readers compare this against the vtable length, so slots no vtable could hold read as
    /// absent.
    #[inline]
    pub const fn entry_offset(self) -> usize {
        (self.0 as usize + 2) * SIZE_VOFFSET
    }

    /// Byte offset of this slot's entry as written into a vtable.
    ///
    /// ## Panics
    ///
    /// Panics if the index is past [`Slot::MAX_INDEX`].
    pub const fn voffset(self) -> VOffset {
        assert!(self.0 <= Self::MAX_INDEX, "slot does not fit a vtable");
        (self.0 + 2) * 2
    }
}

/// A fixed-width value stored little-endian, inline in a table or vector.
pub trait Primitive: Copy + PartialEq + Debug + 'static {
    /// Width of the value in bytes, which is also its alignment.
    const WIDTH: usize;

    /// Decode from the first [`Self::WIDTH`] bytes of `bytes`.
    fn from_le_slice(bytes: &[u8]) -> Self;

    /// Encode into the first [`Self::WIDTH`] bytes of `dst`.
    fn write_le(self, dst: &mut [u8]);
}

macro_rules! impl_primitive {
    ($($T:ty),* $(,)?) => {
        $(
            impl Primitive for $T {
                const WIDTH: usize = size_of::<$T>();

                #[inline]
                fn from_le_slice(bytes: &[u8]) -> Self {
                    let mut raw = [0u8; size_of::<$T>()];
                    raw.copy_from_slice(&bytes[..size_of::<$T>()]);
                    <$T>::from_le_bytes(raw)
                }

                #[inline]
                fn write_le(self, dst: &mut [u8]) {
                    dst[..size_of::<$T>()].copy_from_slice(&self.to_le_bytes());
                }
            }
        )*
    };
}

impl_primitive!(u8, i8, u16, i16, u32, i32, u64, i64, f32, f64);

impl Primitive for bool {
    const WIDTH: usize = 1;

    #[inline]
    fn from_le_slice(bytes: &[u8]) -> Self {
        bytes[0] != 0
    }

    #[inline]
    fn write_le(self, dst: &mut [u8]) {
        dst[0] = u8::from(self);
    }
}

/// Read a scalar at an absolute position of the buffer.
///
/// ## Panics
///
/// Panics if the value does not fit inside the buffer.
#[inline]
pub fn read_scalar_at<T: Primitive>(buf: &[u8], loc: usize) -> T {
    T::from_le_slice(&buf[loc..loc + T::WIDTH])
}

/// Write a scalar at an absolute position of the buffer.
#[inline]
pub fn emplace_scalar<T: Primitive>(buf: &mut [u8], loc: usize, value: T) {
    value.write_le(&mut buf[loc..loc + T::WIDTH]);
}

/// Read a [`UOffset`] at `loc` and return the absolute position it points to.
#[inline]
pub fn follow_uoffset(buf: &[u8], loc: usize) -> usize {
    loc + read_scalar_at::<UOffset>(buf, loc) as usize
}

/// Convert a buffer length or position into a [`UOffset`].
///
/// ## Panics
///
/// Panics if the value does not fit the format's 2 GiB limit.
#[inline]
pub(crate) fn to_uoffset(n: usize) -> UOffset {
    if n > MAX_BUFFER_SIZE {
        uigraph_panic!("flatbuffer of {} bytes exceeds the 2GiB format limit", n);
    }
    UOffset::try_from(n).unwrap_or_else(|_| uigraph_panic!("{} does not fit a uoffset", n))
}
