use std::ops::Deref;

use crate::{Alignment, ByteBuffer};

/// A [`ByteBuffer`] whose first byte is aligned to `A`, checked once on construction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConstByteBuffer<const A: usize>(ByteBuffer);

impl<const A: usize> ConstByteBuffer<A> {
    /// The alignment every buffer of this type has.
    pub const fn alignment() -> Alignment {
        Alignment::new(A)
    }

    /// Copy `values` into a new aligned buffer.
    pub fn copy_from(values: impl AsRef<[u8]>) -> Self {
        Self(ByteBuffer::copy_from_aligned(values, Self::alignment()))
    }
}

impl<const A: usize> Deref for ConstByteBuffer<A> {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        self.0.as_slice()
    }
}
