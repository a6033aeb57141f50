use crate::primitives::{SIZE_VOFFSET, Slot, VOffset, read_scalar_at};

/// A view of a vtable: `[vtable bytes: u16][table bytes: u16][field offset: u16]*`.
///
/// Entries past the end of the vtable belong to fields the writer did not know about, or did
/// not write, and read as absent.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VTable<'buf> {
    buf: &'buf [u8],
    loc: usize,
}

impl<'buf> VTable<'buf> {
    /// View the vtable starting at `loc`.
    #[inline]
    pub fn new(buf: &'buf [u8], loc: usize) -> Self {
        Self { buf, loc }
    }

    /// Absolute position of the vtable.
    pub fn loc(&self) -> usize {
        self.loc
    }

    /// Size of the vtable in bytes, including its two header entries.
    #[inline]
    pub fn num_bytes(&self) -> usize {
        read_scalar_at::<VOffset>(self.buf, self.loc) as usize
    }

    /// Number of field entries.
    pub fn num_fields(&self) -> usize {
        (self.num_bytes() / SIZE_VOFFSET).saturating_sub(2)
    }

    /// Inline size in bytes of the table this vtable describes.
    #[inline]
    pub fn table_size(&self) -> usize {
        read_scalar_at::<VOffset>(self.buf, self.loc + SIZE_VOFFSET) as usize
    }

    /// Offset of `slot`'s data from the table start, or 0 if the field is absent.
    #[inline]
    pub fn get(&self, slot: Slot) -> VOffset {
        let entry = slot.entry_offset();
        if entry >= self.num_bytes() {
            return 0;
        }
        read_scalar_at::<VOffset>(self.buf, self.loc + entry)
    }

    /// The raw bytes of the vtable.
    pub fn as_bytes(&self) -> &'buf [u8] {
        &self.buf[self.loc..self.loc + self.num_bytes()]
    }
}
