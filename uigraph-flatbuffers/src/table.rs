use std::fmt::{Debug, Formatter};

use uigraph_error::UiGraphExpect;

use crate::follow::{Follow, read_str};
use crate::primitives::{
    FILE_IDENTIFIER_LENGTH, Primitive, SIZE_UOFFSET, SOffset, Slot, UOffset, VOffset,
    follow_uoffset, read_scalar_at,
};
use crate::vector::Vector;
use crate::vtable::VTable;

/// A zero-copy view of one table inside a flatbuffer.
///
/// A `Table` is nothing more than a buffer and the position of the table's leading vtable
/// offset. Fields are decoded on request through the vtable; nothing is validated or copied up
/// front. Absent fields decode to their defaults: the caller-supplied value for scalars, and
/// `None` for strings, vectors and nested tables.
///
/// Reads are bounds checked, so malformed input panics instead of returning garbage. Use
/// [`root`](crate::root) to verify buffers from untrusted sources before reading them.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Table<'buf> {
    buf: &'buf [u8],
    loc: usize,
}

impl<'buf> Table<'buf> {
    /// View the table that starts at `loc`.
    #[inline]
    pub fn new(buf: &'buf [u8], loc: usize) -> Self {
        Self { buf, loc }
    }

    /// Resolve the root offset stored at `root_offset` and view the table it points to.
    #[inline]
    pub fn locate(buf: &'buf [u8], root_offset: usize) -> Self {
        Self::new(buf, follow_uoffset(buf, root_offset))
    }

    /// The underlying buffer.
    pub fn buf(&self) -> &'buf [u8] {
        self.buf
    }

    /// Absolute position of the table.
    pub fn loc(&self) -> usize {
        self.loc
    }

    /// The vtable describing this table's fields.
    #[inline]
    pub fn vtable(&self) -> VTable<'buf> {
        let soffset = read_scalar_at::<SOffset>(self.buf, self.loc);
        let loc = self
            .loc
            .checked_add_signed(-(soffset as isize))
            .uigraph_expect("vtable offset points outside the buffer");
        VTable::new(self.buf, loc)
    }

    /// Offset of the slot's data relative to the table start, 0 if the slot is absent.
    #[inline]
    pub fn field_offset(&self, slot: Slot) -> VOffset {
        self.vtable().get(slot)
    }

    /// Absolute position of the slot's data, if the slot is present.
    #[inline]
    pub fn present(&self, slot: Slot) -> Option<usize> {
        match self.field_offset(slot) {
            0 => None,
            offset => Some(self.loc + offset as usize),
        }
    }

    /// Whether the writer stored a value for `slot`.
    ///
    /// Scalars equal to their default are normally omitted, so a `false` here does not mean the
    /// producer never set the field.
    pub fn is_present(&self, slot: Slot) -> bool {
        self.present(slot).is_some()
    }

    /// Read a scalar field, or `default` if it is absent.
    #[inline]
    pub fn scalar<T: Primitive>(&self, slot: Slot, default: T) -> T {
        self.present(slot)
            .map_or(default, |loc| read_scalar_at::<T>(self.buf, loc))
    }

    /// Read a scalar field without substituting a default.
    #[inline]
    pub fn scalar_opt<T: Primitive>(&self, slot: Slot) -> Option<T> {
        self.present(slot)
            .map(|loc| read_scalar_at::<T>(self.buf, loc))
    }

    /// Read a string field. `None` if absent, which is distinct from an empty string.
    #[inline]
    pub fn string(&self, slot: Slot) -> Option<&'buf str> {
        self.present(slot)
            .map(|loc| read_str(self.buf, follow_uoffset(self.buf, loc)))
    }

    /// Read a vector field.
    #[inline]
    pub fn vector<T: Follow<'buf>>(&self, slot: Slot) -> Option<Vector<'buf, T>> {
        self.present(slot)
            .map(|loc| Vector::new(self.buf, follow_uoffset(self.buf, loc)))
    }

    /// Length of a vector field, 0 if absent.
    #[inline]
    pub fn vector_len(&self, slot: Slot) -> usize {
        self.present(slot).map_or(0, |loc| {
            read_scalar_at::<UOffset>(self.buf, follow_uoffset(self.buf, loc)) as usize
        })
    }

    /// Element `index` of a vector field, or `None` if the vector is absent.
    ///
    /// ## Panics
    ///
    /// Panics if the vector is present and `index` is out of its bounds.
    #[inline]
    pub fn vector_element_at<T: Follow<'buf>>(&self, slot: Slot, index: usize) -> Option<T::Inner> {
        self.vector::<T>(slot).map(|v| v.get(index))
    }

    /// Read a nested table field, following its offset.
    #[inline]
    pub fn nested_table(&self, slot: Slot) -> Option<Table<'buf>> {
        self.present(slot).map(|loc| Table::follow(self.buf, loc))
    }
}

impl<'buf> Follow<'buf> for Table<'buf> {
    type Inner = Table<'buf>;
    const WIDTH: usize = SIZE_UOFFSET;

    #[inline]
    fn follow(buf: &'buf [u8], loc: usize) -> Self::Inner {
        Table::locate(buf, loc)
    }
}

impl Debug for Table<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Table")
            .field("loc", &self.loc)
            .field("vtable", &self.vtable().loc())
            .finish()
    }
}

/// Whether the buffer carries `ident` as its file identifier.
///
/// The identifier sits right after the root offset, and after the size prefix if there is one.
pub fn buffer_has_identifier(
    buf: &[u8],
    ident: &[u8; FILE_IDENTIFIER_LENGTH],
    size_prefixed: bool,
) -> bool {
    let start = SIZE_UOFFSET + if size_prefixed { SIZE_UOFFSET } else { 0 };
    buf.get(start..start + FILE_IDENTIFIER_LENGTH) == Some(ident.as_slice())
}

/// Read the size prefix of a size-prefixed buffer, the byte length that follows the prefix.
pub fn read_size_prefix(buf: &[u8]) -> usize {
    read_scalar_at::<UOffset>(buf, 0) as usize
}
