//! Back-to-front construction of flatbuffers.
//!
//! The builder fills its buffer from the end towards the start. Every object is therefore
//! written before anything that refers to it, and every stored [`UOffset`] points forward to
//! finished data.
//!
//! ```
//! use uigraph_flatbuffers::{Slot, Table, TableBuilder, TableMarker};
//!
//! let mut fbb = TableBuilder::new();
//! let name = fbb.create_string("conv1/kernel");
//! let mut table = fbb.start_table(2);
//! table.push_offset(Slot::new(0), name);
//! table.push_slot::<i8>(Slot::new(1), 2, 0);
//! let root = table.finish::<TableMarker>();
//! fbb.finish(root);
//!
//! let table = Table::locate(fbb.finished_data(), 0);
//! assert_eq!(table.string(Slot::new(0)), Some("conv1/kernel"));
//! assert_eq!(table.scalar::<i8>(Slot::new(1), 0), 2);
//! ```

use std::collections::HashMap;
use std::fmt::{Debug, Formatter};
use std::marker::PhantomData;

use uigraph_buffer::Alignment;
use uigraph_error::uigraph_panic;

use crate::FlatBuffer;
use crate::primitives::{
    FILE_IDENTIFIER_LENGTH, MAX_BUFFER_SIZE, Primitive, SIZE_UOFFSET, SIZE_VOFFSET, SOffset, Slot,
    UOffset, VOffset, emplace_scalar, to_uoffset,
};
use crate::vtable::VTable;

/// Options controlling how a [`TableBuilder`] lays out its output.
#[derive(Clone, Debug)]
pub struct BuilderOptions {
    /// Bytes allocated up front. The buffer doubles whenever it runs out of space.
    pub initial_capacity: usize,
    /// Write scalar fields even when they equal their default.
    pub force_defaults: bool,
    /// Share one vtable between tables whose vtables are byte-identical.
    pub dedup_vtables: bool,
}

impl Default for BuilderOptions {
    fn default() -> Self {
        Self {
            initial_capacity: 1024,
            force_defaults: false,
            dedup_vtables: true,
        }
    }
}

/// The position of a finished object, counted from the end of the buffer.
///
/// Offsets are only handed out by operations that close an object, such as
/// [`TableWriter::finish`], [`VectorWriter::finish`] or [`TableBuilder::create_string`]. Holding
/// one is proof that the object it refers to is complete and may be referenced by a parent.
///
/// An offset is only meaningful to the builder that produced it, until that builder is
/// [reset](TableBuilder::reset). Writing one that points past everything written so far panics.
pub struct Offset<T: ?Sized> {
    value: UOffset,
    _marker: PhantomData<fn(&T)>,
}

impl<T: ?Sized> Offset<T> {
    #[inline]
    pub(crate) fn new(value: UOffset) -> Self {
        Self {
            value,
            _marker: PhantomData,
        }
    }

    /// Bytes between this object and the end of the buffer.
    #[inline]
    pub fn value(&self) -> UOffset {
        self.value
    }
}

impl<T: ?Sized> Clone for Offset<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: ?Sized> Copy for Offset<T> {}

impl<T: ?Sized> PartialEq for Offset<T> {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl<T: ?Sized> Eq for Offset<T> {}

impl<T: ?Sized> Debug for Offset<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Offset").field(&self.value).finish()
    }
}

/// Marker for the kinds of finished table an [`Offset`] may refer to.
pub trait TableOffset {}

/// An untyped finished table.
pub enum TableMarker {}

impl TableOffset for TableMarker {}

/// A value that can be written inline into the buffer.
pub trait Push: Copy {
    /// Bytes occupied by the value.
    const SIZE: usize;
    /// Alignment the value requires.
    const ALIGNMENT: usize;

    /// Write the value into `dst`. `written_len` is the number of bytes behind `dst`, up to the
    /// end of the buffer.
    fn push(&self, dst: &mut [u8], written_len: usize);
}

macro_rules! impl_push_primitive {
    ($($T:ty),* $(,)?) => {
        $(
            impl Push for $T {
                const SIZE: usize = <$T as Primitive>::WIDTH;
                const ALIGNMENT: usize = <$T as Primitive>::WIDTH;

                #[inline]
                fn push(&self, dst: &mut [u8], _written_len: usize) {
                    self.write_le(dst);
                }
            }
        )*
    };
}

impl_push_primitive!(bool, u8, i8, u16, i16, u32, i32, u64, i64, f32, f64);

impl<T: ?Sized> Push for Offset<T> {
    const SIZE: usize = SIZE_UOFFSET;
    const ALIGNMENT: usize = SIZE_UOFFSET;

    #[inline]
    fn push(&self, dst: &mut [u8], written_len: usize) {
        if self.value as usize > written_len {
            uigraph_panic!(
                "offset {} does not refer to an object written before it",
                self.value
            );
        }
        // Distance from this uoffset to the target, both measured from the end of the buffer.
        let relative = to_uoffset(SIZE_UOFFSET + written_len) - self.value;
        relative.write_le(dst);
    }
}

#[derive(Clone, Copy, Debug)]
struct FieldLoc {
    off: UOffset,
    id: VOffset,
}

/// Assembles flatbuffers bottom-up in a single growing buffer.
///
/// A builder is an exclusive, single-writer session: tables and vectors under construction
/// borrow it mutably, so a child object can never be started while its parent is open.
/// Identical call sequences produce byte-identical buffers.
pub struct TableBuilder {
    owned_buf: Vec<u8>,
    head: usize,
    min_align: usize,
    field_locs: Vec<FieldLoc>,
    written_vtable_revpos: Vec<UOffset>,
    shared_strings: HashMap<Box<str>, Offset<str>>,
    finished: bool,
    options: BuilderOptions,
}

impl Default for TableBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TableBuilder {
    /// Create a builder with default options.
    pub fn new() -> Self {
        Self::with_options(BuilderOptions::default())
    }

    /// Create a builder with the given options.
    pub fn with_options(options: BuilderOptions) -> Self {
        let capacity = options.initial_capacity.min(MAX_BUFFER_SIZE);
        Self {
            owned_buf: vec![0u8; capacity],
            head: capacity,
            min_align: 1,
            field_locs: Vec::new(),
            written_vtable_revpos: Vec::new(),
            shared_strings: HashMap::new(),
            finished: false,
            options,
        }
    }

    /// The options this builder was created with.
    pub fn options(&self) -> &BuilderOptions {
        &self.options
    }

    /// Clear the builder for reuse, keeping its allocation.
    pub fn reset(&mut self) {
        self.owned_buf[self.head..].fill(0);
        self.head = self.owned_buf.len();
        self.min_align = 1;
        self.field_locs.clear();
        self.written_vtable_revpos.clear();
        self.shared_strings.clear();
        self.finished = false;
    }

    /// Bytes written so far.
    #[inline]
    pub fn used_space(&self) -> usize {
        self.owned_buf.len() - self.head
    }

    /// Write a string: its length, its bytes and a trailing NUL.
    pub fn create_string(&mut self, s: &str) -> Offset<str> {
        self.assert_not_finished();
        self.align(s.len() + 1, SIZE_UOFFSET);
        self.push(0u8);
        self.push_bytes_unprefixed(s.as_bytes());
        Offset::new(self.push(to_uoffset(s.len())))
    }

    /// Write a string, reusing an earlier copy written through this method in the same session.
    pub fn create_shared_string(&mut self, s: &str) -> Offset<str> {
        if let Some(offset) = self.shared_strings.get(s) {
            return *offset;
        }
        let offset = self.create_string(s);
        self.shared_strings.insert(s.into(), offset);
        offset
    }

    /// Write a vector of scalars or offsets.
    pub fn create_vector<T: Push>(&mut self, items: &[T]) -> Offset<[T]> {
        self.assert_not_finished();
        let elem_size = T::SIZE;
        let slice_size = items.len() * elem_size;
        self.align(slice_size, T::ALIGNMENT.max(SIZE_UOFFSET));
        self.ensure_capacity(slice_size + SIZE_UOFFSET);

        self.head -= slice_size;
        let mut written_len = self.used_space();
        let dst = &mut self.owned_buf[self.head..self.head + slice_size];
        for (item, out) in items.iter().zip(dst.chunks_exact_mut(elem_size)) {
            written_len -= elem_size;
            item.push(out, written_len);
        }

        Offset::new(self.push(to_uoffset(items.len())))
    }

    /// Write a `[byte]` vector from raw bytes.
    pub fn create_byte_vector(&mut self, bytes: &[u8]) -> Offset<[i8]> {
        self.assert_not_finished();
        self.align(bytes.len(), SIZE_UOFFSET);
        self.push_bytes_unprefixed(bytes);
        Offset::new(self.push(to_uoffset(bytes.len())))
    }

    /// Write every string, then a vector of offsets to them.
    pub fn create_vector_of_strings<S: AsRef<str>>(
        &mut self,
        items: &[S],
    ) -> Offset<[Offset<str>]> {
        let offsets = items
            .iter()
            .map(|s| self.create_string(s.as_ref()))
            .collect::<Vec<_>>();
        self.create_vector(&offsets)
    }

    /// Start a vector of `len` elements, which must be pushed last to first.
    pub fn start_vector<T: Push>(&mut self, len: usize) -> VectorWriter<'_, T> {
        self.assert_not_finished();
        self.align(len * T::SIZE, T::ALIGNMENT.max(SIZE_UOFFSET));
        VectorWriter {
            builder: self,
            len,
            pushed: 0,
            _marker: PhantomData,
        }
    }

    /// Start a table declaring `field_count` slots.
    pub fn start_table(&mut self, field_count: u16) -> TableWriter<'_> {
        self.assert_not_finished();
        self.field_locs.clear();
        TableWriter {
            start: to_uoffset(self.used_space()),
            field_count,
            builder: self,
        }
    }

    /// Seal the buffer by writing the root offset.
    pub fn finish<T: TableOffset>(&mut self, root: Offset<T>) {
        self.finish_with_opts(root, None, false);
    }

    /// Seal the buffer, writing a file identifier after the root offset.
    pub fn finish_with_identifier<T: TableOffset>(
        &mut self,
        root: Offset<T>,
        ident: &[u8; FILE_IDENTIFIER_LENGTH],
    ) {
        self.finish_with_opts(root, Some(ident), false);
    }

    /// Seal the buffer, prefixing it with its own length.
    pub fn finish_size_prefixed<T: TableOffset>(
        &mut self,
        root: Offset<T>,
        ident: Option<&[u8; FILE_IDENTIFIER_LENGTH]>,
    ) {
        self.finish_with_opts(root, ident, true);
    }

    fn finish_with_opts<T: TableOffset>(
        &mut self,
        root: Offset<T>,
        ident: Option<&[u8; FILE_IDENTIFIER_LENGTH]>,
        size_prefixed: bool,
    ) {
        self.assert_not_finished();
        let prefix_len = if size_prefixed { SIZE_UOFFSET } else { 0 };
        let ident_len = ident.map_or(0, |_| FILE_IDENTIFIER_LENGTH);
        let to_align = SIZE_UOFFSET + prefix_len + ident_len;
        let min_align = self.min_align;
        self.align(to_align, min_align);

        if let Some(ident) = ident {
            self.push_bytes_unprefixed(ident);
        }
        self.push(root);
        if size_prefixed {
            let size = to_uoffset(self.used_space());
            self.push(size);
        }
        self.finished = true;

        log::debug!(
            "Finished flatbuffer of {} bytes with {} distinct vtables",
            self.used_space(),
            self.written_vtable_revpos.len()
        );
    }

    /// The finished buffer.
    ///
    /// ## Panics
    ///
    /// Panics if the builder has not been finished.
    pub fn finished_data(&self) -> &[u8] {
        if !self.finished {
            uigraph_panic!("flatbuffer has not been finished");
        }
        &self.owned_buf[self.head..]
    }

    /// Copy the finished buffer into an 8-byte aligned [`FlatBuffer`].
    pub fn to_flatbuffer(&self) -> FlatBuffer {
        FlatBuffer::copy_from(self.finished_data())
    }

    fn assert_not_finished(&self) {
        if self.finished {
            uigraph_panic!("flatbuffer was already finished, reset the builder to reuse it");
        }
    }

    fn push<P: Push>(&mut self, x: P) -> UOffset {
        self.align(P::SIZE, P::ALIGNMENT);
        self.make_space(P::SIZE);
        let written_len = self.used_space() - P::SIZE;
        let dst = &mut self.owned_buf[self.head..self.head + P::SIZE];
        x.push(dst, written_len);
        to_uoffset(self.used_space())
    }

    fn push_bytes_unprefixed(&mut self, bytes: &[u8]) -> UOffset {
        let start = self.make_space(bytes.len());
        self.owned_buf[start..start + bytes.len()].copy_from_slice(bytes);
        to_uoffset(self.used_space())
    }

    /// Pad so that, once `len` more bytes are written, the write position is `alignment` aligned.
    fn align(&mut self, len: usize, alignment: usize) {
        self.min_align = self.min_align.max(alignment);
        let padding = Alignment::new(alignment).padding_for(self.used_space() + len);
        self.make_space(padding);
    }

    fn make_space(&mut self, want: usize) -> usize {
        self.ensure_capacity(want);
        self.head -= want;
        self.head
    }

    fn ensure_capacity(&mut self, want: usize) {
        if self.head >= want {
            return;
        }
        if self.used_space() + want > MAX_BUFFER_SIZE {
            uigraph_panic!(
                "flatbuffer of {} bytes exceeds the 2GiB format limit",
                self.used_space() + want
            );
        }
        while self.head < want {
            self.grow_downwards();
        }
    }

    fn grow_downwards(&mut self) {
        let old_len = self.owned_buf.len();
        let new_len = (old_len * 2).clamp(1, MAX_BUFFER_SIZE);
        let diff = new_len - old_len;

        let mut grown = vec![0u8; new_len];
        grown[diff..].copy_from_slice(&self.owned_buf);
        self.owned_buf = grown;
        self.head += diff;
    }

    /// Write the vtable for the table whose fields started at `table_tail_revloc`, returning the
    /// table's offset.
    fn write_vtable(&mut self, table_tail_revloc: UOffset) -> UOffset {
        // The table starts with a signed offset to its vtable, filled in once the vtable is placed.
        let object_revloc = self.push::<SOffset>(0);

        let vtable_byte_len = self
            .field_locs
            .iter()
            .map(|fl| fl.id as usize + SIZE_VOFFSET)
            .max()
            .unwrap_or(2 * SIZE_VOFFSET);
        let size = object_revloc - table_tail_revloc;
        let table_object_size = VOffset::try_from(size)
            .unwrap_or_else(|_| uigraph_panic!("table of {size} bytes exceeds the 64KiB limit"));
        let vtable_byte_len_voffset = VOffset::try_from(vtable_byte_len)
            .unwrap_or_else(|_| uigraph_panic!("vtable of {vtable_byte_len} bytes is too large"));

        let vt_start = self.make_space(vtable_byte_len);
        let vt_end = vt_start + vtable_byte_len;
        {
            let vtable = &mut self.owned_buf[vt_start..vt_end];
            emplace_scalar::<VOffset>(vtable, 0, vtable_byte_len_voffset);
            emplace_scalar::<VOffset>(vtable, SIZE_VOFFSET, table_object_size);
            for fl in &self.field_locs {
                // Both positions are measured from the end, the difference fits the table size.
                let pos = VOffset::try_from(object_revloc - fl.off)
                    .unwrap_or_else(|_| uigraph_panic!("field offset does not fit the table"));
                emplace_scalar::<VOffset>(vtable, fl.id as usize, pos);
            }
        }

        let existing = if self.options.dedup_vtables {
            let new_vtable = &self.owned_buf[vt_start..vt_end];
            self.written_vtable_revpos.iter().copied().find(|revpos| {
                let pos = self.owned_buf.len() - *revpos as usize;
                VTable::new(&self.owned_buf, pos).as_bytes() == new_vtable
            })
        } else {
            None
        };

        let vtable_revpos = match existing {
            Some(revpos) => {
                self.owned_buf[vt_start..vt_end].fill(0);
                self.head += vtable_byte_len;
                log::trace!("Reusing vtable at {revpos} for table at {object_revloc}");
                revpos
            }
            None => {
                let revpos = to_uoffset(self.used_space());
                self.written_vtable_revpos.push(revpos);
                revpos
            }
        };

        // vtable = table - soffset, so a vtable written after the table is at a lower address.
        let table_pos = self.owned_buf.len() - object_revloc as usize;
        let soffset = SOffset::try_from(i64::from(vtable_revpos) - i64::from(object_revloc))
            .unwrap_or_else(|_| uigraph_panic!("vtable offset does not fit a soffset"));
        emplace_scalar::<SOffset>(&mut self.owned_buf, table_pos, soffset);

        self.field_locs.clear();
        object_revloc
    }
}

impl Debug for TableBuilder {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableBuilder")
            .field("used_space", &self.used_space())
            .field("capacity", &self.owned_buf.len())
            .field("min_align", &self.min_align)
            .field("vtables", &self.written_vtable_revpos.len())
            .field("finished", &self.finished)
            .finish()
    }
}

/// A table under construction.
///
/// Fields may be pushed in any order. Closing the table with [`TableWriter::finish`] writes its
/// vtable and releases the builder.
pub struct TableWriter<'b> {
    builder: &'b mut TableBuilder,
    start: UOffset,
    field_count: u16,
}

impl TableWriter<'_> {
    /// Push a scalar field, omitting it when it equals `default` unless the builder forces
    /// defaults. Readers substitute the default for omitted fields.
    #[inline]
    pub fn push_slot<T: Push + PartialEq>(&mut self, slot: Slot, value: T, default: T) {
        if value != default || self.builder.options.force_defaults {
            self.push_slot_always(slot, value);
        }
    }

    /// Push a field unconditionally.
    ///
    /// ## Panics
    ///
    /// Panics if `slot` was not declared by [`TableBuilder::start_table`].
    #[inline]
    pub fn push_slot_always<T: Push>(&mut self, slot: Slot, value: T) {
        if slot.index() >= self.field_count {
            uigraph_panic!(OutOfBounds: slot.index() as usize, 0, self.field_count as usize);
        }
        let off = self.builder.push(value);
        self.builder.field_locs.push(FieldLoc {
            off,
            id: slot.voffset(),
        });
    }

    /// Push a reference to a finished string, vector or table.
    #[inline]
    pub fn push_offset<T: ?Sized>(&mut self, slot: Slot, offset: Offset<T>) {
        self.push_slot_always(slot, offset);
    }

    /// Close the table, writing (or reusing) its vtable.
    pub fn finish<T: TableOffset>(self) -> Offset<T> {
        Offset::new(self.builder.write_vtable(self.start))
    }
}

/// A vector under construction. Elements are pushed last to first.
pub struct VectorWriter<'b, T: Push> {
    builder: &'b mut TableBuilder,
    len: usize,
    pushed: usize,
    _marker: PhantomData<T>,
}

impl<T: Push> VectorWriter<'_, T> {
    /// Push the element preceding the previously pushed one.
    ///
    /// ## Panics
    ///
    /// Panics if more elements are pushed than were declared.
    #[inline]
    pub fn push(&mut self, item: T) {
        if self.pushed == self.len {
            uigraph_panic!(OutOfBounds: self.pushed, 0, self.len);
        }
        self.builder.push(item);
        self.pushed += 1;
    }

    /// Close the vector by writing its length prefix.
    ///
    /// ## Panics
    ///
    /// Panics if fewer elements were pushed than declared.
    pub fn finish(self) -> Offset<[T]> {
        if self.pushed != self.len {
            uigraph_panic!(
                "vector declared {} elements but {} were pushed",
                self.len,
                self.pushed
            );
        }
        Offset::new(self.builder.push(to_uoffset(self.len)))
    }
}
