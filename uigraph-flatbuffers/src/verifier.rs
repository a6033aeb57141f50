//! Structural validation of untrusted buffers.
//!
//! Reading a buffer through [`Table`] assumes it is well formed and panics otherwise. The
//! [`Verifier`] walks a buffer once up front, checking every offset, length and string it will
//! later follow, so that verified buffers can be read without panicking.
//!
//! Alignment is checked relative to the start of the buffer, which is where the builder
//! guarantees it.

use std::str;

use uigraph_error::{UiGraphResult, uigraph_bail, uigraph_err};

use crate::follow::Follow;
use crate::primitives::{
    FILE_IDENTIFIER_LENGTH, MAX_BUFFER_SIZE, Primitive, SIZE_SOFFSET, SIZE_UOFFSET, SIZE_VOFFSET,
    SOffset, Slot, UOffset, VOffset, read_scalar_at,
};
use crate::table::{Table, buffer_has_identifier};
use crate::vector::Vector;

/// Limits applied while verifying a buffer.
#[derive(Clone, Debug)]
pub struct VerifierOptions {
    /// Deepest permitted nesting of tables.
    pub max_depth: usize,
    /// Most tables a buffer may contain.
    pub max_tables: usize,
    /// Upper bound on the bytes visited, which bounds the work spent on overlapping objects.
    pub max_apparent_size: usize,
    /// Reject scalars and offsets that are not aligned to their width.
    pub check_alignment: bool,
}

impl Default for VerifierOptions {
    fn default() -> Self {
        Self {
            max_depth: 64,
            max_tables: 1_000_000,
            max_apparent_size: 1 << 31,
            check_alignment: true,
        }
    }
}

/// Walks a buffer checking that every object it reaches lies within bounds.
#[derive(Debug)]
pub struct Verifier<'opts, 'buf> {
    buffer: &'buf [u8],
    opts: &'opts VerifierOptions,
    depth: usize,
    num_tables: usize,
    apparent_size: usize,
}

impl<'opts, 'buf> Verifier<'opts, 'buf> {
    pub fn new(opts: &'opts VerifierOptions, buffer: &'buf [u8]) -> Self {
        Self {
            buffer,
            opts,
            depth: 0,
            num_tables: 0,
            apparent_size: 0,
        }
    }

    pub fn buffer(&self) -> &'buf [u8] {
        self.buffer
    }

    /// Check `pos` is aligned for a value of `width` bytes.
    #[inline]
    pub fn is_aligned(&self, pos: usize, width: usize) -> UiGraphResult<()> {
        if self.opts.check_alignment && pos % width != 0 {
            uigraph_bail!(InvalidSerde: "unaligned {} byte value at {}", width, pos);
        }
        Ok(())
    }

    /// Check that `size` bytes starting at `pos` lie within the buffer.
    #[inline]
    pub fn range_in_buffer(&mut self, pos: usize, size: usize) -> UiGraphResult<()> {
        let end = pos
            .checked_add(size)
            .filter(|end| *end <= self.buffer.len())
            .ok_or_else(|| uigraph_err!(OutOfBounds: pos, 0, self.buffer.len()))?;
        self.apparent_size += end - pos;
        if self.apparent_size > self.opts.max_apparent_size {
            uigraph_bail!(
                InvalidSerde: "visited {} bytes, more than the limit of {}",
                self.apparent_size,
                self.opts.max_apparent_size
            );
        }
        Ok(())
    }

    /// Check that a `T` can be read at `pos`.
    #[inline]
    pub fn in_buffer<T: Primitive>(&mut self, pos: usize) -> UiGraphResult<()> {
        self.is_aligned(pos, T::WIDTH)?;
        self.range_in_buffer(pos, T::WIDTH)
    }

    /// Follow the [`UOffset`] stored at `pos`, returning the position it points to.
    pub fn deref_uoffset(&mut self, pos: usize) -> UiGraphResult<usize> {
        self.in_buffer::<UOffset>(pos)?;
        let offset = read_scalar_at::<UOffset>(self.buffer, pos) as usize;
        pos.checked_add(offset)
            .filter(|target| *target < self.buffer.len())
            .ok_or_else(|| uigraph_err!(InvalidSerde: "offset at {} points past the buffer", pos))
    }

    /// Start verifying the table at `table_pos`: its vtable and its inline data.
    pub fn visit_table<'ver>(
        &'ver mut self,
        table_pos: usize,
    ) -> UiGraphResult<TableVerifier<'ver, 'opts, 'buf>> {
        self.depth += 1;
        self.num_tables += 1;
        if self.depth > self.opts.max_depth {
            uigraph_bail!(InvalidSerde: "tables nested deeper than {}", self.opts.max_depth);
        }
        if self.num_tables > self.opts.max_tables {
            uigraph_bail!(InvalidSerde: "more than {} tables", self.opts.max_tables);
        }

        self.in_buffer::<SOffset>(table_pos)?;
        let soffset = read_scalar_at::<SOffset>(self.buffer, table_pos);
        let vtable_pos = table_pos
            .checked_add_signed(-(soffset as isize))
            .filter(|pos| *pos < self.buffer.len())
            .ok_or_else(|| {
                uigraph_err!(InvalidSerde: "vtable of table at {table_pos} lies outside the buffer")
            })?;

        self.in_buffer::<VOffset>(vtable_pos)?;
        let vtable_len = read_scalar_at::<VOffset>(self.buffer, vtable_pos) as usize;
        if vtable_len < 2 * SIZE_VOFFSET || vtable_len % SIZE_VOFFSET != 0 {
            uigraph_bail!(InvalidSerde: "invalid vtable length {} at {}", vtable_len, vtable_pos);
        }
        self.range_in_buffer(vtable_pos, vtable_len)?;

        let table_len = read_scalar_at::<VOffset>(self.buffer, vtable_pos + SIZE_VOFFSET) as usize;
        if table_len < SIZE_SOFFSET {
            uigraph_bail!(InvalidSerde: "table at {} is smaller than its vtable offset", table_pos);
        }
        self.range_in_buffer(table_pos, table_len)?;

        Ok(TableVerifier {
            verifier: self,
            pos: table_pos,
            vtable: vtable_pos,
            vtable_len,
            table_len,
        })
    }

    /// Check the vector whose length prefix is at `pos`, returning the range of its elements.
    pub fn verify_vector_range(
        &mut self,
        pos: usize,
        width: usize,
    ) -> UiGraphResult<std::ops::Range<usize>> {
        self.in_buffer::<UOffset>(pos)?;
        let len = read_scalar_at::<UOffset>(self.buffer, pos) as usize;
        let start = pos + SIZE_UOFFSET;
        let size = len.checked_mul(width).ok_or_else(
            || uigraph_err!(InvalidSerde: "vector at {} of {} elements is too large", pos, len),
        )?;
        self.range_in_buffer(start, size)?;
        Ok(start..start + size)
    }

    /// Check the string whose length prefix is at `pos`: in bounds, NUL terminated and UTF-8.
    pub fn verify_string(&mut self, pos: usize) -> UiGraphResult<()> {
        let range = self.verify_vector_range(pos, 1)?;
        self.range_in_buffer(range.end, 1)?;
        if self.buffer[range.end] != 0 {
            uigraph_bail!(InvalidSerde: "string at {} is not NUL terminated", pos);
        }
        str::from_utf8(&self.buffer[range]).map_err(
            |e| uigraph_err!(InvalidSerde: "string at {} is not valid UTF-8: {}", pos, e),
        )?;
        Ok(())
    }
}

/// Verifies the fields of one table. Created by [`Verifier::visit_table`].
#[derive(Debug)]
pub struct TableVerifier<'ver, 'opts, 'buf> {
    verifier: &'ver mut Verifier<'opts, 'buf>,
    pos: usize,
    vtable: usize,
    vtable_len: usize,
    table_len: usize,
}

impl<'ver, 'opts, 'buf> TableVerifier<'ver, 'opts, 'buf> {
    /// Absolute position of the slot's data, if the slot is present.
    fn deref(&self, slot: Slot) -> UiGraphResult<Option<usize>> {
        let entry = slot.entry_offset();
        if entry + SIZE_VOFFSET > self.vtable_len {
            return Ok(None);
        }
        let field = read_scalar_at::<VOffset>(self.verifier.buffer, self.vtable + entry) as usize;
        match field {
            0 => Ok(None),
            field if field >= self.table_len => uigraph_bail!(
                InvalidSerde: "field at {} lies outside its table of {} bytes",
                field,
                self.table_len
            ),
            field => Ok(Some(self.pos + field)),
        }
    }

    /// Verify the field in `slot` as a `T`, if present.
    pub fn visit_field<T: Verifiable>(
        self,
        name: &'static str,
        slot: Slot,
        required: bool,
    ) -> UiGraphResult<Self> {
        match self.deref(slot)? {
            Some(pos) => T::run_verifier(self.verifier, pos)
                .map_err(|e| e.with_context(format!("invalid field `{name}`")))?,
            None if required => uigraph_bail!(InvalidSerde: "missing required field `{}`", name),
            None => {}
        }
        Ok(self)
    }

    /// Finish verifying the table.
    pub fn finish(self) -> &'ver mut Verifier<'opts, 'buf> {
        self.verifier.depth -= 1;
        self.verifier
    }
}

/// A wire type the [`Verifier`] can check.
///
/// `pos` is where the value is stored inline, the same position [`Follow::follow`] reads from.
pub trait Verifiable {
    /// Bytes the value occupies inline, and its alignment when it is a scalar.
    const INLINE_WIDTH: usize;
    /// Scalars need no checks beyond their bounds, so vectors of them are checked as one range.
    const IS_SCALAR: bool = false;

    fn run_verifier(v: &mut Verifier<'_, '_>, pos: usize) -> UiGraphResult<()>;
}

macro_rules! impl_verifiable_primitive {
    ($($T:ty),* $(,)?) => {
        $(
            impl Verifiable for $T {
                const INLINE_WIDTH: usize = <$T as Primitive>::WIDTH;
                const IS_SCALAR: bool = true;

                #[inline]
                fn run_verifier(v: &mut Verifier<'_, '_>, pos: usize) -> UiGraphResult<()> {
                    v.in_buffer::<$T>(pos)
                }
            }
        )*
    };
}

impl_verifiable_primitive!(bool, u8, i8, u16, i16, u32, i32, u64, i64, f32, f64);

impl Verifiable for &str {
    const INLINE_WIDTH: usize = SIZE_UOFFSET;

    fn run_verifier(v: &mut Verifier<'_, '_>, pos: usize) -> UiGraphResult<()> {
        let string = v.deref_uoffset(pos)?;
        v.verify_string(string)
    }
}

impl<T: Verifiable> Verifiable for Vector<'_, T> {
    const INLINE_WIDTH: usize = SIZE_UOFFSET;

    fn run_verifier(v: &mut Verifier<'_, '_>, pos: usize) -> UiGraphResult<()> {
        let vector = v.deref_uoffset(pos)?;
        let elements = v.verify_vector_range(vector, T::INLINE_WIDTH)?;
        if T::IS_SCALAR {
            return v.is_aligned(elements.start, T::INLINE_WIDTH);
        }
        for (idx, element) in elements.step_by(T::INLINE_WIDTH).enumerate() {
            T::run_verifier(v, element)
                .map_err(|e| e.with_context(format!("invalid element {idx}")))?;
        }
        Ok(())
    }
}

/// Untyped tables are checked structurally, without looking at their fields.
impl Verifiable for Table<'_> {
    const INLINE_WIDTH: usize = SIZE_UOFFSET;

    fn run_verifier(v: &mut Verifier<'_, '_>, pos: usize) -> UiGraphResult<()> {
        let table = v.deref_uoffset(pos)?;
        v.visit_table(table)?.finish();
        Ok(())
    }
}

/// Verify a buffer and return its root.
pub fn root<'buf, T>(buf: &'buf [u8]) -> UiGraphResult<T::Inner>
where
    T: Verifiable + Follow<'buf>,
{
    root_with_opts::<T>(&VerifierOptions::default(), buf)
}

/// Verify a buffer with custom limits and return its root.
pub fn root_with_opts<'buf, T>(opts: &VerifierOptions, buf: &'buf [u8]) -> UiGraphResult<T::Inner>
where
    T: Verifiable + Follow<'buf>,
{
    if buf.len() > MAX_BUFFER_SIZE {
        uigraph_bail!(InvalidSerde: "buffer of {} bytes exceeds the 2GiB format limit", buf.len());
    }
    let mut verifier = Verifier::new(opts, buf);
    T::run_verifier(&mut verifier, 0).inspect_err(|e| {
        log::debug!("Rejected {} byte flatbuffer: {}", buf.len(), e);
    })?;
    log::trace!("Verified {} byte flatbuffer", buf.len());
    Ok(T::follow(buf, 0))
}

/// Verify a size-prefixed buffer and return its root.
pub fn size_prefixed_root<'buf, T>(buf: &'buf [u8]) -> UiGraphResult<T::Inner>
where
    T: Verifiable + Follow<'buf>,
{
    let opts = VerifierOptions::default();
    let mut verifier = Verifier::new(&opts, buf);
    verifier.in_buffer::<UOffset>(0)?;
    let size = read_scalar_at::<UOffset>(buf, 0) as usize;
    if size > buf.len() - SIZE_UOFFSET {
        uigraph_bail!(
            InvalidSerde: "size prefix of {} exceeds the {} bytes that follow it",
            size,
            buf.len() - SIZE_UOFFSET
        );
    }
    T::run_verifier(&mut verifier, SIZE_UOFFSET)?;
    Ok(T::follow(buf, SIZE_UOFFSET))
}

/// Verify a buffer that must carry `ident` as its file identifier, then return its root.
pub fn root_with_identifier<'buf, T>(
    buf: &'buf [u8],
    ident: &[u8; FILE_IDENTIFIER_LENGTH],
) -> UiGraphResult<T::Inner>
where
    T: Verifiable + Follow<'buf>,
{
    if !buffer_has_identifier(buf, ident, false) {
        uigraph_bail!(
            InvalidSerde: "buffer does not carry the file identifier \"{}\"",
            String::from_utf8_lossy(ident)
        );
    }
    root::<T>(buf)
}

/// Return a buffer's root without verifying it.
///
/// Every read stays bounds checked, so a malformed buffer makes field access panic rather than
/// read out of bounds.
pub fn root_unchecked<'buf, T: Follow<'buf>>(buf: &'buf [u8]) -> T::Inner {
    T::follow(buf, 0)
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::builder::{TableBuilder, TableMarker};

    const NAME: Slot = Slot::new(0);
    const DIMS: Slot = Slot::new(1);
    const DEPS: Slot = Slot::new(2);

    struct Node;

    impl Verifiable for Node {
        const INLINE_WIDTH: usize = SIZE_UOFFSET;

        fn run_verifier(v: &mut Verifier<'_, '_>, pos: usize) -> UiGraphResult<()> {
            let table = v.deref_uoffset(pos)?;
            v.visit_table(table)?
                .visit_field::<&str>("name", NAME, true)?
                .visit_field::<Vector<'_, i64>>("dims", DIMS, false)?
                .visit_field::<Vector<'_, &str>>("deps", DEPS, false)?
                .finish();
            Ok(())
        }
    }

    impl<'buf> Follow<'buf> for Node {
        type Inner = Table<'buf>;
        const WIDTH: usize = SIZE_UOFFSET;

        fn follow(buf: &'buf [u8], loc: usize) -> Self::Inner {
            Table::locate(buf, loc)
        }
    }

    fn node(name: Option<&str>) -> Vec<u8> {
        let mut fbb = TableBuilder::new();
        let deps = fbb.create_vector_of_strings(&["a", "bc"]);
        let dims = fbb.create_vector(&[1i64, 28, 28]);
        let name = name.map(|n| fbb.create_string(n));
        let mut table = fbb.start_table(3);
        if let Some(name) = name {
            table.push_offset(NAME, name);
        }
        table.push_offset(DIMS, dims);
        table.push_offset(DEPS, deps);
        let root = table.finish::<TableMarker>();
        fbb.finish(root);
        fbb.finished_data().to_vec()
    }

    #[test]
    fn accepts_well_formed() {
        let buf = node(Some("input"));
        let table = root::<Node>(&buf).unwrap();
        assert_eq!(table.string(NAME), Some("input"));
        assert!(root::<Table<'_>>(&buf).is_ok());
    }

    #[test]
    fn missing_required_field() {
        let buf = node(None);
        let err = root::<Node>(&buf).unwrap_err();
        assert!(err.to_string().contains("missing required field `name`"));
    }

    #[rstest]
    #[case(0)]
    #[case(3)]
    #[case(4)]
    #[case(40)]
    fn rejects_truncated(#[case] keep: usize) {
        let buf = node(Some("input"));
        assert!(root::<Node>(&buf[..keep]).is_err());
    }

    #[test]
    fn rejects_invalid_utf8() {
        let mut buf = node(Some("input"));
        let pos = buf.windows(5).position(|w| w == b"input").unwrap();
        buf[pos] = 0xFF;
        let err = root::<Node>(&buf).unwrap_err();
        assert!(err.to_string().contains("UTF-8"));
    }

    #[test]
    fn rejects_root_past_end() {
        let mut buf = node(Some("input"));
        buf[..4].copy_from_slice(&u32::MAX.to_le_bytes());
        assert!(root::<Node>(&buf).is_err());
    }

    #[test]
    fn depth_limit() {
        let buf = node(Some("input"));
        let opts = VerifierOptions {
            max_depth: 0,
            ..Default::default()
        };
        assert!(root_with_opts::<Node>(&opts, &buf).is_err());
    }

    #[test]
    fn alignment_is_optional() {
        // Insert one byte after the root offset so every object moves to an odd position.
        let buf = node(Some("input"));
        let root_offset = read_scalar_at::<u32>(&buf, 0) + 1;
        let mut misaligned = root_offset.to_le_bytes().to_vec();
        misaligned.push(0);
        misaligned.extend_from_slice(&buf[4..]);
        assert!(root::<Node>(&misaligned).is_err());

        let opts = VerifierOptions {
            check_alignment: false,
            ..Default::default()
        };
        let table = root_with_opts::<Node>(&opts, &misaligned).unwrap();
        assert_eq!(table.string(NAME), Some("input"));
    }

    #[test]
    fn size_prefixed_and_identified() {
        let mut fbb = TableBuilder::new();
        let name = fbb.create_string("w");
        let mut table = fbb.start_table(3);
        table.push_offset(NAME, name);
        let root = table.finish::<TableMarker>();
        fbb.finish_size_prefixed(root, None);
        let buf = fbb.finished_data();
        let table = size_prefixed_root::<Node>(buf).unwrap();
        assert_eq!(table.string(NAME), Some("w"));

        let mut fbb = TableBuilder::new();
        let name = fbb.create_string("w");
        let mut table = fbb.start_table(3);
        table.push_offset(NAME, name);
        let root = table.finish::<TableMarker>();
        fbb.finish_with_identifier(root, b"UIGV");
        let buf = fbb.finished_data();
        assert!(root_with_identifier::<Node>(buf, b"UIGV").is_ok());
        assert!(root_with_identifier::<Node>(buf, b"XXXX").is_err());
    }

    #[rstest]
    #[case(Slot::new(3))]
    #[case(Slot::new(Slot::MAX_INDEX))]
    #[case(Slot::new(u16::MAX))]
    fn undeclared_slots_are_absent(#[case] slot: Slot) {
        let buf = node(Some("input"));
        let opts = VerifierOptions::default();

        let mut verifier = Verifier::new(&opts, &buf);
        let table = verifier.deref_uoffset(0).unwrap();
        let fields = verifier.visit_table(table).unwrap();
        assert!(fields.visit_field::<i64>("extra", slot, false).is_ok());

        let mut verifier = Verifier::new(&opts, &buf);
        let fields = verifier.visit_table(table).unwrap();
        let err = fields.visit_field::<i64>("extra", slot, true).unwrap_err();
        assert!(err.to_string().contains("missing required field `extra`"));
    }
}
