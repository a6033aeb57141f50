use std::fmt::{Debug, Formatter};

use uigraph_error::UiGraphResult;

use crate::graph::{ByteOrder, DType};
use crate::{
    Follow, Offset, SIZE_UOFFSET, Slot, Table, TableBuilder, TableOffset, TableWriter, Vector,
    Verifiable, Verifier,
};

pub enum FlatArrayOffset {}

impl TableOffset for FlatArrayOffset {}

/// A dense array: its shape, element type, byte order and raw little- or big-endian data.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct FlatArray<'buf> {
    tab: Table<'buf>,
}

impl<'buf> FlatArray<'buf> {
    pub const VT_SHAPE: Slot = Slot::new(0);
    pub const VT_BUFFER: Slot = Slot::new(1);
    pub const VT_DTYPE: Slot = Slot::new(2);
    pub const VT_BYTE_ORDER: Slot = Slot::new(3);
    pub const FIELD_COUNT: u16 = 4;

    #[inline]
    pub fn init_from_table(table: Table<'buf>) -> Self {
        Self { tab: table }
    }

    pub fn as_table(&self) -> Table<'buf> {
        self.tab
    }

    pub fn create(fbb: &mut TableBuilder, args: &FlatArrayArgs) -> Offset<FlatArrayOffset> {
        let mut builder = FlatArrayBuilder::new(fbb);
        if let Some(x) = args.buffer {
            builder.add_buffer(x);
        }
        if let Some(x) = args.shape {
            builder.add_shape(x);
        }
        builder.add_byte_order(args.byte_order);
        builder.add_dtype(args.dtype);
        builder.finish()
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
    pub fn buffer(&self) -> Option<Vector<'buf, i8>> {
        self.tab.vector::<i8>(Self::VT_BUFFER)
    }

    /// The raw array data, borrowed from the flatbuffer.
    #[inline]
    pub fn buffer_bytes(&self) -> Option<&'buf [u8]> {
        self.buffer().map(|buffer| buffer.bytes())
    }

    #[inline]
    pub fn dtype(&self) -> DType {
        DType(self.tab.scalar::<i8>(Self::VT_DTYPE, 0))
    }

    #[inline]
    pub fn byte_order(&self) -> ByteOrder {
        ByteOrder(self.tab.scalar::<i8>(Self::VT_BYTE_ORDER, 0))
    }
}

impl<'buf> Follow<'buf> for FlatArray<'buf> {
    type Inner = FlatArray<'buf>;
    const WIDTH: usize = SIZE_UOFFSET;

    #[inline]
    fn follow(buf: &'buf [u8], loc: usize) -> Self::Inner {
        Self::init_from_table(Table::follow(buf, loc))
    }
}

impl Verifiable for FlatArray<'_> {
    const INLINE_WIDTH: usize = SIZE_UOFFSET;

    fn run_verifier(v: &mut Verifier<'_, '_>, pos: usize) -> UiGraphResult<()> {
        let table = v.deref_uoffset(pos)?;
        v.visit_table(table)?
            .visit_field::<Vector<'_, i64>>("shape", Self::VT_SHAPE, false)?
            .visit_field::<Vector<'_, i8>>("buffer", Self::VT_BUFFER, false)?
            .visit_field::<DType>("dtype", Self::VT_DTYPE, false)?
            .visit_field::<ByteOrder>("byteOrder", Self::VT_BYTE_ORDER, false)?
            .finish();
        Ok(())
    }
}

impl Debug for FlatArray<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlatArray")
            .field("shape", &self.shape())
            .field("buffer_len", &self.buffer().map(|b| b.len()))
            .field("dtype", &self.dtype())
            .field("byte_order", &self.byte_order())
            .finish()
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct FlatArrayArgs {
    pub shape: Option<Offset<[i64]>>,
    pub buffer: Option<Offset<[i8]>>,
    pub dtype: DType,
    pub byte_order: ByteOrder,
}

pub struct FlatArrayBuilder<'b> {
    table: TableWriter<'b>,
}

impl<'b> FlatArrayBuilder<'b> {
    pub fn new(fbb: &'b mut TableBuilder) -> Self {
        Self {
            table: fbb.start_table(FlatArray::FIELD_COUNT),
        }
    }

    #[inline]
    pub fn add_shape(&mut self, shape: Offset<[i64]>) {
        self.table.push_offset(FlatArray::VT_SHAPE, shape);
    }

    #[inline]
    pub fn add_buffer(&mut self, buffer: Offset<[i8]>) {
        self.table.push_offset(FlatArray::VT_BUFFER, buffer);
    }

    #[inline]
    pub fn add_dtype(&mut self, dtype: DType) {
        self.table
            .push_slot(FlatArray::VT_DTYPE, dtype, DType::INHERIT);
    }

    #[inline]
    pub fn add_byte_order(&mut self, byte_order: ByteOrder) {
        self.table
            .push_slot(FlatArray::VT_BYTE_ORDER, byte_order, ByteOrder::LE);
    }

    pub fn finish(self) -> Offset<FlatArrayOffset> {
        self.table.finish()
    }
}
