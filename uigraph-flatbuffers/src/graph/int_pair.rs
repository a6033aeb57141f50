use std::fmt::{Debug, Formatter};

use uigraph_error::UiGraphResult;

use crate::{
    Follow, Offset, SIZE_UOFFSET, Slot, Table, TableBuilder, TableOffset, TableWriter, Verifiable,
    Verifier,
};

pub enum IntPairOffset {}

impl TableOffset for IntPairOffset {}

/// A pair of integers, used as the identifier of a variable.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct IntPair<'buf> {
    tab: Table<'buf>,
}

impl<'buf> IntPair<'buf> {
    pub const VT_FIRST: Slot = Slot::new(0);
    pub const VT_SECOND: Slot = Slot::new(1);
    pub const FIELD_COUNT: u16 = 2;

    #[inline]
    pub fn init_from_table(table: Table<'buf>) -> Self {
        Self { tab: table }
    }

    pub fn as_table(&self) -> Table<'buf> {
        self.tab
    }

    pub fn create(fbb: &mut TableBuilder, args: &IntPairArgs) -> Offset<IntPairOffset> {
        let mut builder = IntPairBuilder::new(fbb);
        builder.add_second(args.second);
        builder.add_first(args.first);
        builder.finish()
    }

    #[inline]
    pub fn first(&self) -> i32 {
        self.tab.scalar::<i32>(Self::VT_FIRST, 0)
    }

    #[inline]
    pub fn second(&self) -> i32 {
        self.tab.scalar::<i32>(Self::VT_SECOND, 0)
    }
}

impl<'buf> Follow<'buf> for IntPair<'buf> {
    type Inner = IntPair<'buf>;
    const WIDTH: usize = SIZE_UOFFSET;

    #[inline]
    fn follow(buf: &'buf [u8], loc: usize) -> Self::Inner {
        Self::init_from_table(Table::follow(buf, loc))
    }
}

impl Verifiable for IntPair<'_> {
    const INLINE_WIDTH: usize = SIZE_UOFFSET;

    fn run_verifier(v: &mut Verifier<'_, '_>, pos: usize) -> UiGraphResult<()> {
        let table = v.deref_uoffset(pos)?;
        v.visit_table(table)?
            .visit_field::<i32>("first", Self::VT_FIRST, false)?
            .visit_field::<i32>("second", Self::VT_SECOND, false)?
            .finish();
        Ok(())
    }
}

impl Debug for IntPair<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IntPair")
            .field("first", &self.first())
            .field("second", &self.second())
            .finish()
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct IntPairArgs {
    pub first: i32,
    pub second: i32,
}

pub struct IntPairBuilder<'b> {
    table: TableWriter<'b>,
}

impl<'b> IntPairBuilder<'b> {
    pub fn new(fbb: &'b mut TableBuilder) -> Self {
        Self {
            table: fbb.start_table(IntPair::FIELD_COUNT),
        }
    }

    #[inline]
    pub fn add_first(&mut self, first: i32) {
        self.table.push_slot::<i32>(IntPair::VT_FIRST, first, 0);
    }

    #[inline]
    pub fn add_second(&mut self, second: i32) {
        self.table.push_slot::<i32>(IntPair::VT_SECOND, second, 0);
    }

    pub fn finish(self) -> Offset<IntPairOffset> {
        self.table.finish()
    }
}
