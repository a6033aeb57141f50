//! A zero-copy reader and writer for FlatBuffers tables.
//!
//! Buffers are assembled bottom-up with a [`TableBuilder`] and read back lazily through [`Table`]
//! views, one field at a time. Untrusted buffers should be checked with [`root`] first.
//!
//! See [graph] for the UI graph variable schema.

pub use builder::*;
pub use follow::*;
pub use primitives::*;
pub use table::*;
pub use vector::*;
pub use verifier::*;
pub use vtable::*;

mod builder;
mod follow;
mod primitives;
mod table;
mod vector;
mod verifier;
mod vtable;

/// Serialized variables of a computation graph, for inspection and visualization.
///
/// `graph.fbs`:
/// ```flatbuffers
#[doc = include_str!("../flatbuffers/graph.fbs")]
/// ```
pub mod graph;

use uigraph_buffer::ConstByteBuffer;
use uigraph_error::UiGraphError;

/// A finished flatbuffer, aligned so that every scalar inside it is aligned in memory.
pub type FlatBuffer = ConstByteBuffer<8>;

/// Marks a type that is serialized as the root of its own buffer.
pub trait FlatBufferRoot {}

pub trait ReadFlatBuffer: Sized {
    type Source<'a>: Verifiable + Follow<'a>;
    type Error: From<UiGraphError>;

    fn read_flatbuffer<'buf>(
        fb: &<Self::Source<'buf> as Follow<'buf>>::Inner,
    ) -> Result<Self, Self::Error>;

    /// Verify the buffer, then read its root.
    fn read_flatbuffer_bytes<'buf>(bytes: &'buf [u8]) -> Result<Self, Self::Error>
    where
        <Self as ReadFlatBuffer>::Source<'buf>: 'buf,
    {
        let fb = root::<Self::Source<'buf>>(bytes)?;
        Self::read_flatbuffer(&fb)
    }
}

pub trait WriteFlatBuffer {
    type Target: TableOffset;

    fn write_flatbuffer(&self, fbb: &mut TableBuilder) -> Offset<Self::Target>;
}

pub trait WriteFlatBufferExt: WriteFlatBuffer + FlatBufferRoot {
    /// Write the flatbuffer into an aligned [`FlatBuffer`].
    fn write_flatbuffer_bytes(&self) -> FlatBuffer;
}

impl<F: WriteFlatBuffer + FlatBufferRoot> WriteFlatBufferExt for F {
    fn write_flatbuffer_bytes(&self) -> FlatBuffer {
        let mut fbb = TableBuilder::new();
        let root_offset = self.write_flatbuffer(&mut fbb);
        fbb.finish(root_offset);
        fbb.to_flatbuffer()
    }
}
