#![deny(missing_docs)]

//! The variables of a computation graph as shown by a UI: names, shapes, data types, dependency
//! edges and optional constant values.
//!
//! [`UiVariable`] is the owned model. It is serialized with
//! [`WriteFlatBufferExt::write_flatbuffer_bytes`](uigraph_flatbuffers::WriteFlatBufferExt) and
//! read back with [`ReadFlatBuffer::read_flatbuffer_bytes`](uigraph_flatbuffers::ReadFlatBuffer),
//! which verifies the buffer first. Consumers that only need a few fields can skip the copy and
//! query a [`flatbuffers::UiVariable`] view directly.

pub use array::*;
pub use tags::*;
pub use variable::*;

mod array;
mod serde;
mod tags;
mod variable;

/// Re-exported flatbuffer accessors for the graph schema.
pub mod flatbuffers {
    pub use uigraph_flatbuffers::graph::*;
}
