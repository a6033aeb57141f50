#![deny(missing_docs)]

//! Byte buffers that know the alignment of their first byte.
//!
//! A finished flatbuffer holds `i64` vectors at offsets that are multiples of 8 from its start.
//! Keeping the whole buffer 8-byte aligned in memory lets readers rely on that. [`ByteBuffer`] is
//! an immutable, cheaply cloneable view over `bytes::Bytes` that records its alignment, and
//! [`ConstByteBuffer`] fixes the alignment in the type.

pub use alignment::*;
pub use buffer::*;
pub use r#const::*;

mod alignment;
mod buffer;
mod r#const;
