use uigraph_buffer::ByteBuffer;

use crate::{ByteOrder, DType};

/// A pair of integers, used to identify a variable by `(node, output index)`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct IntPair {
    /// The first element.
    pub first: i32,
    /// The second element.
    pub second: i32,
}

impl IntPair {
    /// Create a new pair.
    pub fn new(first: i32, second: i32) -> Self {
        Self { first, second }
    }
}

impl From<(i32, i32)> for IntPair {
    fn from((first, second): (i32, i32)) -> Self {
        Self::new(first, second)
    }
}

/// A dense n-dimensional array stored as raw bytes.
///
/// The bytes are kept exactly as written. Interpreting them requires `dtype` and `byte_order`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FlatArray {
    /// Extent of each dimension. Empty for a scalar.
    pub shape: Vec<i64>,
    /// The raw element data.
    pub buffer: ByteBuffer,
    /// Element type of `buffer`.
    pub dtype: DType,
    /// Byte order of the elements in `buffer`.
    pub byte_order: ByteOrder,
}

impl FlatArray {
    /// Create a little endian array.
    pub fn new(shape: Vec<i64>, buffer: ByteBuffer, dtype: DType) -> Self {
        Self {
            shape,
            buffer,
            dtype,
            byte_order: ByteOrder::Little,
        }
    }

    /// The number of elements implied by `shape`, or `None` if a dimension is negative or the
    /// product overflows.
    pub fn num_elements(&self) -> Option<usize> {
        self.shape.iter().try_fold(1usize, |acc, &dim| {
            usize::try_from(dim).ok().and_then(|d| acc.checked_mul(d))
        })
    }

    /// Whether the length of `buffer` agrees with `shape` and `dtype`. Variable-width and
    /// unknown element types are always considered consistent.
    pub fn is_consistent(&self) -> bool {
        match (self.dtype.byte_width(), self.num_elements()) {
            (Some(width), Some(n)) => n.checked_mul(width) == Some(self.buffer.len()),
            (None, _) => true,
            (Some(_), None) => false,
        }
    }
}
