use std::fmt::{Debug, Formatter};
use std::ops::Deref;

use bytes::{Buf, Bytes, BytesMut};

use crate::Alignment;

/// Bytes shown by `Debug` before the output is elided.
const DEBUG_PREFIX_LEN: usize = 16;

/// An immutable, cheaply cloneable run of bytes that remembers the alignment of its start.
#[derive(Clone)]
pub struct ByteBuffer {
    bytes: Bytes,
    alignment: Alignment,
}

impl ByteBuffer {
    /// An empty buffer.
    pub fn empty() -> Self {
        Self::from(Bytes::new())
    }

    /// Copy `values` into a new buffer.
    pub fn copy_from(values: impl AsRef<[u8]>) -> Self {
        Self::from(Bytes::copy_from_slice(values.as_ref()))
    }

    /// Copy `values` into a new buffer whose first byte sits on `alignment`.
    pub fn copy_from_aligned(values: impl AsRef<[u8]>, alignment: Alignment) -> Self {
        let values = values.as_ref();
        let mut bytes = BytesMut::with_capacity(values.len() + *alignment);
        let padding = bytes.as_ptr().align_offset(*alignment);
        // Capacity covers the padding, so the writes below never move the allocation.
        bytes.resize(padding, 0);
        bytes.advance(padding);
        bytes.extend_from_slice(values);
        Self {
            bytes: bytes.freeze(),
            alignment,
        }
    }

    /// Length in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the buffer holds no bytes.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// The alignment guaranteed for the first byte.
    #[inline]
    pub fn alignment(&self) -> Alignment {
        self.alignment
    }

    /// The bytes as a slice.
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }
}

impl Default for ByteBuffer {
    fn default() -> Self {
        Self::empty()
    }
}

/// Equality is by content. Alignment is a property of the allocation, not of the data.
impl PartialEq for ByteBuffer {
    fn eq(&self, other: &Self) -> bool {
        self.bytes == other.bytes
    }
}

impl Eq for ByteBuffer {}

impl Debug for ByteBuffer {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let (len, align) = (self.len(), self.alignment);
        write!(f, "ByteBuffer(len={len}, align={align}, [")?;
        for (i, byte) in self.bytes.iter().take(DEBUG_PREFIX_LEN).enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{byte:02x}")?;
        }
        if self.len() > DEBUG_PREFIX_LEN {
            write!(f, " ...")?;
        }
        write!(f, "])")
    }
}

impl Deref for ByteBuffer {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        self.as_slice()
    }
}

impl From<Vec<u8>> for ByteBuffer {
    fn from(value: Vec<u8>) -> Self {
        Self::from(Bytes::from(value))
    }
}

impl From<Bytes> for ByteBuffer {
    fn from(bytes: Bytes) -> Self {
        Self {
            bytes,
            alignment: Alignment::new(1),
        }
    }
}

#[cfg(test)]
mod test {
    use rstest::rstest;

    use crate::{Alignment, ByteBuffer};

    #[rstest]
    #[case(1)]
    #[case(8)]
    #[case(64)]
    fn aligned_copy(#[case] align: usize) {
        let alignment = Alignment::new(align);
        let buf = ByteBuffer::copy_from_aligned(b"conv1/kernel", alignment);
        assert!(alignment.is_ptr_aligned(buf.as_ptr()));
        assert_eq!(buf.as_slice(), b"conv1/kernel");
        assert_eq!(buf.alignment(), alignment);
    }

    #[test]
    fn copies_are_independent() {
        let mut source = vec![1u8, 2, 3];
        let buf = ByteBuffer::copy_from(&source);
        source[0] = 9;
        assert_eq!(buf.as_slice(), &[1, 2, 3]);
        assert_eq!(buf.alignment(), Alignment::new(1));
        assert_eq!(buf.len(), 3);
    }

    #[test]
    fn equality_ignores_alignment() {
        let plain = ByteBuffer::from(vec![1u8, 2, 3]);
        let aligned = ByteBuffer::copy_from_aligned([1u8, 2, 3], Alignment::new(32));
        assert_eq!(plain, aligned);
        assert_eq!(ByteBuffer::default(), ByteBuffer::empty());
        assert!(ByteBuffer::empty().is_empty());
    }

    #[test]
    fn debug_elides_long_buffers() {
        let short = ByteBuffer::from(vec![0x00, 0x3c]);
        assert_eq!(format!("{short:?}"), "ByteBuffer(len=2, align=1, [00 3c])");

        let long = ByteBuffer::from(vec![0xab; 40]);
        assert!(format!("{long:?}").ends_with("ab ab ...])"));
    }
}
