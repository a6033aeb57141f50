use std::fmt::{Debug, Formatter};
use std::iter::FusedIterator;
use std::marker::PhantomData;

use uigraph_error::uigraph_panic;

use crate::follow::Follow;
use crate::primitives::{SIZE_UOFFSET, UOffset, follow_uoffset, read_scalar_at};

/// A length-prefixed run of elements inside a flatbuffer.
///
/// `loc` points at the `u32` element count; elements follow contiguously at their inline width.
pub struct Vector<'buf, T> {
    buf: &'buf [u8],
    loc: usize,
    _marker: PhantomData<T>,
}

impl<T> Clone for Vector<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Vector<'_, T> {}

impl<'buf, T> Vector<'buf, T> {
    /// View the vector whose length prefix starts at `loc`.
    #[inline]
    pub fn new(buf: &'buf [u8], loc: usize) -> Self {
        Self {
            buf,
            loc,
            _marker: PhantomData,
        }
    }

    /// Number of elements.
    #[inline]
    pub fn len(&self) -> usize {
        read_scalar_at::<UOffset>(self.buf, self.loc) as usize
    }

    /// Whether the vector has no elements.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Absolute position of the vector's length prefix.
    pub fn loc(&self) -> usize {
        self.loc
    }
}

impl<'buf, T: Follow<'buf>> Vector<'buf, T> {
    /// Element at `idx`, read at `base + idx * width`.
    ///
    /// ## Panics
    ///
    /// Panics if `idx` is out of bounds.
    #[inline]
    pub fn get(&self, idx: usize) -> T::Inner {
        let len = self.len();
        if idx >= len {
            uigraph_panic!(OutOfBounds: idx, 0, len);
        }
        T::follow(self.buf, self.loc + SIZE_UOFFSET + idx * T::WIDTH)
    }

    /// The raw element data, without the length prefix.
    pub fn bytes(&self) -> &'buf [u8] {
        let start = self.loc + SIZE_UOFFSET;
        &self.buf[start..start + self.len() * T::WIDTH]
    }

    /// Iterate the elements in order.
    pub fn iter(&self) -> VectorIter<'buf, T> {
        VectorIter {
            vector: *self,
            front: 0,
            back: self.len(),
        }
    }
}

impl<'buf, T: Follow<'buf>> Follow<'buf> for Vector<'buf, T> {
    type Inner = Vector<'buf, T>;
    const WIDTH: usize = SIZE_UOFFSET;

    #[inline]
    fn follow(buf: &'buf [u8], loc: usize) -> Self::Inner {
        Vector::new(buf, follow_uoffset(buf, loc))
    }
}

impl<'buf, T: Follow<'buf>> IntoIterator for Vector<'buf, T> {
    type Item = T::Inner;
    type IntoIter = VectorIter<'buf, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'buf, T> Debug for Vector<'buf, T>
where
    T: Follow<'buf>,
    T::Inner: Debug,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

/// Iterator over the elements of a [`Vector`].
pub struct VectorIter<'buf, T> {
    vector: Vector<'buf, T>,
    front: usize,
    back: usize,
}

impl<'buf, T: Follow<'buf>> Iterator for VectorIter<'buf, T> {
    type Item = T::Inner;

    fn next(&mut self) -> Option<Self::Item> {
        (self.front < self.back).then(|| {
            let item = self.vector.get(self.front);
            self.front += 1;
            item
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.back - self.front;
        (remaining, Some(remaining))
    }
}

impl<'buf, T: Follow<'buf>> DoubleEndedIterator for VectorIter<'buf, T> {
    fn next_back(&mut self) -> Option<Self::Item> {
        (self.front < self.back).then(|| {
            self.back -= 1;
            self.vector.get(self.back)
        })
    }
}

impl<'buf, T: Follow<'buf>> ExactSizeIterator for VectorIter<'buf, T> {}

impl<'buf, T: Follow<'buf>> FusedIterator for VectorIter<'buf, T> {}

#[cfg(test)]
mod tests {
    use super::*;

    fn i32_vector() -> Vec<u8> {
        let mut buf = vec![3u8, 0, 0, 0];
        for v in [10i32, -20, 30] {
            buf.extend_from_slice(&v.to_le_bytes());
        }
        buf
    }

    #[test]
    fn random_access() {
        let buf = i32_vector();
        let vector = Vector::<i32>::new(&buf, 0);
        assert_eq!(vector.len(), 3);
        assert_eq!(vector.get(0), 10);
        assert_eq!(vector.get(2), 30);
        assert_eq!(vector.bytes().len(), 12);
    }

    #[test]
    fn iterate_both_ends() {
        let buf = i32_vector();
        let vector = Vector::<i32>::new(&buf, 0);
        assert_eq!(vector.iter().collect::<Vec<_>>(), vec![10, -20, 30]);
        assert_eq!(vector.iter().rev().collect::<Vec<_>>(), vec![30, -20, 10]);
        assert_eq!(vector.iter().len(), 3);
    }

    #[test]
    #[should_panic]
    fn out_of_bounds() {
        let buf = i32_vector();
        Vector::<i32>::new(&buf, 0).get(3);
    }
}
