use std::fmt::Display;
use std::ops::Deref;

/// A power-of-two byte alignment.
#[derive(Clone, Debug, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Alignment(usize);

impl Alignment {
    /// Create a new alignment.
    ///
    /// ## Panics
    ///
    /// Panics if `align` is not a power of 2, or is greater than `u16::MAX`.
    #[inline]
    pub const fn new(align: usize) -> Self {
        assert!(align > 0, "Alignment must be greater than 0");
        assert!(align <= u16::MAX as usize, "Alignment must fit into u16");
        assert!(align.is_power_of_two(), "Alignment must be a power of 2");
        Self(align)
    }

    /// Padding needed to bring `len` up to a multiple of this alignment.
    #[inline]
    pub fn padding_for(&self, len: usize) -> usize {
        len.wrapping_neg() & (self.0 - 1)
    }

    /// Whether `ptr` sits on this alignment.
    #[inline]
    pub fn is_ptr_aligned(&self, ptr: *const u8) -> bool {
        ptr.align_offset(self.0) == 0
    }
}

impl Display for Alignment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Deref for Alignment {
    type Target = usize;

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}
