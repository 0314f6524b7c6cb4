use crate::{PAGE_SHIFT, PhysicalAddress};
use core::fmt;

/// A page-sized physical frame, identified by its frame number.
///
/// Frames are handles, not pointers: the heaps look frame metadata up by
/// [`number`](Self::number) and never dereference a frame's base address.
///
/// ### Invariants
/// - `base()` is always page aligned.
///
/// ### Examples
/// ```rust
/// # use heap_addresses::*;
/// let frame = PhysicalFrame::from_number(0x300);
/// assert_eq!(frame.base(), PhysicalAddress::new(0x30_0000));
/// assert_eq!(PhysicalFrame::containing(PhysicalAddress::new(0x30_0fff)), frame);
/// ```
#[repr(transparent)]
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct PhysicalFrame(u64);

impl PhysicalFrame {
    #[inline]
    #[must_use]
    pub const fn from_number(number: u64) -> Self {
        Self(number)
    }

    /// Frame that contains `pa` (aligns down).
    #[inline]
    #[must_use]
    pub const fn containing(pa: PhysicalAddress) -> Self {
        Self(pa.as_u64() >> PAGE_SHIFT)
    }

    #[inline]
    #[must_use]
    pub const fn number(self) -> u64 {
        self.0
    }

    #[inline]
    #[must_use]
    pub const fn base(self) -> PhysicalAddress {
        PhysicalAddress::new(self.0 << PAGE_SHIFT)
    }
}

impl fmt::Debug for PhysicalFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Frame(#{} @ {:#018X})", self.0, self.base().as_u64())
    }
}

impl fmt::Display for PhysicalFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.base(), f)
    }
}
