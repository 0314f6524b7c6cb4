//! # Address Translation Oracle
//!
//! Read-only virtual ↔ physical queries. The oracle owns no state of its
//! own; it borrows the page mapper (virtual → physical) and the frame
//! provider (physical → virtual, via the back-pointer).

use crate::{FrameProvider, PageMapper};
use heap_addresses::{PhysicalAddress, PhysicalFrame, VirtualAddress};

/// Query surface over a [`PageMapper`] and a [`FrameProvider`].
pub struct TranslationOracle<'a, P: PageMapper, F: FrameProvider> {
    pages: &'a P,
    frames: &'a F,
}

impl<'a, P: PageMapper, F: FrameProvider> TranslationOracle<'a, P, F> {
    #[inline]
    pub const fn new(pages: &'a P, frames: &'a F) -> Self {
        Self { pages, frames }
    }

    /// Returns `true` if the page containing `va` is backed by a frame.
    #[inline]
    #[must_use]
    pub fn is_backed(&self, va: VirtualAddress) -> bool {
        self.pages.entry(va).present()
    }

    /// The frame backing the page containing `va`.
    #[inline]
    #[must_use]
    pub fn frame_of(&self, va: VirtualAddress) -> Option<PhysicalFrame> {
        self.pages.entry(va).frame()
    }

    /// Base of the frame backing `va` (flag bits masked off), if present.
    #[inline]
    #[must_use]
    pub fn physical_of(&self, va: VirtualAddress) -> Option<PhysicalAddress> {
        self.pages.entry(va).physical_base()
    }

    /// The virtual page the frame containing `pa` is currently mapped at.
    #[inline]
    #[must_use]
    pub fn virtual_of(&self, pa: PhysicalAddress) -> Option<VirtualAddress> {
        self.frames.mapped_at(pa.frame())
    }
}
