use crate::{PAGE_SHIFT, VirtualAddress, bytes_for, is_page_aligned};

/// The fixed virtual range `[start, end)` managed by one heap.
///
/// Created once (at boot for the kernel heap, at process creation for a user
/// heap) and never resized. Pages inside the region are addressed either by
/// their virtual address or by their zero-based page index.
///
/// ### Invariants
/// - `start` and `end` are page aligned and `start < end`.
/// - `start != 0`: the null page is never part of a heap, so address `0`
///   can never be handed out.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct HeapRegion {
    start: VirtualAddress,
    pages: usize,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum RegionError {
    #[error("region bound {0} is not page aligned")]
    Unaligned(VirtualAddress),
    #[error("region must not start at address zero")]
    NullStart,
    #[error("region [{start}, {end}) is empty or inverted")]
    Empty {
        start: VirtualAddress,
        end: VirtualAddress,
    },
    #[error("region page count does not fit the address width")]
    TooLarge,
}

impl HeapRegion {
    /// Build the region `[start, end)`.
    ///
    /// # Errors
    /// - [`RegionError::Unaligned`] if either bound is not page aligned.
    /// - [`RegionError::NullStart`] if `start` is zero.
    /// - [`RegionError::Empty`] if `end <= start`.
    /// - [`RegionError::TooLarge`] if the page count overflows `usize`.
    pub const fn new(start: VirtualAddress, end: VirtualAddress) -> Result<Self, RegionError> {
        if !start.is_page_aligned() {
            return Err(RegionError::Unaligned(start));
        }
        if !end.is_page_aligned() {
            return Err(RegionError::Unaligned(end));
        }
        if start.as_u64() == 0 {
            return Err(RegionError::NullStart);
        }
        if end.as_u64() <= start.as_u64() {
            return Err(RegionError::Empty { start, end });
        }
        let pages = (end.as_u64() - start.as_u64()) >> PAGE_SHIFT;
        if pages > usize::MAX as u64 {
            return Err(RegionError::TooLarge);
        }
        #[allow(clippy::cast_possible_truncation)]
        let pages = pages as usize;
        Ok(Self { start, pages })
    }

    /// Build a region of `pages` pages beginning at `start`.
    ///
    /// # Errors
    /// Same as [`new`](Self::new); additionally [`RegionError::TooLarge`] if
    /// the end address overflows.
    pub const fn with_pages(start: VirtualAddress, pages: usize) -> Result<Self, RegionError> {
        match start.checked_add_pages(pages) {
            Some(end) => Self::new(start, end),
            None => Err(RegionError::TooLarge),
        }
    }

    #[inline]
    #[must_use]
    pub const fn start(&self) -> VirtualAddress {
        self.start
    }

    /// Exclusive end of the region.
    #[inline]
    #[must_use]
    pub const fn end(&self) -> VirtualAddress {
        VirtualAddress::new(self.start.as_u64() + bytes_for(self.pages))
    }

    #[inline]
    #[must_use]
    pub const fn page_count(&self) -> usize {
        self.pages
    }

    #[inline]
    #[must_use]
    pub const fn byte_len(&self) -> u64 {
        bytes_for(self.pages)
    }

    #[inline]
    #[must_use]
    pub fn contains(&self, va: VirtualAddress) -> bool {
        va >= self.start && va < self.end()
    }

    /// Page index of the page containing `va`, if it lies in the region.
    #[must_use]
    pub fn index_of(&self, va: VirtualAddress) -> Option<usize> {
        if !self.contains(va) {
            return None;
        }
        usize::try_from((va.as_u64() - self.start.as_u64()) >> PAGE_SHIFT).ok()
    }

    /// Base address of page `index`, if the index is in range.
    #[must_use]
    pub const fn address_of(&self, index: usize) -> Option<VirtualAddress> {
        if index >= self.pages {
            return None;
        }
        self.start.checked_add_pages(index)
    }

    /// Returns `true` if `count` pages starting at page `index` all lie in the region.
    #[inline]
    #[must_use]
    pub const fn fits(&self, index: usize, count: usize) -> bool {
        match index.checked_add(count) {
            Some(end) => end <= self.pages,
            None => false,
        }
    }

    /// Returns `true` if `va` is a page boundary inside the region.
    #[inline]
    #[must_use]
    pub fn is_page_in_region(&self, va: VirtualAddress) -> bool {
        is_page_aligned(va.as_u64()) && self.contains(va)
    }
}
