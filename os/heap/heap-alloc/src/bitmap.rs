//! # Page Occupancy Bitmap
//!
//! One bit per page of a user heap region; a set bit means the page belongs
//! to a live block. Run operations wrap at the region boundary.

use alloc::boxed::Box;
use alloc::vec;

const BITS_PER_WORD: usize = u64::BITS as usize;

pub struct PageBitmap {
    words: Box<[u64]>,
    pages: usize,
    used: usize,
}

impl PageBitmap {
    /// A bitmap for `pages` pages, all free.
    #[must_use]
    pub fn new(pages: usize) -> Self {
        Self {
            words: vec![0; pages.div_ceil(BITS_PER_WORD)].into_boxed_slice(),
            pages,
            used: 0,
        }
    }

    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.pages
    }

    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.pages == 0
    }

    #[inline]
    #[must_use]
    pub const fn used_pages(&self) -> usize {
        self.used
    }

    #[inline]
    #[must_use]
    pub const fn free_pages(&self) -> usize {
        self.pages - self.used
    }

    /// Returns `true` if page `index` is in use. Out-of-range indices read as used.
    #[inline]
    #[must_use]
    pub fn is_used(&self, index: usize) -> bool {
        index >= self.pages || self.words[index / BITS_PER_WORD] & bit(index) != 0
    }

    /// Returns `true` if every page in `[start, start + count)` is free.
    #[must_use]
    pub fn is_run_free(&self, start: usize, count: usize) -> bool {
        (start..start.saturating_add(count)).all(|i| !self.is_used(i))
    }

    /// Set `count` bits from `start`, wrapping at the end.
    pub fn mark_run(&mut self, start: usize, count: usize) {
        for k in 0..count {
            let i = self.wrap(start + k);
            let word = &mut self.words[i / BITS_PER_WORD];
            if *word & bit(i) == 0 {
                *word |= bit(i);
                self.used += 1;
            }
        }
    }

    /// Clear `count` bits from `start`, wrapping at the end.
    pub fn clear_run(&mut self, start: usize, count: usize) {
        for k in 0..count {
            let i = self.wrap(start + k);
            let word = &mut self.words[i / BITS_PER_WORD];
            if *word & bit(i) != 0 {
                *word &= !bit(i);
                self.used -= 1;
            }
        }
    }

    #[inline]
    const fn wrap(&self, index: usize) -> usize {
        index % self.pages
    }
}

#[inline]
const fn bit(index: usize) -> u64 {
    1 << (index % BITS_PER_WORD)
}
