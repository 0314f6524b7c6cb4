//! # Bitmap Frame Table
//!
//! A fixed pool of physical frames tracked by one bit each, plus the
//! per-frame back-pointer the kernel heap's address translation relies on.

use crate::{FrameError, FrameProvider};
use alloc::boxed::Box;
use alloc::vec;
use heap_addresses::{PhysicalFrame, VirtualAddress};

const BITS_PER_WORD: usize = u64::BITS as usize;

/// Frame pool over the contiguous frame numbers `first .. first + count`.
///
/// # Invariants
/// - A bit is set exactly for frames currently handed out by [`acquire`](FrameProvider::acquire).
/// - Only allocated frames carry a back-pointer.
pub struct FrameTable {
    first: u64,
    count: usize,
    free: usize,
    /// Index at which the next search starts.
    hint: usize,
    used: Box<[u64]>,
    mapped_at: Box<[Option<VirtualAddress>]>,
}

impl FrameTable {
    /// Manage `count` frames starting at `first`.
    #[must_use]
    pub fn new(first: PhysicalFrame, count: usize) -> Self {
        Self {
            first: first.number(),
            count,
            free: count,
            hint: 0,
            used: vec![0; count.div_ceil(BITS_PER_WORD)].into_boxed_slice(),
            mapped_at: vec![None; count].into_boxed_slice(),
        }
    }

    #[inline]
    #[must_use]
    pub const fn total_frames(&self) -> usize {
        self.count
    }

    #[inline]
    #[must_use]
    pub const fn free_frames(&self) -> usize {
        self.free
    }

    /// Returns `true` if `frame` belongs to this pool and is handed out.
    #[must_use]
    pub fn is_allocated(&self, frame: PhysicalFrame) -> bool {
        self.index(frame).is_ok_and(|i| self.is_set(i))
    }

    fn index(&self, frame: PhysicalFrame) -> Result<usize, FrameError> {
        frame
            .number()
            .checked_sub(self.first)
            .and_then(|i| usize::try_from(i).ok())
            .filter(|&i| i < self.count)
            .ok_or(FrameError::UnknownFrame(frame))
    }

    fn allocated_index(&self, frame: PhysicalFrame) -> Result<usize, FrameError> {
        let i = self.index(frame)?;
        if self.is_set(i) {
            Ok(i)
        } else {
            Err(FrameError::NotAllocated(frame))
        }
    }

    #[inline]
    fn is_set(&self, i: usize) -> bool {
        self.used[i / BITS_PER_WORD] & (1 << (i % BITS_PER_WORD)) != 0
    }

    #[inline]
    fn set(&mut self, i: usize) {
        self.used[i / BITS_PER_WORD] |= 1 << (i % BITS_PER_WORD);
    }

    #[inline]
    fn clear(&mut self, i: usize) {
        self.used[i / BITS_PER_WORD] &= !(1 << (i % BITS_PER_WORD));
    }

    fn frame_at(&self, i: usize) -> PhysicalFrame {
        PhysicalFrame::from_number(self.first + i as u64)
    }
}

impl FrameProvider for FrameTable {
    fn acquire(&mut self) -> Option<PhysicalFrame> {
        if self.free == 0 {
            return None;
        }
        for step in 0..self.count {
            let i = (self.hint + step) % self.count;
            if !self.is_set(i) {
                self.set(i);
                self.free -= 1;
                self.hint = (i + 1) % self.count;
                return Some(self.frame_at(i));
            }
        }
        None
    }

    fn release(&mut self, frame: PhysicalFrame) -> Result<(), FrameError> {
        let i = self.allocated_index(frame)?;
        self.clear(i);
        self.mapped_at[i] = None;
        self.free += 1;
        Ok(())
    }

    fn mapped_at(&self, frame: PhysicalFrame) -> Option<VirtualAddress> {
        let i = self.allocated_index(frame).ok()?;
        self.mapped_at[i]
    }

    fn set_mapped_at(
        &mut self,
        frame: PhysicalFrame,
        va: Option<VirtualAddress>,
    ) -> Result<(), FrameError> {
        let i = self.allocated_index(frame)?;
        self.mapped_at[i] = va;
        Ok(())
    }
}
