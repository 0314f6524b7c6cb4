//! # Region Page Table
//!
//! One leaf entry per page of a [`HeapRegion`]. Walks are a single index
//! computation; there are no intermediate tables to allocate.

use crate::{MapError, MapFlags, PageMapper, PageTableEntry};
use alloc::boxed::Box;
use alloc::vec;
use heap_addresses::{HeapRegion, PhysicalFrame, VirtualAddress};

/// Flat leaf table covering exactly one heap region.
pub struct RegionPageTable {
    region: HeapRegion,
    entries: Box<[PageTableEntry]>,
}

impl RegionPageTable {
    /// An empty (all non-present) table for `region`.
    #[must_use]
    pub fn new(region: HeapRegion) -> Self {
        Self {
            region,
            entries: vec![PageTableEntry::new(); region.page_count()].into_boxed_slice(),
        }
    }

    #[inline]
    #[must_use]
    pub const fn region(&self) -> HeapRegion {
        self.region
    }

    /// Number of present leaves.
    #[must_use]
    pub fn mapped_pages(&self) -> usize {
        self.entries.iter().filter(|e| e.present()).count()
    }

    fn slot(&self, va: VirtualAddress) -> Result<usize, MapError> {
        self.region.index_of(va).ok_or(MapError::OutOfRange(va))
    }
}

impl PageMapper for RegionPageTable {
    fn map(
        &mut self,
        frame: PhysicalFrame,
        va: VirtualAddress,
        flags: MapFlags,
    ) -> Result<(), MapError> {
        if !va.is_page_aligned() {
            return Err(MapError::Unaligned(va));
        }
        let i = self.slot(va)?;
        if self.entries[i].present() {
            return Err(MapError::AlreadyMapped(va));
        }
        self.entries[i] = PageTableEntry::leaf(frame, flags);
        log::trace!(target: "vmem", "map {va} -> {frame}");
        Ok(())
    }

    fn unmap(&mut self, va: VirtualAddress) -> Result<PhysicalFrame, MapError> {
        let i = self.slot(va)?;
        let frame = self.entries[i].frame().ok_or(MapError::NotMapped(va))?;
        self.entries[i] = PageTableEntry::new();
        log::trace!(target: "vmem", "unmap {va} (was {frame})");
        Ok(frame)
    }

    fn entry(&self, va: VirtualAddress) -> PageTableEntry {
        self.slot(va)
            .map_or_else(|_| PageTableEntry::new(), |i| self.entries[i])
    }
}
