//! # Kernel Heap
//!
//! Page-granular allocator over the kernel heap region. A page is *free*
//! exactly when it has no frame mapped; there is no separate occupancy
//! bitmap. Placement reads occupancy through the [`TranslationOracle`].
//!
//! ## Allocation
//! 1. Round the request up to `n` pages.
//! 2. Scan the whole region once and pick a run of `n` unbacked pages
//!    ([`KernelPlacement::BestFit`] by default).
//! 3. Reserve a registry slot, then back every page with a fresh frame
//!    mapped `present | writable` and record the frame's back-pointer.
//!
//! A failure in step 3 unmaps and releases whatever was already backed, so
//! a partially mapped run is never visible.
//!
//! ## Example
//! ```rust
//! use heap_addresses::{HeapRegion, PhysicalFrame, VirtualAddress};
//! use heap_alloc::{KernelHeap, KernelHeapConfig};
//! use heap_vmem::{FrameTable, RegionPageTable};
//!
//! let region = HeapRegion::with_pages(VirtualAddress::new(0xffff_c000_0000_0000), 16).unwrap();
//! let mut heap = KernelHeap::new(
//!     KernelHeapConfig::new(region),
//!     RegionPageTable::new(region),
//!     FrameTable::new(PhysicalFrame::from_number(0x100), 16),
//! );
//!
//! let va = heap.allocate(5000).unwrap();
//! let pa = heap.physical_of(va).unwrap();
//! assert_eq!(heap.virtual_of(pa), Some(va));
//! heap.free(va).unwrap();
//! assert_eq!(heap.physical_of(va), None);
//! ```

use crate::config::{KernelHeapConfig, KernelPlacement};
use crate::placement::{self, request_pages};
use crate::registry::{BlockRecord, Registry, SlotId};
use crate::HeapError;
use core::cmp::Ordering;
use heap_addresses::{HeapRegion, PhysicalAddress, PhysicalFrame, VirtualAddress, bytes_for};
use heap_vmem::{FrameProvider, MapFlags, PageMapper, TranslationOracle};

const LOG: &str = "kheap";

pub struct KernelHeap<P: PageMapper, F: FrameProvider> {
    region: HeapRegion,
    placement: KernelPlacement,
    registry: Registry,
    pages: P,
    frames: F,
}

impl<P: PageMapper, F: FrameProvider> KernelHeap<P, F> {
    /// A heap over `config.region` with no live blocks.
    ///
    /// `pages` must cover the region and currently map nothing inside it.
    #[must_use]
    pub fn new(config: KernelHeapConfig, pages: P, frames: F) -> Self {
        Self {
            region: config.region,
            placement: config.placement,
            registry: Registry::with_capacity(config.region.page_count()),
            pages,
            frames,
        }
    }

    #[inline]
    #[must_use]
    pub const fn region(&self) -> HeapRegion {
        self.region
    }

    #[inline]
    #[must_use]
    pub const fn placement(&self) -> KernelPlacement {
        self.placement
    }

    #[inline]
    pub const fn set_placement(&mut self, placement: KernelPlacement) {
        self.placement = placement;
    }

    /// Read-only translation over this heap's page table and frame pool.
    #[inline]
    #[must_use]
    pub const fn oracle(&self) -> TranslationOracle<'_, P, F> {
        TranslationOracle::new(&self.pages, &self.frames)
    }

    #[inline]
    #[must_use]
    pub const fn page_mapper(&self) -> &P {
        &self.pages
    }

    #[inline]
    #[must_use]
    pub const fn frame_provider(&self) -> &F {
        &self.frames
    }

    /// Allocate `size` bytes rounded up to whole pages.
    ///
    /// # Errors
    /// - [`HeapError::ZeroSize`] / [`HeapError::TooLarge`] for unusable sizes.
    /// - [`HeapError::NoFit`] if no run of unbacked pages is long enough.
    /// - [`HeapError::OutOfFrames`] (or a mapping error) if the run cannot be backed.
    pub fn allocate(&mut self, size: u64) -> Result<VirtualAddress, HeapError> {
        let n = request_pages(size, &self.region)?;
        let start = self.find_run(n).ok_or(HeapError::NoFit { pages: n })?;
        let va = self.page_va(start);
        log::trace!(target: LOG, "placing {n} pages at {va} ({:?})", self.placement);

        // reserve the slot first so a full registry never leaves pages mapped
        let slot = self.registry.add(BlockRecord::private(va, start, n))?;
        if let Err(e) = self.back_pages(start, n) {
            self.registry.remove(slot);
            log::warn!(target: LOG, "allocation of {n} pages at {va} rolled back: {e}");
            return Err(e);
        }

        log::debug!(target: LOG, "allocated {n} pages at {va}");
        Ok(va)
    }

    /// Release the block starting at `va`.
    ///
    /// # Errors
    /// [`HeapError::UnknownBlock`] if no live block starts at `va`. Nothing
    /// changes in that case.
    pub fn free(&mut self, va: VirtualAddress) -> Result<(), HeapError> {
        let (slot, _) = self.lookup(va)?;
        if let Some(record) = self.registry.remove(slot) {
            self.unback_pages(record.start_index, record.pages);
            log::debug!(target: LOG, "freed {} pages at {va}", record.pages);
        }
        Ok(())
    }

    /// Grow, shrink, or move a block.
    ///
    /// - `va == None` behaves as [`allocate`](Self::allocate).
    /// - `new_size == 0` behaves as [`free`](Self::free) and returns `Ok(None)`.
    /// - Otherwise the block is shrunk in place, grown in place into the
    ///   unbacked pages that follow it, or moved to a fresh run. A move
    ///   carries the existing frames over, so the contents are preserved.
    ///
    /// # Errors
    /// As for [`allocate`](Self::allocate) and [`free`](Self::free). On
    /// failure the original block is untouched and still valid.
    pub fn resize(
        &mut self,
        va: Option<VirtualAddress>,
        new_size: u64,
    ) -> Result<Option<VirtualAddress>, HeapError> {
        let Some(va) = va else {
            return self.allocate(new_size).map(Some);
        };
        if new_size == 0 {
            self.free(va)?;
            return Ok(None);
        }

        let (slot, record) = self.lookup(va)?;
        let n = request_pages(new_size, &self.region)?;

        match n.cmp(&record.pages) {
            Ordering::Equal => Ok(Some(va)),
            Ordering::Less => {
                self.unback_pages(record.start_index + n, record.pages - n);
                self.set_pages(slot, n);
                log::debug!(target: LOG, "shrunk {va} from {} to {n} pages", record.pages);
                Ok(Some(va))
            }
            Ordering::Greater => {
                let tail = record.start_index + record.pages;
                let extra = n - record.pages;
                if self.is_run_unbacked(tail, extra) {
                    self.back_pages(tail, extra)?;
                    self.set_pages(slot, n);
                    log::debug!(target: LOG, "grew {va} in place to {n} pages");
                    return Ok(Some(va));
                }
                self.relocate(slot, record, n).map(Some)
            }
        }
    }

    /// Base of the frame backing `va`, with the page offset masked off.
    #[must_use]
    pub fn physical_of(&self, va: VirtualAddress) -> Option<PhysicalAddress> {
        self.oracle().physical_of(va)
    }

    /// Virtual page the frame containing `pa` is mapped at.
    #[must_use]
    pub fn virtual_of(&self, pa: PhysicalAddress) -> Option<VirtualAddress> {
        self.oracle().virtual_of(pa)
    }

    /// Returns `true` if the page containing `va` is backed.
    #[must_use]
    pub fn is_backed(&self, va: VirtualAddress) -> bool {
        self.oracle().is_backed(va)
    }

    /// The live block starting at `va`.
    #[must_use]
    pub fn block(&self, va: VirtualAddress) -> Option<&BlockRecord> {
        self.registry.get(self.registry.find(va)?)
    }

    /// All live blocks, in registry slot order.
    pub fn blocks(&self) -> impl Iterator<Item = &BlockRecord> {
        self.registry.iter()
    }

    /// Number of unbacked pages in the region.
    #[must_use]
    pub fn free_pages(&self) -> usize {
        let oracle = self.oracle();
        (0..self.region.page_count())
            .filter(|&i| !oracle.is_backed(self.page_va(i)))
            .count()
    }

    /// Start index of a run of `n` unbacked pages under the current placement.
    fn find_run(&self, n: usize) -> Option<usize> {
        let oracle = self.oracle();
        let is_free = |i| !oracle.is_backed(self.page_va(i));
        let total = self.region.page_count();
        let run = match self.placement {
            KernelPlacement::BestFit => placement::best_fit(total, n, is_free),
            KernelPlacement::FirstFit => placement::first_fit(total, n, is_free),
        }?;
        Some(run.start)
    }

    fn relocate(
        &mut self,
        slot: SlotId,
        record: BlockRecord,
        n: usize,
    ) -> Result<VirtualAddress, HeapError> {
        let start = self.find_run(n).ok_or(HeapError::NoFit { pages: n })?;
        let new_va = self.page_va(start);

        // fresh frames for the pages the old block does not have
        self.back_pages(start + record.pages, n - record.pages)?;
        if let Err(e) = self.move_pages(record.start_index, start, record.pages) {
            self.unback_pages(start + record.pages, n - record.pages);
            log::warn!(target: LOG, "moving {} to {new_va} rolled back: {e}", record.start);
            return Err(e);
        }

        if let Some(r) = self.registry.get_mut(slot) {
            r.start = new_va;
            r.start_index = start;
            r.pages = n;
        }
        log::debug!(
            target: LOG,
            "moved {} ({} pages) to {new_va} ({n} pages)",
            record.start,
            record.pages
        );
        Ok(new_va)
    }

    /// Back `count` pages from index `first`; all or nothing.
    fn back_pages(&mut self, first: usize, count: usize) -> Result<(), HeapError> {
        for k in 0..count {
            if let Err(e) = self.back_page(self.page_va(first + k)) {
                self.unback_pages(first, k);
                return Err(e);
            }
        }
        Ok(())
    }

    fn back_page(&mut self, va: VirtualAddress) -> Result<(), HeapError> {
        let frame = self.frames.acquire().ok_or(HeapError::OutOfFrames)?;
        if let Err(e) = self.pages.map(frame, va, MapFlags::PRESENT_WRITABLE) {
            self.release_frame(frame);
            return Err(e.into());
        }
        if let Err(e) = self.frames.set_mapped_at(frame, Some(va)) {
            self.unback_page(va);
            return Err(e.into());
        }
        log::trace!(target: LOG, "backed {va} with {frame}");
        Ok(())
    }

    fn unback_pages(&mut self, first: usize, count: usize) {
        for k in 0..count {
            self.unback_page(self.page_va(first + k));
        }
    }

    fn unback_page(&mut self, va: VirtualAddress) {
        match self.pages.unmap(va) {
            Ok(frame) => self.release_frame(frame),
            Err(e) => log::warn!(target: LOG, "cannot unmap {va}: {e}"),
        }
    }

    fn release_frame(&mut self, frame: PhysicalFrame) {
        if let Err(e) = self.frames.release(frame) {
            log::warn!(target: LOG, "cannot release {frame}: {e}");
        }
    }

    /// Remap `count` pages from index `from` to index `to`; all or nothing.
    fn move_pages(&mut self, from: usize, to: usize, count: usize) -> Result<(), HeapError> {
        for k in 0..count {
            if let Err(e) = self.move_page(from + k, to + k) {
                for j in (0..k).rev() {
                    if let Err(restore) = self.move_page(to + j, from + j) {
                        log::warn!(target: LOG, "cannot restore page {}: {restore}", from + j);
                    }
                }
                return Err(e);
            }
        }
        Ok(())
    }

    fn move_page(&mut self, from: usize, to: usize) -> Result<(), HeapError> {
        let (src, dst) = (self.page_va(from), self.page_va(to));
        let frame = self.pages.unmap(src)?;
        if let Err(e) = self.pages.map(frame, dst, MapFlags::PRESENT_WRITABLE) {
            if let Err(restore) = self.pages.map(frame, src, MapFlags::PRESENT_WRITABLE) {
                log::warn!(target: LOG, "lost mapping of {frame} at {src}: {restore}");
            }
            return Err(e.into());
        }
        self.frames.set_mapped_at(frame, Some(dst))?;
        Ok(())
    }

    fn is_run_unbacked(&self, first: usize, count: usize) -> bool {
        let oracle = self.oracle();
        self.region.fits(first, count)
            && (first..first + count).all(|i| !oracle.is_backed(self.page_va(i)))
    }

    fn lookup(&self, va: VirtualAddress) -> Result<(SlotId, BlockRecord), HeapError> {
        let found = self
            .registry
            .find(va)
            .and_then(|slot| Some((slot, *self.registry.get(slot)?)));
        found.ok_or_else(|| {
            log::warn!(target: LOG, "ignoring request for unknown block {va}");
            HeapError::UnknownBlock(va)
        })
    }

    fn set_pages(&mut self, slot: SlotId, pages: usize) {
        if let Some(r) = self.registry.get_mut(slot) {
            r.pages = pages;
        }
    }

    #[inline]
    const fn page_va(&self, index: usize) -> VirtualAddress {
        VirtualAddress::new(self.region.start().as_u64() + bytes_for(index))
    }
}
