//! # User Heap
//!
//! Page-granular allocator for one process's heap region. Occupancy lives
//! in a [`PageBitmap`] kept in lock-step with the [`Registry`]; the actual
//! backing is requested from the trusted memory manager through a
//! [`MemoryBridge`].
//!
//! ## Next-fit
//! The heap keeps a cursor that survives across calls. A search scans the
//! bitmap circularly from the cursor for at most one lap and takes the first
//! run that is long enough. After a successful allocation at page `k` the
//! cursor moves to `k + 1`, one page past the *start* of the run, so the
//! next search may re-examine the pages just handed out.
//!
//! A failed search leaves the cursor where it was.

use crate::bitmap::PageBitmap;
use crate::bridge::MemoryBridge;
use crate::config::{UserHeapConfig, UserPlacement};
use crate::placement::{self, request_pages};
use crate::registry::{BlockKind, BlockRecord, Registry, SlotId};
use crate::HeapError;
use core::cmp::Ordering;
use heap_addresses::{HeapRegion, VirtualAddress, bytes_for};

pub(crate) const LOG: &str = "uheap";

/// Where the next next-fit search begins.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct NextFitCursor {
    address: VirtualAddress,
    index: usize,
}

impl NextFitCursor {
    #[inline]
    #[must_use]
    pub const fn address(&self) -> VirtualAddress {
        self.address
    }

    #[inline]
    #[must_use]
    pub const fn index(&self) -> usize {
        self.index
    }
}

pub struct UserHeap<B: MemoryBridge> {
    region: HeapRegion,
    placement: UserPlacement,
    registry: Registry,
    bitmap: PageBitmap,
    cursor: NextFitCursor,
    bridge: B,
}

impl<B: MemoryBridge> UserHeap<B> {
    /// An empty heap over `config.region` with the cursor at the first page.
    #[must_use]
    pub fn new(config: UserHeapConfig, bridge: B) -> Self {
        let region = config.region;
        Self {
            region,
            placement: config.placement,
            registry: Registry::with_capacity(region.page_count()),
            bitmap: PageBitmap::new(region.page_count()),
            cursor: NextFitCursor {
                address: region.start(),
                index: 0,
            },
            bridge,
        }
    }

    #[inline]
    #[must_use]
    pub const fn region(&self) -> HeapRegion {
        self.region
    }

    #[inline]
    #[must_use]
    pub const fn placement(&self) -> UserPlacement {
        self.placement
    }

    #[inline]
    pub const fn set_placement(&mut self, placement: UserPlacement) {
        self.placement = placement;
    }

    #[inline]
    #[must_use]
    pub const fn cursor(&self) -> NextFitCursor {
        self.cursor
    }

    #[inline]
    #[must_use]
    pub const fn bridge(&self) -> &B {
        &self.bridge
    }

    #[inline]
    pub const fn bridge_mut(&mut self) -> &mut B {
        &mut self.bridge
    }

    /// Allocate `size` bytes rounded up to whole pages.
    ///
    /// # Errors
    /// - [`HeapError::ZeroSize`] / [`HeapError::TooLarge`] for unusable sizes.
    /// - [`HeapError::NoFit`] if the search finds no run; the cursor is unchanged.
    /// - [`HeapError::Bridge`] if the memory manager cannot back the range.
    pub fn allocate(&mut self, size: u64) -> Result<VirtualAddress, HeapError> {
        let n = request_pages(size, &self.region)?;
        let start = self.find_run(n).ok_or(HeapError::NoFit { pages: n })?;
        let slot = self.reserve(start, n, BlockKind::Private)?;
        let va = self.page_va(start);

        let previous = self.cursor;
        if self.placement == UserPlacement::NextFit {
            self.advance_cursor(start);
        }

        if let Err(e) = self.bridge.commit(va, bytes_for(n)) {
            self.unreserve(slot);
            self.cursor = previous;
            log::warn!(target: LOG, "allocation of {n} pages at {va} rolled back: {e}");
            return Err(e.into());
        }

        log::debug!(target: LOG, "allocated {n} pages at {va}");
        Ok(va)
    }

    /// Release the private block starting at `va`.
    ///
    /// # Errors
    /// - [`HeapError::UnknownBlock`] if no live block starts at `va`.
    /// - [`HeapError::SharedBlock`] if the block is a shared mapping.
    /// - [`HeapError::Bridge`] if the memory manager refuses the release.
    ///
    /// Nothing changes on error.
    pub fn free(&mut self, va: VirtualAddress) -> Result<(), HeapError> {
        let (slot, record) = self.lookup(va)?;
        if record.is_shared() {
            return Err(HeapError::SharedBlock(va));
        }
        self.bridge.release(va, record.byte_len())?;
        self.unreserve(slot);
        log::debug!(target: LOG, "freed {} pages at {va}", record.pages);
        Ok(())
    }

    /// Grow, shrink, or move a private block.
    ///
    /// - `va == None` behaves as [`allocate`](Self::allocate).
    /// - `new_size == 0` behaves as [`free`](Self::free) and returns `Ok(None)`.
    /// - A smaller size releases the tail in place.
    /// - A larger size grows in place if the following pages are free and
    ///   inside the region; otherwise the block moves to a fresh run and the
    ///   bridge relocates the live contents.
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
        if record.is_shared() {
            return Err(HeapError::SharedBlock(va));
        }
        let n = request_pages(new_size, &self.region)?;

        match n.cmp(&record.pages) {
            Ordering::Equal => Ok(Some(va)),
            Ordering::Less => {
                let tail = record.pages - n;
                self.bridge.release(va + bytes_for(n), bytes_for(tail))?;
                self.bitmap.clear_run(record.start_index + n, tail);
                self.set_pages(slot, n);
                log::debug!(target: LOG, "shrunk {va} from {} to {n} pages", record.pages);
                Ok(Some(va))
            }
            Ordering::Greater => {
                let next = record.start_index + record.pages;
                let extra = n - record.pages;
                if self.region.fits(next, extra) && self.bitmap.is_run_free(next, extra) {
                    self.bridge.commit(record.end(), bytes_for(extra))?;
                    self.bitmap.mark_run(next, extra);
                    self.set_pages(slot, n);
                    log::debug!(target: LOG, "grew {va} in place to {n} pages");
                    return Ok(Some(va));
                }
                self.relocate(slot, record, n).map(Some)
            }
        }
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

    /// Returns `true` if the page at `index` belongs to a live block.
    #[inline]
    #[must_use]
    pub fn is_page_used(&self, index: usize) -> bool {
        self.bitmap.is_used(index)
    }

    #[inline]
    #[must_use]
    pub const fn free_pages(&self) -> usize {
        self.bitmap.free_pages()
    }

    fn find_run(&self, n: usize) -> Option<usize> {
        let total = self.region.page_count();
        let is_free = |i| !self.bitmap.is_used(i);
        let run = match self.placement {
            UserPlacement::NextFit => placement::next_fit(total, self.cursor.index, n, is_free),
            UserPlacement::FirstFit => placement::first_fit(total, n, is_free),
        }?;
        log::trace!(
            target: LOG,
            "{:?} found {} pages at index {} (cursor {})",
            self.placement,
            run.len,
            run.start,
            self.cursor.index
        );
        Some(run.start)
    }

    /// Lowest-index run of `n` free pages, regardless of the placement.
    pub(crate) fn find_first_fit(&self, n: usize) -> Option<usize> {
        placement::first_fit(self.region.page_count(), n, |i| !self.bitmap.is_used(i))
            .map(|run| run.start)
    }

    fn relocate(
        &mut self,
        slot: SlotId,
        record: BlockRecord,
        n: usize,
    ) -> Result<VirtualAddress, HeapError> {
        let start = self.find_run(n).ok_or(HeapError::NoFit { pages: n })?;
        let new_va = self.page_va(start);
        let extra = n - record.pages;

        self.bitmap.mark_run(start, n);
        let tail = new_va + record.byte_len();
        if let Err(e) = self.bridge.commit(tail, bytes_for(extra)) {
            self.bitmap.clear_run(start, n);
            return Err(e.into());
        }
        if let Err(e) = self.bridge.relocate(record.start, new_va, record.byte_len()) {
            if let Err(undo) = self.bridge.release(tail, bytes_for(extra)) {
                log::warn!(target: LOG, "cannot release {tail} after failed move: {undo}");
            }
            self.bitmap.clear_run(start, n);
            log::warn!(target: LOG, "moving {} to {new_va} rolled back: {e}", record.start);
            return Err(e.into());
        }

        self.bitmap.clear_run(record.start_index, record.pages);
        if let Some(r) = self.registry.get_mut(slot) {
            r.start = new_va;
            r.start_index = start;
            r.pages = n;
        }
        if self.placement == UserPlacement::NextFit {
            self.advance_cursor(start);
        }
        log::debug!(
            target: LOG,
            "moved {} ({} pages) to {new_va} ({n} pages)",
            record.start,
            record.pages
        );
        Ok(new_va)
    }

    /// Add a record for `[start, start + n)` and mark its bits.
    pub(crate) fn reserve(
        &mut self,
        start: usize,
        n: usize,
        kind: BlockKind,
    ) -> Result<SlotId, HeapError> {
        let record = BlockRecord {
            start: self.page_va(start),
            start_index: start,
            pages: n,
            kind,
        };
        let slot = self.registry.add(record)?;
        self.bitmap.mark_run(start, n);
        Ok(slot)
    }

    /// Drop the record in `slot` and clear its bits.
    pub(crate) fn unreserve(&mut self, slot: SlotId) {
        if let Some(record) = self.registry.remove(slot) {
            self.bitmap.clear_run(record.start_index, record.pages);
        }
    }

    pub(crate) fn lookup(&self, va: VirtualAddress) -> Result<(SlotId, BlockRecord), HeapError> {
        let found = self
            .registry
            .find(va)
            .and_then(|slot| Some((slot, *self.registry.get(slot)?)));
        found.ok_or_else(|| {
            log::warn!(target: LOG, "ignoring request for unknown block {va}");
            HeapError::UnknownBlock(va)
        })
    }

    pub(crate) fn set_kind(&mut self, slot: SlotId, kind: BlockKind) {
        if let Some(r) = self.registry.get_mut(slot) {
            r.kind = kind;
        }
    }

    fn set_pages(&mut self, slot: SlotId, pages: usize) {
        if let Some(r) = self.registry.get_mut(slot) {
            r.pages = pages;
        }
    }

    /// Move the cursor one page past the run starting at `start`.
    fn advance_cursor(&mut self, start: usize) {
        let index = (start + 1) % self.region.page_count();
        self.cursor = NextFitCursor {
            address: self.page_va(index),
            index,
        };
    }

    #[inline]
    pub(crate) const fn page_va(&self, index: usize) -> VirtualAddress {
        VirtualAddress::new(self.region.start().as_u64() + bytes_for(index))
    }
}
