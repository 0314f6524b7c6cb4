//! # Shared Objects
//!
//! Named shared memory mapped into a user heap. Placement is always
//! first-fit from the start of the region, independent of the heap's
//! configured strategy, and never moves the next-fit cursor.
//!
//! The range is reserved in the registry and bitmap before the bridge is
//! called; if the bridge refuses, the reservation is dropped again.

use crate::bridge::{MemoryBridge, OwnerId, SharedObjectBridge};
use crate::placement::request_pages;
use crate::registry::{BlockKind, SlotId};
use crate::user::{LOG, UserHeap};
use crate::{BridgeError, HeapError};
use heap_addresses::VirtualAddress;

impl<B: MemoryBridge + SharedObjectBridge> UserHeap<B> {
    /// Create the shared object `name` of `size` bytes and map it.
    ///
    /// # Errors
    /// - [`HeapError::ZeroSize`] / [`HeapError::TooLarge`] for unusable sizes.
    /// - [`HeapError::NoFit`] if no run is long enough.
    /// - [`HeapError::Bridge`] if the object cannot be created.
    pub fn create_shared(
        &mut self,
        name: &str,
        size: u64,
        writable: bool,
    ) -> Result<VirtualAddress, HeapError> {
        let (slot, va) = self.reserve_shared(size)?;
        match self.bridge_mut().create(name, size, writable, va) {
            Ok(id) => {
                self.set_kind(slot, BlockKind::Shared(id));
                log::debug!(target: LOG, "created shared object {name:?} ({id:?}) at {va}");
                Ok(va)
            }
            Err(e) => {
                self.unreserve(slot);
                Err(e.into())
            }
        }
    }

    /// Map the shared object `name` owned by `owner`.
    ///
    /// # Errors
    /// - [`BridgeError::NoSuchObject`] (as [`HeapError::Bridge`]) if it does not exist.
    /// - [`HeapError::NoFit`] if no run is long enough.
    /// - [`HeapError::Bridge`] if the attach is refused.
    pub fn attach_shared(&mut self, owner: OwnerId, name: &str) -> Result<VirtualAddress, HeapError> {
        let size = self
            .bridge()
            .size_of(owner, name)
            .ok_or(BridgeError::NoSuchObject)?;
        let (slot, va) = self.reserve_shared(size)?;
        match self.bridge_mut().attach(owner, name, va) {
            Ok(id) => {
                self.set_kind(slot, BlockKind::Shared(id));
                log::debug!(target: LOG, "attached {name:?} of {owner:?} ({id:?}) at {va}");
                Ok(va)
            }
            Err(e) => {
                self.unreserve(slot);
                Err(e.into())
            }
        }
    }

    /// Unmap the shared object mapped at `va`.
    ///
    /// # Errors
    /// - [`HeapError::UnknownBlock`] if no live block starts at `va`.
    /// - [`HeapError::NotShared`] if the block is private memory.
    /// - [`HeapError::Bridge`] if the detach is refused.
    pub fn detach_shared(&mut self, va: VirtualAddress) -> Result<(), HeapError> {
        let (slot, record) = self.lookup(va)?;
        let BlockKind::Shared(id) = record.kind else {
            return Err(HeapError::NotShared(va));
        };
        self.bridge_mut().detach(id, va)?;
        self.unreserve(slot);
        log::debug!(target: LOG, "detached {id:?} from {va}");
        Ok(())
    }

    fn reserve_shared(&mut self, size: u64) -> Result<(SlotId, VirtualAddress), HeapError> {
        let n = request_pages(size, &self.region())?;
        let start = self
            .find_first_fit(n)
            .ok_or(HeapError::NoFit { pages: n })?;
        let slot = self.reserve(start, n, BlockKind::Private)?;
        Ok((slot, self.page_va(start)))
    }
}
