//! # Privileged Memory Bridge
//!
//! The user heap never touches page tables. It reserves virtual ranges in
//! its own bookkeeping and asks the trusted memory manager, through these
//! traits, to back, drop, or relocate them.
//!
//! Callers always reserve the range before calling in. Implementations must
//! tolerate a redundant `commit` of an already backed range.

use crate::registry::SharedObjectId;
use heap_addresses::VirtualAddress;

/// Identifies the process that owns a named shared object.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct OwnerId(pub u32);

#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum BridgeError {
    #[error("memory manager is out of memory")]
    OutOfMemory,
    #[error("range is not valid for this operation")]
    InvalidRange,
    #[error("no such shared object")]
    NoSuchObject,
    #[error("shared object already exists")]
    AlreadyExists,
    #[error("operation denied")]
    Denied,
}

/// Backing control for private user heap memory.
pub trait MemoryBridge {
    /// Back `[va, va + size)` with zeroed, writable memory.
    ///
    /// # Errors
    /// [`BridgeError`] if the range cannot be backed; nothing is backed then.
    fn commit(&mut self, va: VirtualAddress, size: u64) -> Result<(), BridgeError>;

    /// Drop the backing of `[va, va + size)`.
    ///
    /// # Errors
    /// [`BridgeError`] if the range is not backed.
    fn release(&mut self, va: VirtualAddress, size: u64) -> Result<(), BridgeError>;

    /// Move the live backing of `[src, src + size)` to `[dst, dst + size)`.
    ///
    /// The destination is reserved by the caller but not yet backed. After
    /// the call it carries the source contents and the source is unbacked.
    ///
    /// # Errors
    /// [`BridgeError`] if either range is invalid; nothing moves then.
    fn relocate(
        &mut self,
        src: VirtualAddress,
        dst: VirtualAddress,
        size: u64,
    ) -> Result<(), BridgeError>;
}

/// Named shared memory objects.
pub trait SharedObjectBridge {
    /// Create the object `name` of `size` bytes and map it at `va`.
    ///
    /// # Errors
    /// [`BridgeError::AlreadyExists`] if the caller already owns an object
    /// called `name`, or another [`BridgeError`] if it cannot be backed.
    fn create(
        &mut self,
        name: &str,
        size: u64,
        writable: bool,
        va: VirtualAddress,
    ) -> Result<SharedObjectId, BridgeError>;

    /// Size in bytes of the object `name` owned by `owner`.
    fn size_of(&self, owner: OwnerId, name: &str) -> Option<u64>;

    /// Map the object `name` owned by `owner` at `va`.
    ///
    /// # Errors
    /// [`BridgeError::NoSuchObject`] or [`BridgeError::Denied`].
    fn attach(
        &mut self,
        owner: OwnerId,
        name: &str,
        va: VirtualAddress,
    ) -> Result<SharedObjectId, BridgeError>;

    /// Unmap the object `id` from `va`.
    ///
    /// # Errors
    /// [`BridgeError::NoSuchObject`] if `id` is not mapped at `va`.
    fn detach(&mut self, id: SharedObjectId, va: VirtualAddress) -> Result<(), BridgeError>;
}
