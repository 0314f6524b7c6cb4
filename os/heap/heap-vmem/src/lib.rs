//! # Heap Paging Support
//!
//! The paging collaborators the kernel heap is built on, and the read-only
//! translation surface it consults.
//!
//! ## What you get
//! - [`FrameProvider`]: acquire/release physical frames and keep the
//!   per-frame back-pointer ("which virtual page is this frame mapped at").
//! - [`PageMapper`]: install and remove single 4 KiB leaf mappings.
//! - [`PageTableEntry`] / [`MapFlags`]: the leaf encoding and the permission
//!   bits a heap may request (`present`, `writable`).
//! - [`FrameTable`]: a bitmap frame pool that implements [`FrameProvider`].
//! - [`RegionPageTable`]: a flat leaf table covering one heap region that
//!   implements [`PageMapper`].
//! - [`TranslationOracle`]: virtual ↔ physical queries over the two.
//!
//! ## Relations
//!
//! ```text
//!   VirtualAddress ──(PageMapper::entry)──► PageTableEntry ──► PhysicalFrame
//!        ▲                                                         │
//!        └──────────(FrameProvider::mapped_at, back-pointer)───────┘
//! ```
//!
//! A frame is mapped at **at most one** virtual page. The relation is held
//! by frame number, never by reinterpreting raw addresses as pointers.

#![cfg_attr(not(any(test, doctest)), no_std)]

extern crate alloc;

mod entry;
mod frame_table;
mod oracle;
mod page_table;

pub use crate::entry::{MapFlags, PageTableEntry};
pub use crate::frame_table::FrameTable;
pub use crate::oracle::TranslationOracle;
pub use crate::page_table::RegionPageTable;
pub use heap_addresses::{PhysicalAddress, PhysicalFrame, VirtualAddress};

/// Physical frame source used by the kernel heap.
///
/// Returned frames are page aligned by construction ([`PhysicalFrame`]).
/// Implementations also own the frame metadata: the back-pointer to the
/// virtual page a frame is currently mapped at.
pub trait FrameProvider {
    /// Take one free frame; `None` on out-of-memory.
    fn acquire(&mut self) -> Option<PhysicalFrame>;

    /// Return a frame to the pool. Clears its back-pointer.
    ///
    /// # Errors
    /// [`FrameError`] if the frame is not managed here or not currently allocated.
    fn release(&mut self, frame: PhysicalFrame) -> Result<(), FrameError>;

    /// The virtual page `frame` is mapped at, if any.
    fn mapped_at(&self, frame: PhysicalFrame) -> Option<VirtualAddress>;

    /// Record (or clear) the virtual page `frame` is mapped at.
    ///
    /// # Errors
    /// [`FrameError`] if the frame is not managed here or not currently allocated.
    fn set_mapped_at(
        &mut self,
        frame: PhysicalFrame,
        va: Option<VirtualAddress>,
    ) -> Result<(), FrameError>;
}

/// Paging primitives for single 4 KiB leaves.
pub trait PageMapper {
    /// Map `frame` at the page `va` with `flags`.
    ///
    /// # Errors
    /// [`MapError`] if `va` is unaligned, outside the mapper's range, or
    /// already mapped.
    fn map(&mut self, frame: PhysicalFrame, va: VirtualAddress, flags: MapFlags)
    -> Result<(), MapError>;

    /// Clear the leaf at `va` and return the frame it mapped.
    ///
    /// # Errors
    /// [`MapError`] if `va` is outside the mapper's range or not mapped.
    fn unmap(&mut self, va: VirtualAddress) -> Result<PhysicalFrame, MapError>;

    /// The raw leaf for the page containing `va`; a zero entry if there is none.
    fn entry(&self, va: VirtualAddress) -> PageTableEntry;
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum MapError {
    #[error("address {0} is not page aligned")]
    Unaligned(VirtualAddress),
    #[error("address {0} is outside the mapped range")]
    OutOfRange(VirtualAddress),
    #[error("page {0} is already mapped")]
    AlreadyMapped(VirtualAddress),
    #[error("page {0} is not mapped")]
    NotMapped(VirtualAddress),
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum FrameError {
    #[error("frame {0} is not managed by this provider")]
    UnknownFrame(PhysicalFrame),
    #[error("frame {0} is not allocated")]
    NotAllocated(PhysicalFrame),
}
