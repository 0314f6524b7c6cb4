//! # Page Heaps
//!
//! Two page-granular allocators over fixed virtual regions:
//!
//! | Heap | Occupancy | Backing | Default placement |
//! |------|-----------|---------|-------------------|
//! | [`KernelHeap`] | a page is used iff a frame is mapped | frames mapped directly through a [`PageMapper`](heap_vmem::PageMapper) | best-fit |
//! | [`UserHeap`] | [`PageBitmap`] | requested from the memory manager via a [`MemoryBridge`] | next-fit |
//!
//! Both keep a [`Registry`] of live blocks keyed by start address. Requests
//! are rounded up to whole pages, so every returned address is page aligned.
//!
//! ## Errors
//! Operations return [`HeapError`]; a failed operation leaves the heap
//! exactly as it was (partial frame acquisition, a refused bridge call, or a
//! full registry are all rolled back).
//!
//! ## Concurrency
//! A heap value is not synchronized. Share it through a [`HeapLock`], which
//! runs each operation as one critical section.
//!
//! ## Logging
//! Through the `log` facade, with target `"kheap"` or `"uheap"`.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

extern crate alloc;

mod bitmap;
mod bridge;
mod config;
mod error;
mod kernel;
mod lock;
pub mod placement;
mod registry;
mod shared;
mod user;

pub use crate::bitmap::PageBitmap;
pub use crate::bridge::{BridgeError, MemoryBridge, OwnerId, SharedObjectBridge};
pub use crate::config::{KernelHeapConfig, KernelPlacement, UserHeapConfig, UserPlacement};
pub use crate::error::HeapError;
pub use crate::kernel::KernelHeap;
pub use crate::lock::{HeapGuard, HeapLock};
pub use crate::registry::{
    BlockKind, BlockRecord, Registry, RegistryError, SharedObjectId, SlotId,
};
pub use crate::user::{NextFitCursor, UserHeap};
