//! # Heap Address Types
//!
//! Strongly typed wrappers for the addresses both page heaps deal in.
//!
//! ## Overview
//!
//! | Type | Meaning |
//! |------|---------|
//! | [`VirtualAddress`] | An address in a heap's virtual range. |
//! | [`PhysicalAddress`] | An address in physical memory. |
//! | [`PhysicalFrame`] | A page-sized physical frame, identified by its frame number. |
//! | [`HeapRegion`] | The immutable, page-aligned `[start, end)` range one heap manages. |
//!
//! All heaps in this workspace work at a single granularity of [`PAGE_SIZE`]
//! bytes. Byte-sized requests are converted with [`pages_for`].
//!
//! ## Typical Usage
//!
//! ```rust
//! # use heap_addresses::*;
//! let region = HeapRegion::new(
//!     VirtualAddress::new(0x8000_0000),
//!     VirtualAddress::new(0x8000_8000),
//! )
//! .unwrap();
//! assert_eq!(region.page_count(), 8);
//!
//! let va = region.address_of(3).unwrap();
//! assert_eq!(region.index_of(va), Some(3));
//! assert_eq!(pages_for(4097), 2);
//! ```
//!
//! ## Design Notes
//!
//! - The wrappers are `#[repr(transparent)]` over `u64` and implement `Copy`,
//!   `Eq`, `Ord` and `Hash`.
//! - Address `0` is never part of a valid [`HeapRegion`]; the allocation
//!   registries rely on that.

#![cfg_attr(not(any(test, doctest)), no_std)]

pub mod layout;
mod physical_address;
mod physical_frame;
mod region;
mod virtual_address;

pub use physical_address::PhysicalAddress;
pub use physical_frame::PhysicalFrame;
pub use region::{HeapRegion, RegionError};
pub use virtual_address::VirtualAddress;

/// Allocation granularity in bytes.
pub const PAGE_SIZE: u64 = 4096;

/// `log2(PAGE_SIZE)`.
pub const PAGE_SHIFT: u32 = 12;

const _: () = assert!(1 << PAGE_SHIFT == PAGE_SIZE);

/// Number of whole pages needed to hold `bytes` bytes (rounds up).
///
/// ```rust
/// # use heap_addresses::pages_for;
/// assert_eq!(pages_for(0), 0);
/// assert_eq!(pages_for(1), 1);
/// assert_eq!(pages_for(4096), 1);
/// assert_eq!(pages_for(4097), 2);
/// ```
#[inline]
#[must_use]
pub const fn pages_for(bytes: u64) -> u64 {
    bytes.div_ceil(PAGE_SIZE)
}

/// Byte length of `pages` pages.
#[inline]
#[must_use]
pub const fn bytes_for(pages: usize) -> u64 {
    (pages as u64) << PAGE_SHIFT
}

/// Align `x` down to a page boundary.
#[inline]
#[must_use]
pub const fn page_align_down(x: u64) -> u64 {
    x & !(PAGE_SIZE - 1)
}

/// Returns `true` if `x` sits on a page boundary.
#[inline]
#[must_use]
pub const fn is_page_aligned(x: u64) -> bool {
    x & (PAGE_SIZE - 1) == 0
}
