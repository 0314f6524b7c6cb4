//! # Leaf Page Table Entry
//!
//! The 64-bit leaf format the heaps read and write. Only the bits a heap
//! cares about are named; the rest are reserved and kept zero.
//!
//! ```text
//! | 63‒52 | 51‒12        | 11‒2 | 1 | 0 |
//! |  rsvd | frame number | rsvd | W | P |
//! ```

use bitfield_struct::bitfield;
use heap_addresses::{PhysicalAddress, PhysicalFrame};

/// A leaf page table entry.
#[bitfield(u64)]
#[derive(PartialEq, Eq)]
pub struct PageTableEntry {
    /// **Present** (bit 0): the page is backed by the frame below.
    pub present: bool,

    /// **Writable** (bit 1): writes are permitted.
    pub writable: bool,

    /// (bits 2..11): reserved.
    #[bits(10)]
    __reserved_low: u16,

    /// **Frame number** (bits 12..51).
    #[bits(40)]
    frame_number: u64,

    /// (bits 52..63): reserved.
    #[bits(12)]
    __reserved_high: u16,
}

impl PageTableEntry {
    /// Leaf mapping `frame` with the permissions in `flags`.
    #[inline]
    #[must_use]
    pub const fn leaf(frame: PhysicalFrame, flags: MapFlags) -> Self {
        Self::new()
            .with_present(flags.present())
            .with_writable(flags.writable())
            .with_frame_number(frame.number())
    }

    /// The backing frame, if the entry is present.
    #[inline]
    #[must_use]
    pub const fn frame(self) -> Option<PhysicalFrame> {
        if self.present() {
            Some(PhysicalFrame::from_number(self.frame_number()))
        } else {
            None
        }
    }

    /// Frame base with the permission bits masked off, if present.
    #[inline]
    #[must_use]
    pub const fn physical_base(self) -> Option<PhysicalAddress> {
        match self.frame() {
            Some(frame) => Some(frame.base()),
            None => None,
        }
    }
}

/// Permission bits a heap requests when mapping a page.
#[bitfield(u8)]
#[derive(PartialEq, Eq)]
pub struct MapFlags {
    pub present: bool,
    pub writable: bool,
    #[bits(6)]
    __reserved: u8,
}

impl MapFlags {
    /// `present | writable`, the permissions of every kernel heap page.
    pub const PRESENT_WRITABLE: Self = Self::new().with_present(true).with_writable(true);
}
