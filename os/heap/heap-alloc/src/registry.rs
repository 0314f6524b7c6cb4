//! # Allocation Registry
//!
//! A fixed table of [`BlockRecord`]s, one per live allocation, keyed by the
//! block's start address. The capacity equals the page count of the region,
//! the worst case of every page being its own one-page block.
//!
//! Slots are found by linear scan, both for insertion (first empty slot) and
//! for lookup (address equality).

use alloc::boxed::Box;
use alloc::vec;
use heap_addresses::{VirtualAddress, bytes_for};

/// Identifier handed out by a shared-object bridge.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct SharedObjectId(pub u32);

/// What backs a block.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub enum BlockKind {
    /// Private memory handed out by `allocate`.
    #[default]
    Private,
    /// A mapping of a named shared object.
    Shared(SharedObjectId),
}

/// One live allocation.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct BlockRecord {
    /// First byte of the block; never zero.
    pub start: VirtualAddress,
    /// Page index of `start` inside the owning region.
    pub start_index: usize,
    /// Length in pages; never zero.
    pub pages: usize,
    pub kind: BlockKind,
}

impl BlockRecord {
    #[inline]
    #[must_use]
    pub const fn private(start: VirtualAddress, start_index: usize, pages: usize) -> Self {
        Self {
            start,
            start_index,
            pages,
            kind: BlockKind::Private,
        }
    }

    #[inline]
    #[must_use]
    pub const fn byte_len(&self) -> u64 {
        bytes_for(self.pages)
    }

    /// Exclusive end of the block.
    #[inline]
    #[must_use]
    pub const fn end(&self) -> VirtualAddress {
        VirtualAddress::new(self.start.as_u64() + self.byte_len())
    }

    #[inline]
    #[must_use]
    pub const fn is_shared(&self) -> bool {
        matches!(self.kind, BlockKind::Shared(_))
    }
}

/// Position of a record in the [`Registry`].
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct SlotId(usize);

impl SlotId {
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum RegistryError {
    #[error("allocation registry is full")]
    Full,
    #[error("a block starting at {0} is already registered")]
    Duplicate(VirtualAddress),
}

/// Fixed-capacity table of live blocks.
///
/// # Invariants
/// - No two occupied slots share a start address.
/// - `live` equals the number of occupied slots.
pub struct Registry {
    slots: Box<[Option<BlockRecord>]>,
    live: usize,
}

impl Registry {
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: vec![None; capacity].into_boxed_slice(),
            live: 0,
        }
    }

    #[inline]
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.live
    }

    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Store `record` in the first empty slot.
    ///
    /// # Errors
    /// - [`RegistryError::Duplicate`] if a live record already starts at `record.start`.
    /// - [`RegistryError::Full`] if no slot is empty.
    pub fn add(&mut self, record: BlockRecord) -> Result<SlotId, RegistryError> {
        let mut empty = None;
        for (i, slot) in self.slots.iter().enumerate() {
            match slot {
                Some(r) if r.start == record.start => {
                    return Err(RegistryError::Duplicate(record.start));
                }
                Some(_) => {}
                None if empty.is_none() => empty = Some(i),
                None => {}
            }
        }

        let i = empty.ok_or(RegistryError::Full)?;
        self.slots[i] = Some(record);
        self.live += 1;
        Ok(SlotId(i))
    }

    /// Slot of the live record starting exactly at `start`.
    #[must_use]
    pub fn find(&self, start: VirtualAddress) -> Option<SlotId> {
        self.slots
            .iter()
            .position(|s| s.is_some_and(|r| r.start == start))
            .map(SlotId)
    }

    #[must_use]
    pub fn get(&self, slot: SlotId) -> Option<&BlockRecord> {
        self.slots.get(slot.0)?.as_ref()
    }

    pub fn get_mut(&mut self, slot: SlotId) -> Option<&mut BlockRecord> {
        self.slots.get_mut(slot.0)?.as_mut()
    }

    /// Clear `slot`, returning the record it held.
    pub fn remove(&mut self, slot: SlotId) -> Option<BlockRecord> {
        let record = self.slots.get_mut(slot.0)?.take()?;
        self.live -= 1;
        Some(record)
    }

    /// Live records in slot order.
    pub fn iter(&self) -> impl Iterator<Item = &BlockRecord> {
        self.slots.iter().filter_map(Option::as_ref)
    }
}
