//! Test doubles shared by the integration tests.

#![allow(dead_code)]

use heap_addresses::{HeapRegion, PAGE_SIZE, PhysicalFrame, VirtualAddress};
use heap_alloc::{
    BlockRecord, BridgeError, KernelHeap, KernelHeapConfig, MemoryBridge, OwnerId,
    SharedObjectBridge, SharedObjectId, UserHeap, UserHeapConfig,
};
use heap_vmem::{FrameTable, RegionPageTable};
use std::collections::BTreeMap;

pub const KERNEL_BASE: u64 = 0xffff_c000_0000_0000;
pub const USER_BASE: u64 = 0x0000_0080_0000_0000;

/// Owner id the bridge uses for objects created by the heap under test.
pub const SELF_OWNER: OwnerId = OwnerId(1);

pub type TestKernelHeap = KernelHeap<RegionPageTable, FrameTable>;

pub fn kernel_region(pages: usize) -> HeapRegion {
    HeapRegion::with_pages(VirtualAddress::new(KERNEL_BASE), pages).unwrap()
}

pub fn user_region(pages: usize) -> HeapRegion {
    HeapRegion::with_pages(VirtualAddress::new(USER_BASE), pages).unwrap()
}

/// Kernel heap over `pages` pages with a pool of `frames` frames.
pub fn kernel_heap(pages: usize, frames: usize) -> TestKernelHeap {
    let region = kernel_region(pages);
    KernelHeap::new(
        KernelHeapConfig::new(region),
        RegionPageTable::new(region),
        FrameTable::new(PhysicalFrame::from_number(0x1000), frames),
    )
}

pub fn user_heap(pages: usize) -> UserHeap<RecordingBridge> {
    UserHeap::new(UserHeapConfig::new(user_region(pages)), RecordingBridge::default())
}

pub const fn page(region: HeapRegion, index: usize) -> VirtualAddress {
    VirtualAddress::new(region.start().as_u64() + index as u64 * PAGE_SIZE)
}

/// Live blocks sorted by address.
pub fn sorted(blocks: impl Iterator<Item = BlockRecord>) -> Vec<BlockRecord> {
    let mut v: Vec<_> = blocks.collect();
    v.sort_by_key(|r| r.start);
    v
}

/// Panics if two blocks share a page.
pub fn assert_disjoint(blocks: &[BlockRecord]) {
    for pair in blocks.windows(2) {
        assert!(
            pair[0].end() <= pair[1].start,
            "blocks overlap: {:?} and {:?}",
            pair[0],
            pair[1]
        );
    }
}

/// A bridge that keeps one content tag per backed page and can be told to fail.
#[derive(Default)]
pub struct RecordingBridge {
    /// Backed page address -> content tag. Fresh pages carry tag 0.
    pub backed: BTreeMap<u64, u32>,
    pub commits: usize,
    pub releases: usize,
    pub relocations: usize,
    pub fail_next_commit: bool,
    pub fail_relocate: bool,
    pub objects: Vec<SharedObject>,
    pub attached: Vec<(SharedObjectId, VirtualAddress)>,
}

pub struct SharedObject {
    pub id: SharedObjectId,
    pub owner: OwnerId,
    pub name: String,
    pub size: u64,
    pub writable: bool,
}

impl RecordingBridge {
    /// Tag every page of `[va, va + size)` with `tag`.
    pub fn write(&mut self, va: VirtualAddress, size: u64, tag: u32) {
        for p in pages(va, size) {
            *self.backed.get_mut(&p).expect("writing an unbacked page") = tag;
        }
    }

    pub fn tags(&self, va: VirtualAddress, size: u64) -> Vec<Option<u32>> {
        pages(va, size).map(|p| self.backed.get(&p).copied()).collect()
    }

    pub fn is_backed(&self, va: VirtualAddress) -> bool {
        self.backed.contains_key(&va.as_u64())
    }

    /// Register an object owned by someone else.
    pub fn publish(&mut self, owner: OwnerId, name: &str, size: u64) -> SharedObjectId {
        let id = SharedObjectId(u32::try_from(self.objects.len()).unwrap() + 100);
        self.objects.push(SharedObject {
            id,
            owner,
            name: name.into(),
            size,
            writable: true,
        });
        id
    }

    fn object(&self, owner: OwnerId, name: &str) -> Option<&SharedObject> {
        self.objects
            .iter()
            .find(|o| o.owner == owner && o.name == name)
    }
}

fn pages(va: VirtualAddress, size: u64) -> impl Iterator<Item = u64> {
    (0..size.div_ceil(PAGE_SIZE)).map(move |i| va.as_u64() + i * PAGE_SIZE)
}

impl MemoryBridge for RecordingBridge {
    fn commit(&mut self, va: VirtualAddress, size: u64) -> Result<(), BridgeError> {
        if std::mem::take(&mut self.fail_next_commit) {
            return Err(BridgeError::OutOfMemory);
        }
        self.commits += 1;
        for p in pages(va, size) {
            self.backed.entry(p).or_insert(0);
        }
        Ok(())
    }

    fn release(&mut self, va: VirtualAddress, size: u64) -> Result<(), BridgeError> {
        if pages(va, size).any(|p| !self.backed.contains_key(&p)) {
            return Err(BridgeError::InvalidRange);
        }
        self.releases += 1;
        for p in pages(va, size) {
            self.backed.remove(&p);
        }
        Ok(())
    }

    fn relocate(
        &mut self,
        src: VirtualAddress,
        dst: VirtualAddress,
        size: u64,
    ) -> Result<(), BridgeError> {
        if self.fail_relocate {
            return Err(BridgeError::Denied);
        }
        self.relocations += 1;
        let tags: Vec<_> = pages(src, size)
            .map(|p| self.backed.remove(&p).ok_or(BridgeError::InvalidRange))
            .collect::<Result<_, _>>()?;
        for (p, tag) in pages(dst, size).zip(tags) {
            self.backed.insert(p, tag);
        }
        Ok(())
    }
}

impl SharedObjectBridge for RecordingBridge {
    fn create(
        &mut self,
        name: &str,
        size: u64,
        writable: bool,
        va: VirtualAddress,
    ) -> Result<SharedObjectId, BridgeError> {
        if self.object(SELF_OWNER, name).is_some() {
            return Err(BridgeError::AlreadyExists);
        }
        let id = self.publish(SELF_OWNER, name, size);
        if let Some(o) = self.objects.last_mut() {
            o.writable = writable;
        }
        self.attached.push((id, va));
        Ok(id)
    }

    fn size_of(&self, owner: OwnerId, name: &str) -> Option<u64> {
        self.object(owner, name).map(|o| o.size)
    }

    fn attach(
        &mut self,
        owner: OwnerId,
        name: &str,
        va: VirtualAddress,
    ) -> Result<SharedObjectId, BridgeError> {
        let id = self.object(owner, name).ok_or(BridgeError::NoSuchObject)?.id;
        self.attached.push((id, va));
        Ok(id)
    }

    fn detach(&mut self, id: SharedObjectId, va: VirtualAddress) -> Result<(), BridgeError> {
        let i = self
            .attached
            .iter()
            .position(|&(a, v)| a == id && v == va)
            .ok_or(BridgeError::NoSuchObject)?;
        self.attached.remove(i);
        Ok(())
    }
}
