//! # Heap Lock
//!
//! A heap's placement search reads the same occupancy state its commit step
//! writes, so each operation has to run as one critical section. `HeapLock`
//! owns a heap value and hands it out under a test-and-test-and-set spin lock.
//!
//! ```rust
//! use heap_addresses::{HeapRegion, PhysicalFrame, VirtualAddress};
//! use heap_alloc::{HeapLock, KernelHeap, KernelHeapConfig};
//! use heap_vmem::{FrameTable, RegionPageTable};
//!
//! let region = HeapRegion::with_pages(VirtualAddress::new(0xffff_c000_0000_0000), 8).unwrap();
//! let heap = HeapLock::new(KernelHeap::new(
//!     KernelHeapConfig::new(region),
//!     RegionPageTable::new(region),
//!     FrameTable::new(PhysicalFrame::from_number(0x100), 8),
//! ));
//!
//! let va = heap.allocate(4096).unwrap();
//! assert!(heap.physical_of(va).is_some());
//! heap.free(va).unwrap();
//! ```

use crate::bridge::MemoryBridge;
use crate::kernel::KernelHeap;
use crate::user::UserHeap;
use crate::HeapError;
use core::{
    cell::UnsafeCell,
    hint::spin_loop,
    ops::{Deref, DerefMut},
    sync::atomic::{AtomicBool, Ordering},
};
use heap_addresses::{PhysicalAddress, VirtualAddress};
use heap_vmem::{FrameProvider, PageMapper};

pub struct HeapLock<H> {
    /// `true` while a guard is alive.
    locked: AtomicBool,
    heap: UnsafeCell<H>,
}

// Safety: the heap is only reachable through a guard, and at most one guard exists.
unsafe impl<H: Send> Sync for HeapLock<H> {}

impl<H> HeapLock<H> {
    pub const fn new(heap: H) -> Self {
        Self {
            locked: AtomicBool::new(false),
            heap: UnsafeCell::new(heap),
        }
    }

    /// Take the lock if it is free; never spins.
    #[inline]
    pub fn try_lock(&self) -> Option<HeapGuard<'_, H>> {
        self.try_acquire().then(|| HeapGuard { lock: self })
    }

    /// Spin until the lock is taken.
    #[inline]
    pub fn lock(&self) -> HeapGuard<'_, H> {
        while !self.try_acquire() {
            while self.locked.load(Ordering::Relaxed) {
                spin_loop();
            }
        }
        HeapGuard { lock: self }
    }

    /// Run `f` on the heap inside one critical section.
    #[inline]
    pub fn with_lock<R>(&self, f: impl FnOnce(&mut H) -> R) -> R {
        let mut guard = self.lock();
        f(&mut guard)
    }

    #[inline]
    pub const fn get_mut(&mut self) -> &mut H {
        self.heap.get_mut()
    }

    #[inline]
    pub fn into_inner(self) -> H {
        self.heap.into_inner()
    }

    #[inline]
    fn try_acquire(&self) -> bool {
        self.locked
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }
}

impl<P: PageMapper, F: FrameProvider> HeapLock<KernelHeap<P, F>> {
    /// See [`KernelHeap::allocate`].
    ///
    /// # Errors
    /// As for [`KernelHeap::allocate`].
    pub fn allocate(&self, size: u64) -> Result<VirtualAddress, HeapError> {
        self.with_lock(|heap| heap.allocate(size))
    }

    /// See [`KernelHeap::free`].
    ///
    /// # Errors
    /// As for [`KernelHeap::free`].
    pub fn free(&self, va: VirtualAddress) -> Result<(), HeapError> {
        self.with_lock(|heap| heap.free(va))
    }

    /// See [`KernelHeap::resize`].
    ///
    /// # Errors
    /// As for [`KernelHeap::resize`].
    pub fn resize(
        &self,
        va: Option<VirtualAddress>,
        new_size: u64,
    ) -> Result<Option<VirtualAddress>, HeapError> {
        self.with_lock(|heap| heap.resize(va, new_size))
    }

    pub fn physical_of(&self, va: VirtualAddress) -> Option<PhysicalAddress> {
        self.with_lock(|heap| heap.physical_of(va))
    }

    pub fn virtual_of(&self, pa: PhysicalAddress) -> Option<VirtualAddress> {
        self.with_lock(|heap| heap.virtual_of(pa))
    }
}

impl<B: MemoryBridge> HeapLock<UserHeap<B>> {
    /// See [`UserHeap::allocate`].
    ///
    /// # Errors
    /// As for [`UserHeap::allocate`].
    pub fn allocate(&self, size: u64) -> Result<VirtualAddress, HeapError> {
        self.with_lock(|heap| heap.allocate(size))
    }

    /// See [`UserHeap::free`].
    ///
    /// # Errors
    /// As for [`UserHeap::free`].
    pub fn free(&self, va: VirtualAddress) -> Result<(), HeapError> {
        self.with_lock(|heap| heap.free(va))
    }

    /// See [`UserHeap::resize`].
    ///
    /// # Errors
    /// As for [`UserHeap::resize`].
    pub fn resize(
        &self,
        va: Option<VirtualAddress>,
        new_size: u64,
    ) -> Result<Option<VirtualAddress>, HeapError> {
        self.with_lock(|heap| heap.resize(va, new_size))
    }
}

pub struct HeapGuard<'a, H> {
    lock: &'a HeapLock<H>,
}

impl<H> Deref for HeapGuard<'_, H> {
    type Target = H;
    fn deref(&self) -> &H {
        unsafe { &*self.lock.heap.get() }
    }
}

impl<H> DerefMut for HeapGuard<'_, H> {
    fn deref_mut(&mut self) -> &mut H {
        unsafe { &mut *self.lock.heap.get() }
    }
}

impl<H> Drop for HeapGuard<'_, H> {
    fn drop(&mut self) {
        self.lock.locked.store(false, Ordering::Release);
    }
}
