//! # Heap Memory Layout
//!
//! Default placement of the two heap regions in the virtual address space.

use crate::{HeapRegion, PAGE_SIZE, VirtualAddress, is_page_aligned};

/// First address of the kernel heap.
///
/// Sits between the higher-half direct map and the kernel image.
pub const KERNEL_HEAP_START: u64 = 0xffff_c000_0000_0000;

/// Exclusive end of the kernel heap (64 MiB).
pub const KERNEL_HEAP_MAX: u64 = KERNEL_HEAP_START + 64 * 1024 * 1024;

/// First address of every process's user heap.
pub const USER_HEAP_START: u64 = 0x0000_0080_0000_0000;

/// Exclusive end of the user heap (128 MiB).
pub const USER_HEAP_MAX: u64 = USER_HEAP_START + 128 * 1024 * 1024;

/// End of userspace VA range after which kernel space begins.
pub const USERSPACE_END: u64 = 0xffff_0000_0000_0000;

/// Number of pages in the kernel heap.
pub const KERNEL_HEAP_PAGES: u64 = (KERNEL_HEAP_MAX - KERNEL_HEAP_START) / PAGE_SIZE;

/// Number of pages in a user heap.
pub const USER_HEAP_PAGES: u64 = (USER_HEAP_MAX - USER_HEAP_START) / PAGE_SIZE;

/// The default kernel heap region, `[KERNEL_HEAP_START, KERNEL_HEAP_MAX)`.
pub const KERNEL_HEAP: HeapRegion = fixed_region(KERNEL_HEAP_START, KERNEL_HEAP_MAX);

/// The default user heap region, `[USER_HEAP_START, USER_HEAP_MAX)`.
pub const USER_HEAP: HeapRegion = fixed_region(USER_HEAP_START, USER_HEAP_MAX);

/// Evaluated at compile time only; an invalid layout fails the build.
const fn fixed_region(start: u64, end: u64) -> HeapRegion {
    match HeapRegion::new(VirtualAddress::new(start), VirtualAddress::new(end)) {
        Ok(region) => region,
        Err(_) => panic!("invalid heap layout"),
    }
}

const _: () = {
    assert!(is_page_aligned(KERNEL_HEAP_START));
    assert!(is_page_aligned(KERNEL_HEAP_MAX));
    assert!(is_page_aligned(USER_HEAP_START));
    assert!(is_page_aligned(USER_HEAP_MAX));
    assert!(KERNEL_HEAP_START < KERNEL_HEAP_MAX);
    assert!(USER_HEAP_START != 0);
    assert!(USER_HEAP_START < USER_HEAP_MAX);
    assert!(USER_HEAP_MAX <= USERSPACE_END);
    assert!(KERNEL_HEAP_START >= USERSPACE_END);
};
