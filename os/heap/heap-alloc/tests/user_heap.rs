mod support;

use heap_addresses::{PAGE_SIZE, VirtualAddress};
use heap_alloc::{BlockRecord, BridgeError, HeapError, NextFitCursor, UserHeap, UserPlacement};
use support::{RecordingBridge, assert_disjoint, page, sorted, user_heap};

type Snapshot = (Vec<bool>, Vec<BlockRecord>, NextFitCursor, Vec<u64>);

fn snapshot(heap: &UserHeap<RecordingBridge>) -> Snapshot {
    (
        (0..heap.region().page_count())
            .map(|i| heap.is_page_used(i))
            .collect(),
        sorted(heap.blocks().copied()),
        heap.cursor(),
        heap.bridge().backed.keys().copied().collect(),
    )
}

#[test]
fn allocation_commits_the_whole_run() {
    let mut heap = user_heap(16);
    let va = heap.allocate(3 * PAGE_SIZE - 10).unwrap();
    assert!(va.is_page_aligned());
    assert_eq!(heap.block(va).map(|b| b.pages), Some(3));
    assert_eq!(heap.bridge().commits, 1);
    for i in 0..3 {
        assert!(heap.bridge().is_backed(va + i * PAGE_SIZE));
    }
    assert!(!heap.bridge().is_backed(va + 3 * PAGE_SIZE));
}

#[test]
fn next_search_starts_one_page_past_the_previous_run_start() {
    let mut heap = user_heap(8);
    let region = heap.region();

    let a = heap.allocate(PAGE_SIZE).unwrap();
    let b = heap.allocate(2 * PAGE_SIZE).unwrap();
    assert_eq!((a, b), (page(region, 0), page(region, 1)));
    assert_eq!(heap.cursor().index(), 2);

    // page 0 is free again, but the search does not restart from the front
    heap.free(a).unwrap();
    let c = heap.allocate(PAGE_SIZE).unwrap();
    assert_eq!(c, page(region, 3));
    assert_eq!(heap.cursor().index(), 4);
    assert_eq!(heap.cursor().address(), page(region, 4));
}

#[test]
fn search_wraps_to_the_front_of_the_region() {
    let mut heap = user_heap(6);
    let region = heap.region();
    let a = heap.allocate(2 * PAGE_SIZE).unwrap();
    heap.allocate(2 * PAGE_SIZE).unwrap();
    heap.allocate(PAGE_SIZE).unwrap();
    heap.free(a).unwrap();

    // cursor at page 5, only pages 0, 1 and 5 are free
    assert_eq!(heap.cursor().index(), 5);
    assert_eq!(heap.allocate(2 * PAGE_SIZE), Ok(page(region, 0)));
    assert_eq!(heap.cursor().index(), 1);
}

#[test]
fn exhausted_search_terminates_and_keeps_state() {
    let mut heap = user_heap(8);
    let blocks: Vec<_> = (0..8).map(|_| heap.allocate(PAGE_SIZE).unwrap()).collect();
    for va in blocks.iter().step_by(2) {
        heap.free(*va).unwrap();
    }
    let before = snapshot(&heap);

    assert_eq!(
        heap.allocate(2 * PAGE_SIZE),
        Err(HeapError::NoFit { pages: 2 })
    );
    assert_eq!(
        heap.allocate(9 * PAGE_SIZE),
        Err(HeapError::TooLarge {
            pages: 9,
            capacity: 8
        })
    );
    assert_eq!(snapshot(&heap), before);
}

#[test]
fn free_restores_the_previous_occupancy() {
    let mut heap = user_heap(16);
    heap.allocate(2 * PAGE_SIZE).unwrap();
    let (used, blocks, _, backed) = snapshot(&heap);

    let va = heap.allocate(4 * PAGE_SIZE).unwrap();
    heap.free(va).unwrap();

    let (used_after, blocks_after, _, backed_after) = snapshot(&heap);
    assert_eq!(used_after, used);
    assert_eq!(blocks_after, blocks);
    assert_eq!(backed_after, backed);
    assert_eq!(heap.bridge().releases, 1);
}

#[test]
fn refused_commit_rolls_back_the_reservation() {
    let mut heap = user_heap(8);
    heap.allocate(PAGE_SIZE).unwrap();
    let before = snapshot(&heap);

    heap.bridge_mut().fail_next_commit = true;
    assert_eq!(
        heap.allocate(3 * PAGE_SIZE),
        Err(HeapError::Bridge(BridgeError::OutOfMemory))
    );
    assert_eq!(snapshot(&heap), before);

    // the same range is handed out once the bridge cooperates
    let va = heap.allocate(3 * PAGE_SIZE).unwrap();
    assert_eq!(va, page(heap.region(), 1));
}

#[test]
fn unknown_free_changes_nothing() {
    let mut heap = user_heap(8);
    let va = heap.allocate(2 * PAGE_SIZE).unwrap();
    let before = snapshot(&heap);

    let inside = va + PAGE_SIZE;
    assert_eq!(heap.free(inside), Err(HeapError::UnknownBlock(inside)));
    let foreign = VirtualAddress::new(0xdead_0000);
    assert_eq!(heap.free(foreign), Err(HeapError::UnknownBlock(foreign)));

    assert_eq!(snapshot(&heap), before);
    assert_eq!(heap.bridge().releases, 0);
}

#[test]
fn first_fit_scans_from_the_region_start() {
    let mut heap = user_heap(8);
    let a = heap.allocate(2 * PAGE_SIZE).unwrap();
    heap.allocate(PAGE_SIZE).unwrap();
    heap.free(a).unwrap();

    heap.set_placement(UserPlacement::FirstFit);
    assert_eq!(heap.allocate(PAGE_SIZE), Ok(a));
    assert_eq!(heap.allocate(PAGE_SIZE), Ok(a + PAGE_SIZE));
}

#[test]
fn resize_without_address_allocates_and_to_zero_frees() {
    let mut heap = user_heap(8);
    let va = heap.resize(None, 1).unwrap().unwrap();
    assert_eq!(heap.block(va).map(|b| b.pages), Some(1));
    assert_eq!(heap.resize(Some(va), 0), Ok(None));
    assert_eq!(heap.free_pages(), 8);
    assert!(heap.bridge().backed.is_empty());
}

#[test]
fn resize_shrinks_in_place() {
    let mut heap = user_heap(8);
    let va = heap.allocate(4 * PAGE_SIZE).unwrap();
    assert_eq!(heap.resize(Some(va), PAGE_SIZE + 1), Ok(Some(va)));
    assert_eq!(heap.block(va).map(|b| b.pages), Some(2));
    assert!(heap.is_page_used(1) && !heap.is_page_used(2));
    assert!(!heap.bridge().is_backed(va + 2 * PAGE_SIZE));
    assert!(heap.bridge().is_backed(va + PAGE_SIZE));
}

#[test]
fn resize_grows_in_place_into_free_pages() {
    let mut heap = user_heap(8);
    let va = heap.allocate(PAGE_SIZE).unwrap();
    heap.bridge_mut().write(va, PAGE_SIZE, 7);

    assert_eq!(heap.resize(Some(va), 3 * PAGE_SIZE), Ok(Some(va)));
    assert_eq!(heap.block(va).map(|b| b.pages), Some(3));
    assert_eq!(
        heap.bridge().tags(va, 3 * PAGE_SIZE),
        vec![Some(7), Some(0), Some(0)]
    );
    assert_eq!(heap.bridge().relocations, 0);
}

#[test]
fn resize_relocates_the_contents_when_blocked() {
    let mut heap = user_heap(12);
    let va = heap.allocate(2 * PAGE_SIZE).unwrap();
    let wall = heap.allocate(PAGE_SIZE).unwrap();
    heap.bridge_mut().write(va, 2 * PAGE_SIZE, 42);

    let moved = heap.resize(Some(va), 4 * PAGE_SIZE).unwrap().unwrap();
    assert_ne!(moved, va);
    assert!(heap.block(va).is_none());
    assert_eq!(heap.block(moved).map(|b| b.pages), Some(4));
    assert_eq!(
        heap.bridge().tags(moved, 4 * PAGE_SIZE),
        vec![Some(42), Some(42), Some(0), Some(0)]
    );
    assert_eq!(heap.bridge().tags(va, 2 * PAGE_SIZE), vec![None, None]);
    assert!(!heap.is_page_used(0) && !heap.is_page_used(1));
    assert!(heap.block(wall).is_some());
    assert_disjoint(&sorted(heap.blocks().copied()));
}

#[test]
fn failed_relocation_keeps_the_original_block() {
    let mut heap = user_heap(12);
    let va = heap.allocate(2 * PAGE_SIZE).unwrap();
    heap.allocate(PAGE_SIZE).unwrap();
    heap.bridge_mut().write(va, 2 * PAGE_SIZE, 9);
    let before = snapshot(&heap);

    heap.bridge_mut().fail_relocate = true;
    assert_eq!(
        heap.resize(Some(va), 4 * PAGE_SIZE),
        Err(HeapError::Bridge(BridgeError::Denied))
    );
    assert_eq!(snapshot(&heap), before);
    assert_eq!(heap.bridge().tags(va, 2 * PAGE_SIZE), vec![Some(9), Some(9)]);

    heap.bridge_mut().fail_relocate = false;
    heap.bridge_mut().fail_next_commit = true;
    assert_eq!(
        heap.resize(Some(va), 4 * PAGE_SIZE),
        Err(HeapError::Bridge(BridgeError::OutOfMemory))
    );
    assert_eq!(snapshot(&heap), before);
}

#[test]
fn live_blocks_never_overlap() {
    let mut heap = user_heap(48);
    let mut live = Vec::new();
    let mut seed = 0x9e37_79b9_u32;
    for _ in 0..400 {
        seed ^= seed << 13;
        seed ^= seed >> 17;
        seed ^= seed << 5;
        if seed % 3 == 0 && !live.is_empty() {
            let va = live.swap_remove(seed as usize % live.len());
            heap.free(va).unwrap();
        } else if let Ok(va) = heap.allocate(u64::from(seed % 4 + 1) * PAGE_SIZE) {
            live.push(va);
        }

        let blocks = sorted(heap.blocks().copied());
        assert_disjoint(&blocks);
        let used: usize = blocks.iter().map(|b| b.pages).sum();
        assert_eq!(heap.free_pages(), 48 - used);
        assert_eq!(heap.bridge().backed.len(), used);
    }
}
