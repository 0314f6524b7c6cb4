mod support;

use heap_addresses::PAGE_SIZE;
use heap_alloc::{BlockKind, BridgeError, HeapError, OwnerId, SharedObjectBridge};
use support::{SELF_OWNER, page, user_heap};

const OTHER: OwnerId = OwnerId(7);

#[test]
fn created_objects_are_placed_first_fit_and_keep_the_cursor() {
    let mut heap = user_heap(16);
    let a = heap.allocate(2 * PAGE_SIZE).unwrap();
    heap.allocate(PAGE_SIZE).unwrap();
    heap.free(a).unwrap();
    let cursor = heap.cursor();

    let va = heap.create_shared("frame-buffer", PAGE_SIZE + 1, true).unwrap();
    assert_eq!(va, page(heap.region(), 0));
    assert_eq!(heap.cursor(), cursor);

    let block = *heap.block(va).unwrap();
    assert_eq!(block.pages, 2);
    assert!(matches!(block.kind, BlockKind::Shared(_)));
    assert!(heap.bridge().objects[0].writable);
    assert_eq!(heap.bridge().size_of(SELF_OWNER, "frame-buffer"), Some(PAGE_SIZE + 1));
}

#[test]
fn attach_maps_an_object_owned_elsewhere() {
    let mut heap = user_heap(8);
    let id = heap.bridge_mut().publish(OTHER, "ring", 3 * PAGE_SIZE);

    let va = heap.attach_shared(OTHER, "ring").unwrap();
    assert_eq!(heap.block(va).map(|b| (b.pages, b.kind)), Some((3, BlockKind::Shared(id))));
    assert_eq!(heap.bridge().attached, vec![(id, va)]);
    assert_eq!(heap.free_pages(), 5);
}

#[test]
fn attaching_a_missing_object_changes_nothing() {
    let mut heap = user_heap(8);
    heap.bridge_mut().publish(OTHER, "ring", PAGE_SIZE);

    assert_eq!(
        heap.attach_shared(OTHER, "missing"),
        Err(HeapError::Bridge(BridgeError::NoSuchObject))
    );
    assert_eq!(
        heap.attach_shared(SELF_OWNER, "ring"),
        Err(HeapError::Bridge(BridgeError::NoSuchObject))
    );
    assert_eq!(heap.free_pages(), 8);
    assert_eq!(heap.blocks().count(), 0);
}

#[test]
fn refused_create_drops_the_reservation() {
    let mut heap = user_heap(8);
    heap.create_shared("log", PAGE_SIZE, false).unwrap();

    assert_eq!(
        heap.create_shared("log", 2 * PAGE_SIZE, false),
        Err(HeapError::Bridge(BridgeError::AlreadyExists))
    );
    assert_eq!(heap.blocks().count(), 1);
    assert_eq!(heap.free_pages(), 7);
}

#[test]
fn shared_and_private_blocks_use_their_own_release_paths() {
    let mut heap = user_heap(8);
    let shared = heap.create_shared("cfg", PAGE_SIZE, true).unwrap();
    let private = heap.allocate(PAGE_SIZE).unwrap();

    assert_eq!(heap.free(shared), Err(HeapError::SharedBlock(shared)));
    assert_eq!(
        heap.resize(Some(shared), 2 * PAGE_SIZE),
        Err(HeapError::SharedBlock(shared))
    );
    assert_eq!(heap.detach_shared(private), Err(HeapError::NotShared(private)));

    heap.detach_shared(shared).unwrap();
    assert!(heap.bridge().attached.is_empty());
    assert!(heap.block(shared).is_none());
    assert_eq!(heap.detach_shared(shared), Err(HeapError::UnknownBlock(shared)));

    heap.free(private).unwrap();
    assert_eq!(heap.free_pages(), 8);
}
