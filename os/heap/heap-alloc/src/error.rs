use crate::bridge::BridgeError;
use crate::registry::RegistryError;
use heap_addresses::VirtualAddress;
use heap_vmem::{FrameError, MapError};

/// Why a heap operation failed.
///
/// Every failure leaves the heap exactly as it was before the call.
#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum HeapError {
    #[error("zero-sized request")]
    ZeroSize,

    #[error("request for {pages} pages exceeds the region capacity of {capacity} pages")]
    TooLarge { pages: u64, capacity: usize },

    /// Placement exhaustion: no free run is long enough.
    #[error("no free run of {pages} pages")]
    NoFit { pages: usize },

    #[error("out of physical frames")]
    OutOfFrames,

    /// No live block starts at this address.
    #[error("no block starts at {0}")]
    UnknownBlock(VirtualAddress),

    #[error("block at {0} is a shared mapping")]
    SharedBlock(VirtualAddress),

    #[error("block at {0} is not a shared mapping")]
    NotShared(VirtualAddress),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Map(#[from] MapError),

    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error(transparent)]
    Bridge(#[from] BridgeError),
}
