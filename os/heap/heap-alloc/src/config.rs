//! Runtime heap configuration.

use heap_addresses::{HeapRegion, layout};

/// Kernel heap placement strategy.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub enum KernelPlacement {
    /// Smallest sufficient run; lowest address on ties.
    #[default]
    BestFit,
    /// Lowest-address sufficient run.
    FirstFit,
}

/// User heap placement strategy.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub enum UserPlacement {
    /// First sufficient run at or after the persistent cursor.
    #[default]
    NextFit,
    /// First sufficient run from the start of the region.
    FirstFit,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct KernelHeapConfig {
    pub region: HeapRegion,
    pub placement: KernelPlacement,
}

impl KernelHeapConfig {
    #[must_use]
    pub const fn new(region: HeapRegion) -> Self {
        Self {
            region,
            placement: KernelPlacement::BestFit,
        }
    }

    #[must_use]
    pub const fn with_placement(mut self, placement: KernelPlacement) -> Self {
        self.placement = placement;
        self
    }
}

impl Default for KernelHeapConfig {
    fn default() -> Self {
        Self::new(layout::KERNEL_HEAP)
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct UserHeapConfig {
    pub region: HeapRegion,
    pub placement: UserPlacement,
}

impl UserHeapConfig {
    #[must_use]
    pub const fn new(region: HeapRegion) -> Self {
        Self {
            region,
            placement: UserPlacement::NextFit,
        }
    }

    #[must_use]
    pub const fn with_placement(mut self, placement: UserPlacement) -> Self {
        self.placement = placement;
        self
    }
}

impl Default for UserHeapConfig {
    fn default() -> Self {
        Self::new(layout::USER_HEAP)
    }
}
