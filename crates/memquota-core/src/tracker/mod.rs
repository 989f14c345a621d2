//! Memory trackers.
//!
//! A tracker is the per-task accounting unit. It keeps running totals for
//! native and heap bytes and refuses allocations that would break its limit.
//!
//! - [`LocalMemoryTracker`] - The main tracker: local limit plus batched pool reservations
//! - [`ScopedMemoryTracker`] - Child view that hands everything back to its parent on close
//! - [`EmptyMemoryTracker`] - No-op tracker for paths that do not account
//! - [`MemoryUsageMonitor`] - Read-only handle for monitoring threads

mod empty;
mod local;
mod monitor;
mod scoped;

use memquota_common::utils::error::Result;

pub use empty::EmptyMemoryTracker;
pub use local::LocalMemoryTracker;
pub use monitor::{MemoryUsageMonitor, TrackerStats};
pub use scoped::ScopedMemoryTracker;

/// Accounting contract shared by all trackers.
///
/// Mutation takes `&mut self`: a tracker has a single writer. Tasks that need
/// concurrent accounting create one tracker each and share a pool.
pub trait MemoryTracker {
    /// Charges `bytes` of native memory.
    ///
    /// On failure the tracker's counters are exactly as they were before the
    /// call. Allocating zero bytes always succeeds.
    fn allocate_native(&mut self, bytes: u64) -> Result<()>;

    /// Releases `bytes` of native memory, clamping at zero.
    fn release_native(&mut self, bytes: u64);

    /// Charges `bytes` of heap memory, against the same limit as native memory.
    fn allocate_heap(&mut self, bytes: u64) -> Result<()>;

    /// Releases `bytes` of heap memory, clamping at zero.
    fn release_heap(&mut self, bytes: u64);

    /// Native bytes currently charged.
    fn used_native_memory(&self) -> u64;

    /// Heap bytes currently charged.
    fn estimated_heap_memory(&self) -> u64;

    /// Peak heap usage since creation or the last [`reset`](Self::reset).
    fn heap_high_water_mark(&self) -> u64;

    /// Zeroes all counters and gives back any held quota.
    fn reset(&mut self);
}

impl<T: MemoryTracker + ?Sized> MemoryTracker for &mut T {
    fn allocate_native(&mut self, bytes: u64) -> Result<()> {
        (**self).allocate_native(bytes)
    }

    fn release_native(&mut self, bytes: u64) {
        (**self).release_native(bytes);
    }

    fn allocate_heap(&mut self, bytes: u64) -> Result<()> {
        (**self).allocate_heap(bytes)
    }

    fn release_heap(&mut self, bytes: u64) {
        (**self).release_heap(bytes);
    }

    fn used_native_memory(&self) -> u64 {
        (**self).used_native_memory()
    }

    fn estimated_heap_memory(&self) -> u64 {
        (**self).estimated_heap_memory()
    }

    fn heap_high_water_mark(&self) -> u64 {
        (**self).heap_high_water_mark()
    }

    fn reset(&mut self) {
        (**self).reset();
    }
}
