//! No-op tracker.

use memquota_common::utils::error::Result;

use super::MemoryTracker;

/// A tracker that accepts everything and reports nothing.
///
/// For code paths that take a tracker but have no budget to enforce.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EmptyMemoryTracker;

impl MemoryTracker for EmptyMemoryTracker {
    fn allocate_native(&mut self, _bytes: u64) -> Result<()> {
        Ok(())
    }

    fn release_native(&mut self, _bytes: u64) {}

    fn allocate_heap(&mut self, _bytes: u64) -> Result<()> {
        Ok(())
    }

    fn release_heap(&mut self, _bytes: u64) {}

    fn used_native_memory(&self) -> u64 {
        0
    }

    fn estimated_heap_memory(&self) -> u64 {
        0
    }

    fn heap_high_water_mark(&self) -> u64 {
        0
    }

    fn reset(&mut self) {}
}
