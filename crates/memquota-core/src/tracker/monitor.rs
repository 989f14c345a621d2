//! Cross-thread read access to a tracker's counters.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use memquota_common::types::MemoryKind;
use serde::Serialize;

/// Counters owned by one tracker.
///
/// Only the owning tracker writes; each write is a plain store of a value the
/// owner computed, so no read-modify-write atomics are needed. Readers on
/// other threads see each counter untorn.
#[derive(Debug, Default)]
pub(crate) struct UsageCounters {
    native: AtomicU64,
    heap: AtomicU64,
    heap_peak: AtomicU64,
    reserved: AtomicU64,
}

impl UsageCounters {
    pub(crate) fn get(&self, kind: MemoryKind) -> u64 {
        self.counter(kind).load(Ordering::Acquire)
    }

    pub(crate) fn set(&self, kind: MemoryKind, value: u64) {
        self.counter(kind).store(value, Ordering::Release);
        if kind == MemoryKind::Heap && value > self.heap_peak.load(Ordering::Relaxed) {
            self.heap_peak.store(value, Ordering::Release);
        }
    }

    pub(crate) fn native(&self) -> u64 {
        self.native.load(Ordering::Acquire)
    }

    pub(crate) fn heap(&self) -> u64 {
        self.heap.load(Ordering::Acquire)
    }

    pub(crate) fn heap_peak(&self) -> u64 {
        self.heap_peak.load(Ordering::Acquire)
    }

    /// Combined native and heap usage.
    ///
    /// Allocation refuses any total that does not fit in a `u64`, so the sum
    /// of the two counters never overflows.
    pub(crate) fn total(&self) -> u64 {
        self.native().saturating_add(self.heap())
    }

    pub(crate) fn reserved(&self) -> u64 {
        self.reserved.load(Ordering::Acquire)
    }

    pub(crate) fn set_reserved(&self, value: u64) {
        self.reserved.store(value, Ordering::Release);
    }

    pub(crate) fn clear(&self) {
        self.native.store(0, Ordering::Release);
        self.heap.store(0, Ordering::Release);
        self.heap_peak.store(0, Ordering::Release);
    }

    fn counter(&self, kind: MemoryKind) -> &AtomicU64 {
        match kind {
            MemoryKind::Native => &self.native,
            MemoryKind::Heap => &self.heap,
        }
    }

    fn snapshot(&self) -> TrackerStats {
        TrackerStats {
            native: self.native(),
            heap: self.heap(),
            heap_peak: self.heap_peak(),
            reserved: self.reserved(),
        }
    }
}

/// Point-in-time snapshot of a tracker's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TrackerStats {
    /// Native bytes in use.
    pub native: u64,
    /// Heap bytes in use.
    pub heap: u64,
    /// Peak heap usage since creation or the last reset.
    pub heap_peak: u64,
    /// Quota currently held from the pool.
    pub reserved: u64,
}

impl TrackerStats {
    /// Combined native and heap usage.
    pub fn total(&self) -> u64 {
        self.native.saturating_add(self.heap)
    }
}

/// Read-only handle to a tracker's counters.
///
/// Cheap to clone and safe to poll from any thread while the owning task keeps
/// allocating. Values are individually consistent; a snapshot taken during an
/// allocation may pair the old native count with the new heap count.
#[derive(Debug, Clone)]
pub struct MemoryUsageMonitor {
    counters: Arc<UsageCounters>,
}

impl MemoryUsageMonitor {
    pub(crate) fn new(counters: Arc<UsageCounters>) -> Self {
        Self { counters }
    }

    /// Native bytes in use.
    pub fn used_native_memory(&self) -> u64 {
        self.counters.native()
    }

    /// Heap bytes in use.
    pub fn estimated_heap_memory(&self) -> u64 {
        self.counters.heap()
    }

    /// Peak heap usage since creation or the last reset.
    pub fn heap_high_water_mark(&self) -> u64 {
        self.counters.heap_peak()
    }

    /// Quota currently held from the pool.
    pub fn reserved_from_pool(&self) -> u64 {
        self.counters.reserved()
    }

    /// Snapshot of all counters.
    pub fn snapshot(&self) -> TrackerStats {
        self.counters.snapshot()
    }
}
