//! Scoped child trackers.

use memquota_common::types::MemoryKind;
use memquota_common::utils::error::Result;

use super::MemoryTracker;

/// A child view over a parent tracker.
///
/// Allocations are forwarded to the parent, so the parent's limit and pool
/// still apply. The scope remembers what it forwarded and hands all of it back
/// when it is closed or dropped, which suits operator-local buffers inside a
/// larger unit of work. Counters reported by the scope cover only its own
/// allocations.
///
/// ```
/// use memquota_core::{LocalMemoryTracker, MemoryTracker};
///
/// let mut tracker = LocalMemoryTracker::new();
/// tracker.allocate_heap(100).unwrap();
/// {
///     let mut scope = tracker.scoped();
///     scope.allocate_heap(40).unwrap();
///     assert_eq!(scope.estimated_heap_memory(), 40);
/// }
/// assert_eq!(tracker.estimated_heap_memory(), 100);
/// ```
#[derive(Debug)]
pub struct ScopedMemoryTracker<'a, T: MemoryTracker + ?Sized> {
    parent: &'a mut T,
    native: u64,
    heap: u64,
    heap_peak: u64,
}

impl<'a, T: MemoryTracker + ?Sized> ScopedMemoryTracker<'a, T> {
    /// Opens a scope over `parent`.
    pub fn new(parent: &'a mut T) -> Self {
        Self {
            parent,
            native: 0,
            heap: 0,
            heap_peak: 0,
        }
    }

    /// The tracker this scope forwards to.
    pub fn parent(&self) -> &T {
        &*self.parent
    }

    /// Releases everything charged through this scope and closes it.
    pub fn close(self) {}

    fn counter_mut(&mut self, kind: MemoryKind) -> &mut u64 {
        match kind {
            MemoryKind::Native => &mut self.native,
            MemoryKind::Heap => &mut self.heap,
        }
    }

    fn release(&mut self, kind: MemoryKind, bytes: u64) {
        let held = *self.counter_mut(kind);
        let bytes = if bytes > held {
            tracing::warn!(
                kind = kind.name(),
                requested = bytes,
                tracked = held,
                "scope released more memory than it charged; clamping"
            );
            held
        } else {
            bytes
        };
        if bytes == 0 {
            return;
        }

        *self.counter_mut(kind) = held - bytes;
        match kind {
            MemoryKind::Native => self.parent.release_native(bytes),
            MemoryKind::Heap => self.parent.release_heap(bytes),
        }
    }

    fn release_all(&mut self) {
        self.release(MemoryKind::Native, self.native);
        self.release(MemoryKind::Heap, self.heap);
    }
}

impl<T: MemoryTracker + ?Sized> MemoryTracker for ScopedMemoryTracker<'_, T> {
    fn allocate_native(&mut self, bytes: u64) -> Result<()> {
        self.parent.allocate_native(bytes)?;
        self.native = self.native.saturating_add(bytes);
        Ok(())
    }

    fn release_native(&mut self, bytes: u64) {
        self.release(MemoryKind::Native, bytes);
    }

    fn allocate_heap(&mut self, bytes: u64) -> Result<()> {
        self.parent.allocate_heap(bytes)?;
        self.heap = self.heap.saturating_add(bytes);
        self.heap_peak = self.heap_peak.max(self.heap);
        Ok(())
    }

    fn release_heap(&mut self, bytes: u64) {
        self.release(MemoryKind::Heap, bytes);
    }

    fn used_native_memory(&self) -> u64 {
        self.native
    }

    fn estimated_heap_memory(&self) -> u64 {
        self.heap
    }

    fn heap_high_water_mark(&self) -> u64 {
        self.heap_peak
    }

    fn reset(&mut self) {
        self.release_all();
        self.heap_peak = 0;
    }
}

impl<T: MemoryTracker + ?Sized> Drop for ScopedMemoryTracker<'_, T> {
    fn drop(&mut self) {
        self.release_all();
    }
}
