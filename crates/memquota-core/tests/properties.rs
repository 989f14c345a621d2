//! Property tests for tracker accounting.

use std::sync::Arc;

use memquota_common::{GrabSize, MemoryLimit};
use memquota_core::{GlobalMemoryPool, LocalMemoryTracker, MemoryPool, MemoryTracker, no_tracking};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    AllocNative(u64),
    AllocHeap(u64),
    ReleaseNative(u64),
    ReleaseHeap(u64),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..10_000u64).prop_map(Op::AllocNative),
        (0..10_000u64).prop_map(Op::AllocHeap),
        (0..12_000u64).prop_map(Op::ReleaseNative),
        (0..12_000u64).prop_map(Op::ReleaseHeap),
    ]
}

proptest! {
    #[test]
    fn allocations_sum(sizes in prop::collection::vec(0..1_000_000u64, 0..64)) {
        let mut tracker = LocalMemoryTracker::new();
        for &size in &sizes {
            tracker.allocate_native(size).unwrap();
        }
        prop_assert_eq!(tracker.used_native_memory(), sizes.iter().sum::<u64>());
    }

    #[test]
    fn allocate_release_round_trip(before in 0..1_000_000u64, size in 0..1_000_000u64) {
        let mut tracker = LocalMemoryTracker::new();
        tracker.allocate_native(before).unwrap();
        tracker.allocate_native(size).unwrap();
        tracker.release_native(size);
        prop_assert_eq!(tracker.used_native_memory(), before);
    }

    #[test]
    fn release_never_underflows(alloc in 0..1_000u64, release in 0..u64::MAX) {
        let mut tracker = LocalMemoryTracker::new();
        tracker.allocate_heap(alloc).unwrap();
        tracker.release_heap(release);
        prop_assert_eq!(tracker.estimated_heap_memory(), alloc.saturating_sub(release));
    }

    #[test]
    fn limit_is_inclusive(limit in 1..u64::MAX) {
        let mut exact = LocalMemoryTracker::with_limit(
            no_tracking(), MemoryLimit::bytes(limit), GrabSize::NoPooling, "settingName");
        exact.allocate_heap(limit).unwrap();
        prop_assert_eq!(exact.estimated_heap_memory(), limit);

        let mut over = LocalMemoryTracker::with_limit(
            no_tracking(), MemoryLimit::bytes(limit - 1), GrabSize::NoPooling, "settingName");
        let err = over.allocate_heap(limit).unwrap_err();
        prop_assert!(err.to_string().contains("settingName"));
        prop_assert_eq!(over.estimated_heap_memory(), 0);
    }

    #[test]
    fn pooled_tracker_invariants(
        ops in prop::collection::vec(op(), 0..200),
        grab in 1..4096u64,
        pool_limit in 0..50_000u64,
        local_limit in 0..60_000u64,
    ) {
        let pool = Arc::new(GlobalMemoryPool::with_limit("global", pool_limit));
        let mut tracker = LocalMemoryTracker::with_limit(
            pool.clone(),
            MemoryLimit::from_setting(local_limit),
            GrabSize::from_setting(grab),
            "settingName",
        );

        for op in ops {
            let before = tracker.stats();
            let result = match op {
                Op::AllocNative(n) => tracker.allocate_native(n),
                Op::AllocHeap(n) => tracker.allocate_heap(n),
                Op::ReleaseNative(n) => { tracker.release_native(n); Ok(()) }
                Op::ReleaseHeap(n) => { tracker.release_heap(n); Ok(()) }
            };

            if result.is_err() {
                prop_assert_eq!(tracker.used_native_memory(), before.native);
                prop_assert_eq!(tracker.estimated_heap_memory(), before.heap);
                prop_assert_eq!(tracker.reserved_from_pool(), before.reserved);
            }

            let used = tracker.total_used();
            let reserved = tracker.reserved_from_pool();
            prop_assert!(reserved >= used);
            prop_assert!(reserved - used <= grab);
            prop_assert_eq!(pool.used(), reserved);
            prop_assert!(pool.used() <= pool_limit);
            if local_limit > 0 {
                prop_assert!(used <= local_limit);
            }
        }

        drop(tracker);
        prop_assert_eq!(pool.used(), 0);
    }
}
