//! The per-task local memory tracker.
//!
//! ## Grab-based quota amortization
//!
//! Rather than calling into the shared pool on every allocation, a tracker
//! reserves quota in multiples of its grab size and serves later allocations
//! from that quota. Most allocate and release calls therefore touch only the
//! tracker's own counters. The cost is a bounded amount of reserved but unused
//! quota per tracker.
//!
//! ```text
//!  used ──────────────┐
//!  reserved ──────────┼──────────┐
//!                     ▼          ▼
//!  |██████████████████|░░░░░░░░░░|            ░ = slack, kept ≤ grab size
//!  0                                          after every release
//! ```
//!
//! ## Allocation order
//!
//! 1. Zero-byte requests succeed without touching anything.
//! 2. The new combined total is checked for overflow and against the local
//!    limit. A refusal here never reaches the pool.
//! 3. If the total outgrows the held quota, the shortfall is rounded up to
//!    whole grabs and reserved from the pool. If the pool refuses the rounded
//!    amount, the exact shortfall is tried before giving up.
//! 4. Only then is the counter updated, so a failed call leaves no trace.

use std::sync::Arc;

use memquota_common::config::TrackerConfig;
use memquota_common::types::{GrabSize, MemoryKind, MemoryLimit};
use memquota_common::utils::error::{Error, LimitScope, MemoryLimitExceeded, Result};

use super::monitor::{MemoryUsageMonitor, TrackerStats, UsageCounters};
use super::scoped::ScopedMemoryTracker;
use super::MemoryTracker;
use crate::pool::{MemoryPool, no_tracking};

/// Accounts native and heap bytes for one unit of work.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use memquota_common::{GrabSize, MemoryLimit};
/// use memquota_core::{GlobalMemoryPool, LocalMemoryTracker, MemoryPool, MemoryTracker};
///
/// let pool = Arc::new(GlobalMemoryPool::with_limit("transactions", 1024 * 1024));
/// let mut tracker = LocalMemoryTracker::with_limit(
///     pool.clone(),
///     MemoryLimit::bytes(64 * 1024),
///     GrabSize::from_setting(8 * 1024),
///     "db.memory.transaction.max",
/// );
///
/// tracker.allocate_heap(1000).unwrap();
/// assert_eq!(tracker.estimated_heap_memory(), 1000);
/// assert_eq!(pool.used(), 8 * 1024);
///
/// let err = tracker.allocate_native(64 * 1024).unwrap_err();
/// assert!(err.to_string().contains("db.memory.transaction.max"));
/// ```
#[derive(Debug)]
pub struct LocalMemoryTracker {
    pool: Arc<dyn MemoryPool>,
    limit: MemoryLimit,
    grab_size: GrabSize,
    setting_name: Option<String>,
    counters: Arc<UsageCounters>,
}

impl LocalMemoryTracker {
    /// Creates an unbounded tracker that does no global accounting.
    pub fn new() -> Self {
        Self::with_pool(no_tracking())
    }

    /// Creates an unbounded tracker drawing quota from `pool` in default-sized grabs.
    pub fn with_pool(pool: Arc<dyn MemoryPool>) -> Self {
        Self::from_parts(pool, TrackerConfig::default())
    }

    /// Creates a tracker with an explicit limit, grab size and setting name.
    pub fn with_limit(
        pool: Arc<dyn MemoryPool>,
        limit: MemoryLimit,
        grab_size: GrabSize,
        setting_name: impl Into<String>,
    ) -> Self {
        let config = TrackerConfig {
            limit,
            grab_size,
            setting_name: Some(setting_name.into()),
        };
        Self::from_parts(pool, config)
    }

    /// Creates a tracker from a validated configuration.
    pub fn with_config(pool: Arc<dyn MemoryPool>, config: TrackerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::from_parts(pool, config))
    }

    fn from_parts(pool: Arc<dyn MemoryPool>, config: TrackerConfig) -> Self {
        Self {
            pool,
            limit: config.limit,
            grab_size: config.grab_size,
            setting_name: config.setting_name,
            counters: Arc::new(UsageCounters::default()),
        }
    }

    /// The local limit.
    pub fn limit(&self) -> MemoryLimit {
        self.limit
    }

    /// Changes the local limit. Existing usage is not re-checked.
    pub fn set_limit(&mut self, limit: MemoryLimit) {
        tracing::debug!(old = %self.limit, new = %limit, "tracker limit changed");
        self.limit = limit;
    }

    /// The pool reservation batch size.
    pub fn grab_size(&self) -> GrabSize {
        self.grab_size
    }

    /// Configuration key that established the limit, if any.
    pub fn setting_name(&self) -> Option<&str> {
        self.setting_name.as_deref()
    }

    /// The pool this tracker reserves quota from.
    pub fn pool(&self) -> &Arc<dyn MemoryPool> {
        &self.pool
    }

    /// Quota currently held from the pool.
    pub fn reserved_from_pool(&self) -> u64 {
        self.counters.reserved()
    }

    /// Combined native and heap usage.
    pub fn total_used(&self) -> u64 {
        self.counters.total()
    }

    /// Snapshot of all counters.
    pub fn stats(&self) -> TrackerStats {
        self.monitor().snapshot()
    }

    /// Returns a read-only handle that other threads can poll.
    pub fn monitor(&self) -> MemoryUsageMonitor {
        MemoryUsageMonitor::new(Arc::clone(&self.counters))
    }

    /// Opens a child scope that releases everything it charged when closed.
    pub fn scoped(&mut self) -> ScopedMemoryTracker<'_, Self> {
        ScopedMemoryTracker::new(self)
    }

    /// Releases native memory, failing instead of clamping on underflow.
    pub fn try_release_native(&mut self, bytes: u64) -> Result<()> {
        self.try_release(MemoryKind::Native, bytes)
    }

    /// Releases heap memory, failing instead of clamping on underflow.
    pub fn try_release_heap(&mut self, bytes: u64) -> Result<()> {
        self.try_release(MemoryKind::Heap, bytes)
    }

    fn allocate(&mut self, kind: MemoryKind, bytes: u64) -> Result<()> {
        if bytes == 0 {
            return Ok(());
        }

        let used = self.counters.total();
        let Some(total) = used.checked_add(bytes) else {
            return Err(Error::Overflow {
                counter: kind.name(),
                current: used,
                delta: bytes,
            });
        };

        if let MemoryLimit::Bytes(limit) = self.limit
            && self.limit.is_exceeded_by(total)
        {
            tracing::debug!(
                kind = kind.name(),
                bytes,
                used,
                limit,
                setting = self.setting_name.as_deref(),
                "tracker limit exceeded"
            );
            let mut err = MemoryLimitExceeded::new(LimitScope::Tracker, bytes, limit, used);
            err.setting_name.clone_from(&self.setting_name);
            return Err(err.into());
        }

        self.ensure_reserved(total)?;

        let current = self.counters.get(kind);
        self.counters.set(kind, current + bytes);
        Ok(())
    }

    /// Makes sure at least `total` bytes of quota are held.
    fn ensure_reserved(&mut self, total: u64) -> Result<()> {
        if !self.grab_size.is_pooling() {
            return Ok(());
        }

        let reserved = self.counters.reserved();
        if total <= reserved {
            return Ok(());
        }

        let shortfall = total - reserved;
        let grab = self.grab_size.round_up(shortfall).min(u64::MAX - reserved);

        let granted = match self.pool.reserve(grab) {
            Ok(()) => grab,
            Err(_) if grab > shortfall => {
                self.pool.reserve(shortfall)?;
                shortfall
            }
            Err(e) => return Err(e),
        };

        self.counters.set_reserved(reserved + granted);
        tracing::debug!(
            pool = self.pool.name(),
            granted,
            reserved = reserved + granted,
            "reserved quota from pool"
        );
        Ok(())
    }

    fn release(&mut self, kind: MemoryKind, bytes: u64) {
        if bytes == 0 {
            return;
        }

        let current = self.counters.get(kind);
        if bytes > current {
            tracing::warn!(
                kind = kind.name(),
                requested = bytes,
                tracked = current,
                "released more memory than was tracked; clamping to zero"
            );
        }
        self.counters.set(kind, current.saturating_sub(bytes));
        self.return_surplus();
    }

    fn try_release(&mut self, kind: MemoryKind, bytes: u64) -> Result<()> {
        let available = self.counters.get(kind);
        if bytes > available {
            return Err(Error::ReleaseUnderflow {
                counter: kind.name(),
                requested: bytes,
                available,
            });
        }
        self.release(kind, bytes);
        Ok(())
    }

    /// Gives whole grabs back to the pool until at most one grab of slack remains.
    fn return_surplus(&mut self) {
        let Some(grab) = self.grab_size.as_bytes() else {
            return;
        };

        let reserved = self.counters.reserved();
        let slack = reserved.saturating_sub(self.counters.total());
        if slack <= grab {
            return;
        }

        let surplus = (slack - grab).div_ceil(grab) * grab;
        self.pool.release(surplus);
        self.counters.set_reserved(reserved - surplus);
        tracing::debug!(
            pool = self.pool.name(),
            returned = surplus,
            reserved = reserved - surplus,
            "returned surplus quota to pool"
        );
    }

    fn release_reservation(&mut self) {
        let reserved = self.counters.reserved();
        if reserved > 0 {
            self.pool.release(reserved);
            self.counters.set_reserved(0);
            tracing::debug!(pool = self.pool.name(), returned = reserved, "returned all quota to pool");
        }
    }
}

impl Default for LocalMemoryTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTracker for LocalMemoryTracker {
    fn allocate_native(&mut self, bytes: u64) -> Result<()> {
        self.allocate(MemoryKind::Native, bytes)
    }

    fn release_native(&mut self, bytes: u64) {
        self.release(MemoryKind::Native, bytes);
    }

    fn allocate_heap(&mut self, bytes: u64) -> Result<()> {
        self.allocate(MemoryKind::Heap, bytes)
    }

    fn release_heap(&mut self, bytes: u64) {
        self.release(MemoryKind::Heap, bytes);
    }

    fn used_native_memory(&self) -> u64 {
        self.counters.native()
    }

    fn estimated_heap_memory(&self) -> u64 {
        self.counters.heap()
    }

    fn heap_high_water_mark(&self) -> u64 {
        self.counters.heap_peak()
    }

    fn reset(&mut self) {
        self.counters.clear();
        self.release_reservation();
    }
}

impl Drop for LocalMemoryTracker {
    fn drop(&mut self) {
        let outstanding = self.counters.total();
        if outstanding > 0 {
            tracing::debug!(outstanding, "tracker dropped with memory still charged");
        }
        self.release_reservation();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::GlobalMemoryPool;

    fn pooled(limit: u64, grab: u64) -> (Arc<GlobalMemoryPool>, LocalMemoryTracker) {
        let pool = Arc::new(GlobalMemoryPool::with_limit("global", limit));
        let tracker = LocalMemoryTracker::with_limit(
            pool.clone(),
            MemoryLimit::Unbounded,
            GrabSize::from_setting(grab),
            "settingName",
        );
        (pool, tracker)
    }

    #[test]
    fn test_track_native_allocations() {
        let mut tracker = LocalMemoryTracker::new();
        tracker.allocate_native(10).unwrap();
        tracker.allocate_native(20).unwrap();
        tracker.allocate_native(40).unwrap();
        assert_eq!(tracker.used_native_memory(), 70);
    }

    #[test]
    fn test_track_native_deallocations() {
        let mut tracker = LocalMemoryTracker::new();
        tracker.allocate_native(100).unwrap();
        assert_eq!(tracker.used_native_memory(), 100);

        tracker.release_native(20);
        assert_eq!(tracker.used_native_memory(), 80);

        tracker.release_native(40);
        assert_eq!(tracker.used_native_memory(), 40);
    }

    #[test]
    fn test_track_heap_allocations() {
        let mut tracker = LocalMemoryTracker::new();
        tracker.allocate_heap(10).unwrap();
        tracker.allocate_heap(20).unwrap();
        tracker.allocate_heap(40).unwrap();
        assert_eq!(tracker.estimated_heap_memory(), 70);
    }

    #[test]
    fn test_track_heap_deallocations() {
        let mut tracker = LocalMemoryTracker::new();
        tracker.allocate_heap(100).unwrap();
        assert_eq!(tracker.estimated_heap_memory(), 100);

        tracker.release_heap(20);
        assert_eq!(tracker.estimated_heap_memory(), 80);

        tracker.release_heap(40);
        assert_eq!(tracker.estimated_heap_memory(), 40);
    }

    #[test]
    fn test_throws_on_limit() {
        let mut tracker = LocalMemoryTracker::with_limit(
            no_tracking(),
            MemoryLimit::bytes(10),
            GrabSize::NoPooling,
            "settingName",
        );

        let err = tracker.allocate_heap(100).unwrap_err();
        assert!(err.is_limit_exceeded());
        assert!(err.to_string().contains("settingName"));
        assert_eq!(tracker.estimated_heap_memory(), 0);
    }

    #[test]
    fn test_limit_reached_exactly() {
        let mut tracker = LocalMemoryTracker::with_limit(
            no_tracking(),
            MemoryLimit::bytes(10),
            GrabSize::NoPooling,
            "settingName",
        );
        tracker.allocate_heap(10).unwrap();
        assert_eq!(tracker.estimated_heap_memory(), 10);

        // zero-byte allocations never fail, even at the limit
        tracker.allocate_heap(0).unwrap();
        tracker.allocate_native(0).unwrap();

        let err = tracker.allocate_native(1).unwrap_err();
        let limit = err.as_limit_exceeded().unwrap();
        assert_eq!(limit.scope, LimitScope::Tracker);
        assert_eq!(limit.attempted, 1);
        assert_eq!(limit.limit, 10);
        assert_eq!(limit.used, 10);
    }

    #[test]
    fn test_native_and_heap_share_limit() {
        let mut tracker = LocalMemoryTracker::with_limit(
            no_tracking(),
            MemoryLimit::bytes(100),
            GrabSize::NoPooling,
            "settingName",
        );
        tracker.allocate_native(60).unwrap();
        assert!(tracker.allocate_heap(41).is_err());
        tracker.allocate_heap(40).unwrap();
        assert_eq!(tracker.total_used(), 100);
    }

    #[test]
    fn test_release_clamps_at_zero() {
        let mut tracker = LocalMemoryTracker::new();
        tracker.allocate_native(10).unwrap();
        tracker.release_native(1000);
        assert_eq!(tracker.used_native_memory(), 0);

        tracker.release_heap(1);
        assert_eq!(tracker.estimated_heap_memory(), 0);
    }

    #[test]
    fn test_strict_release() {
        let mut tracker = LocalMemoryTracker::new();
        tracker.allocate_heap(10).unwrap();

        let err = tracker.try_release_heap(11).unwrap_err();
        assert!(matches!(
            err,
            Error::ReleaseUnderflow {
                counter: "heap",
                requested: 11,
                available: 10
            }
        ));
        assert_eq!(tracker.estimated_heap_memory(), 10);

        tracker.try_release_heap(10).unwrap();
        assert_eq!(tracker.estimated_heap_memory(), 0);
        assert!(tracker.try_release_native(1).is_err());
    }

    #[test]
    fn test_unbounded_overflow_detected() {
        let mut tracker = LocalMemoryTracker::with_limit(
            no_tracking(),
            MemoryLimit::Unbounded,
            GrabSize::NoPooling,
            "settingName",
        );
        tracker.allocate_native(u64::MAX - 5).unwrap();

        let err = tracker.allocate_heap(10).unwrap_err();
        assert!(matches!(err, Error::Overflow { counter: "heap", .. }));
        assert_eq!(tracker.estimated_heap_memory(), 0);
        assert_eq!(tracker.used_native_memory(), u64::MAX - 5);
    }

    #[test]
    fn test_grabs_in_whole_units() {
        let (pool, mut tracker) = pooled(1000, 50);

        tracker.allocate_heap(10).unwrap();
        assert_eq!(tracker.reserved_from_pool(), 50);
        assert_eq!(pool.used(), 50);

        // served from held quota
        tracker.allocate_native(40).unwrap();
        assert_eq!(pool.used(), 50);

        tracker.allocate_native(61).unwrap();
        assert_eq!(tracker.reserved_from_pool(), 150);
        assert_eq!(pool.used(), 150);
    }

    #[test]
    fn test_falls_back_to_exact_shortfall() {
        let (pool, mut tracker) = pooled(70, 50);

        tracker.allocate_heap(60).unwrap();
        assert_eq!(tracker.reserved_from_pool(), 60);
        assert_eq!(pool.used(), 60);
    }

    #[test]
    fn test_pool_exhaustion_leaves_no_trace() {
        let (pool, mut tracker) = pooled(100, 50);
        pool.reserve(90).unwrap();

        let err = tracker.allocate_heap(20).unwrap_err();
        let limit = err.as_limit_exceeded().unwrap();
        assert_eq!(limit.scope, LimitScope::Pool);
        assert_eq!(limit.setting_name.as_deref(), Some("global"));

        assert_eq!(tracker.estimated_heap_memory(), 0);
        assert_eq!(tracker.reserved_from_pool(), 0);
        assert_eq!(pool.used(), 90);
    }

    #[test]
    fn test_local_limit_checked_before_pool() {
        let pool = Arc::new(GlobalMemoryPool::with_limit("global", 10));
        let mut tracker = LocalMemoryTracker::with_limit(
            pool.clone(),
            MemoryLimit::bytes(20),
            GrabSize::from_setting(5),
            "settingName",
        );

        let err = tracker.allocate_heap(30).unwrap_err();
        assert_eq!(err.as_limit_exceeded().unwrap().scope, LimitScope::Tracker);
        assert_eq!(pool.used(), 0);
    }

    #[test]
    fn test_release_returns_surplus() {
        let (pool, mut tracker) = pooled(1000, 50);

        tracker.allocate_heap(200).unwrap();
        assert_eq!(pool.used(), 200);

        // slack of 40 stays local
        tracker.release_heap(40);
        assert_eq!(tracker.reserved_from_pool(), 200);

        // slack of 190 exceeds one grab: give back three grabs, keep 40
        tracker.release_heap(150);
        assert_eq!(tracker.reserved_from_pool(), 50);
        assert_eq!(pool.used(), 50);

        tracker.release_heap(10);
        assert_eq!(tracker.reserved_from_pool(), 50);
    }

    #[test]
    fn test_reset_returns_quota() {
        let (pool, mut tracker) = pooled(1000, 50);
        tracker.allocate_heap(120).unwrap();
        tracker.allocate_native(30).unwrap();

        tracker.reset();
        assert_eq!(tracker.used_native_memory(), 0);
        assert_eq!(tracker.estimated_heap_memory(), 0);
        assert_eq!(tracker.heap_high_water_mark(), 0);
        assert_eq!(tracker.reserved_from_pool(), 0);
        assert_eq!(pool.used(), 0);

        // reusable after reset
        tracker.allocate_heap(10).unwrap();
        assert_eq!(pool.used(), 50);
    }

    #[test]
    fn test_drop_returns_quota() {
        let (pool, mut tracker) = pooled(1000, 50);
        tracker.allocate_native(75).unwrap();
        assert_eq!(pool.used(), 100);

        drop(tracker);
        assert_eq!(pool.used(), 0);
    }

    #[test]
    fn test_no_pooling_never_touches_pool() {
        let pool = Arc::new(GlobalMemoryPool::with_limit("global", 1));
        let mut tracker = LocalMemoryTracker::with_limit(
            pool.clone(),
            MemoryLimit::Unbounded,
            GrabSize::NoPooling,
            "settingName",
        );
        tracker.allocate_heap(1_000_000).unwrap();
        assert_eq!(pool.used(), 0);
        assert_eq!(tracker.reserved_from_pool(), 0);
    }

    #[test]
    fn test_heap_high_water_mark() {
        let mut tracker = LocalMemoryTracker::new();
        tracker.allocate_heap(100).unwrap();
        tracker.release_heap(80);
        tracker.allocate_heap(30).unwrap();

        assert_eq!(tracker.estimated_heap_memory(), 50);
        assert_eq!(tracker.heap_high_water_mark(), 100);

        tracker.allocate_native(500).unwrap();
        assert_eq!(tracker.heap_high_water_mark(), 100);
    }

    #[test]
    fn test_set_limit() {
        let mut tracker = LocalMemoryTracker::new();
        tracker.allocate_heap(50).unwrap();

        tracker.set_limit(MemoryLimit::bytes(40));
        assert!(tracker.allocate_heap(1).is_err());
        assert_eq!(tracker.estimated_heap_memory(), 50);

        tracker.release_heap(20);
        tracker.allocate_heap(10).unwrap();
        assert_eq!(tracker.limit(), MemoryLimit::bytes(40));
    }

    #[test]
    fn test_with_config_validates() {
        let config = TrackerConfig::default().with_setting_name(" ");
        assert!(LocalMemoryTracker::with_config(no_tracking(), config).is_err());

        let config = TrackerConfig::from_settings(10, 0, "settingName");
        let tracker = LocalMemoryTracker::with_config(no_tracking(), config).unwrap();
        assert_eq!(tracker.limit(), MemoryLimit::bytes(10));
        assert_eq!(tracker.grab_size(), GrabSize::NoPooling);
        assert_eq!(tracker.setting_name(), Some("settingName"));
    }

    #[test]
    fn test_usable_through_mut_reference() {
        fn charge(mut tracker: impl MemoryTracker) {
            tracker.allocate_heap(5).unwrap();
        }

        let mut tracker = LocalMemoryTracker::new();
        charge(&mut tracker);
        assert_eq!(tracker.estimated_heap_memory(), 5);
    }
}
