//! Shared quota pools.
//!
//! A pool is the process-wide capacity holder that local trackers reserve
//! quota from. It is passed to every tracker explicitly at construction and
//! outlives all of them.
//!
//! - [`GlobalMemoryPool`] - Atomic, lock-free pool with an optional limit
//! - [`NoTrackingPool`] - Degenerate pool that never refuses and keeps no books
//! - [`PoolStats`] - Point-in-time snapshot for reporting

mod global;
mod no_tracking;
mod stats;

use std::fmt;

use memquota_common::types::MemoryLimit;
use memquota_common::utils::error::Result;

pub use global::GlobalMemoryPool;
pub use no_tracking::{NoTrackingPool, no_tracking};
pub use stats::PoolStats;

/// A shared capacity holder that trackers reserve quota from.
///
/// Implementations must be safe under concurrent `reserve`/`release` from any
/// number of trackers, and must never block indefinitely: a reservation
/// either succeeds or fails immediately.
pub trait MemoryPool: Send + Sync + fmt::Debug {
    /// Name reported in statistics and failures.
    fn name(&self) -> &str;

    /// Reserves `bytes` of quota.
    ///
    /// Fails with [`Error::MemoryLimitExceeded`](memquota_common::Error::MemoryLimitExceeded)
    /// scoped to the pool when the reservation would exceed the pool limit.
    fn reserve(&self, bytes: u64) -> Result<()>;

    /// Returns `bytes` of previously reserved quota.
    fn release(&self, bytes: u64);

    /// Bytes currently reserved by all trackers.
    fn used(&self) -> u64;

    /// The pool's total limit.
    fn limit(&self) -> MemoryLimit;

    /// Bytes still available, or `None` if the pool is unbounded.
    fn free(&self) -> Option<u64> {
        self.limit().headroom(self.used())
    }

    /// Snapshot of the pool for reporting.
    fn stats(&self) -> PoolStats;
}
