//! # Memquota
//!
//! Hierarchical memory-quota tracking for hosts that run many concurrent
//! workers against one memory budget.
//!
//! If you're new here, start with [`LocalMemoryTracker`] - create one per unit
//! of work (a query, a transaction) and charge native and heap bytes to it.
//! Trackers that should share a process-wide budget draw quota from a
//! [`GlobalMemoryPool`] in grab-size batches, so most calls never touch shared
//! state.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use memquota::{GlobalMemoryPool, GrabSize, LocalMemoryTracker, MemoryLimit, MemoryTracker};
//!
//! // One pool for the whole process
//! let pool = Arc::new(GlobalMemoryPool::with_limit("transactions", 100));
//!
//! // One tracker per unit of work
//! let mut a = LocalMemoryTracker::with_limit(
//!     pool.clone(),
//!     MemoryLimit::Unbounded,
//!     GrabSize::from_setting(50),
//!     "db.memory.transaction.max",
//! );
//! let mut b = LocalMemoryTracker::with_limit(
//!     pool.clone(),
//!     MemoryLimit::bytes(1000),
//!     GrabSize::from_setting(50),
//!     "db.memory.transaction.max",
//! );
//!
//! a.allocate_native(60)?;
//!
//! // The pool is exhausted even though b's own limit is far away
//! let err = b.allocate_heap(1).unwrap_err();
//! assert!(err.is_limit_exceeded());
//! # Ok::<(), memquota::Error>(())
//! ```
//!
//! ## Local limit only
//!
//! Pass [`no_tracking()`] as the pool and [`GrabSize::NoPooling`] to enforce a
//! per-tracker limit without any global accounting.

// Re-export the tracker and pool API
pub use memquota_core::{
    EmptyMemoryTracker, GlobalMemoryPool, LocalMemoryTracker, MemoryPool, MemoryTracker,
    MemoryUsageMonitor, NoTrackingPool, PoolStats, ScopedMemoryTracker, TrackerStats, no_tracking,
};

// Re-export configuration and error types - you'll need these to build trackers
pub use memquota_common::config::{DEFAULT_GRAB_SIZE, NO_LIMIT, NO_POOLING};
pub use memquota_common::{
    Error, GrabSize, LimitScope, MemoryKind, MemoryLimit, MemoryLimitExceeded, PoolConfig, Result,
    TrackerConfig,
};
