//! # memquota-core
//!
//! Accounting layer for Memquota: per-task memory trackers and the shared
//! pools they reserve quota from.
//!
//! This crate depends only on `memquota-common`.
//!
//! ## Modules
//!
//! - [`pool`] - The [`MemoryPool`] contract, [`GlobalMemoryPool`], and the no-op [`NoTrackingPool`]
//! - [`tracker`] - The [`MemoryTracker`] contract and its implementations
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────── GlobalMemoryPool ────────────────────────┐
//! │  used: sum of quota checked out    limit: total budget            │
//! └───────▲──────────────────────▲──────────────────────▲────────────┘
//!         │ reserve/release      │                      │
//!         │ in grab-size units   │                      │
//! ┌───────┴────────┐     ┌───────┴────────┐     ┌───────┴────────┐
//! │ LocalMemory    │     │ LocalMemory    │     │ LocalMemory    │
//! │ Tracker (tx 1) │     │ Tracker (tx 2) │     │ Tracker (tx 3) │
//! │ native + heap  │     │ native + heap  │     │ native + heap  │
//! └────────────────┘     └────────────────┘     └────────────────┘
//! ```
//!
//! Each tracker is owned by one task. Most allocate and release calls only
//! touch the tracker's local counters; the pool is consulted only when usage
//! outgrows the quota the tracker already holds.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod pool;
pub mod tracker;

// Re-export commonly used types
pub use pool::{GlobalMemoryPool, MemoryPool, NoTrackingPool, PoolStats, no_tracking};
pub use tracker::{
    EmptyMemoryTracker, LocalMemoryTracker, MemoryTracker, MemoryUsageMonitor,
    ScopedMemoryTracker, TrackerStats,
};
