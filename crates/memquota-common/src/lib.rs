//! # memquota-common
//!
//! Foundation layer for Memquota: limit types, configuration, and the error
//! taxonomy shared by every other Memquota crate.
//!
//! This crate has no internal dependencies and should be kept minimal.
//!
//! ## Modules
//!
//! - [`types`] - Limit and grab-size types ([`MemoryLimit`], [`GrabSize`], [`MemoryKind`])
//! - [`config`] - Tracker and pool configuration plus default constants
//! - [`utils`] - Utility functions and helpers (byte formatting, errors)

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod types;
pub mod utils;

// Re-export commonly used types at crate root
pub use config::{PoolConfig, TrackerConfig};
pub use types::{GrabSize, MemoryKind, MemoryLimit};
pub use utils::error::{Error, LimitScope, MemoryLimitExceeded, Result};
