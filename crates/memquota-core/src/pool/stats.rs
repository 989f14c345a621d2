//! Pool statistics.

use std::fmt;

use memquota_common::types::MemoryLimit;
use memquota_common::utils::bytes::format_bytes;
use serde::Serialize;

/// Point-in-time snapshot of a pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    /// Pool name.
    pub name: String,
    /// Total limit.
    pub limit: MemoryLimit,
    /// Bytes currently reserved by trackers.
    pub used: u64,
    /// Highest `used` value observed.
    pub peak: u64,
}

impl PoolStats {
    /// Bytes still available, or `None` if the pool is unbounded.
    pub fn free(&self) -> Option<u64> {
        self.limit.headroom(self.used)
    }

    /// Used bytes as a percentage of the limit. Unbounded pools report 0.
    pub fn utilization_percent(&self) -> f64 {
        match self.limit.as_bytes() {
            None | Some(0) => 0.0,
            Some(limit) => (self.used as f64 / limit as f64) * 100.0,
        }
    }
}

impl fmt::Display for PoolStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.limit.as_bytes() {
            Some(limit) => write!(
                f,
                "{}:{}/{} (peak {})",
                self.name,
                format_bytes(self.used),
                format_bytes(limit),
                format_bytes(self.peak)
            ),
            None => write!(
                f,
                "{}:{}/unbounded (peak {})",
                self.name,
                format_bytes(self.used),
                format_bytes(self.peak)
            ),
        }
    }
}
