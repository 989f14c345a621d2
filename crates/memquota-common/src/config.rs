//! Tracker and pool configuration.
//!
//! Limit values arrive from the host's configuration layer as raw byte counts
//! together with the name of the setting they came from. The setting name is
//! purely diagnostic: it is carried verbatim into every limit failure so an
//! operator can map the failure back to the key that caused it.
//!
//! ```
//! use memquota_common::{GrabSize, MemoryLimit, TrackerConfig};
//!
//! let config = TrackerConfig::default()
//!     .with_limit(MemoryLimit::bytes(64 * 1024 * 1024))
//!     .with_grab_size(GrabSize::from_setting(32 * 1024))
//!     .with_setting_name("db.memory.transaction.max");
//!
//! assert!(config.validate().is_ok());
//! ```

use serde::{Deserialize, Serialize};

use crate::types::{GrabSize, MemoryLimit};
use crate::utils::error::{Error, Result};

/// Raw setting value meaning "no limit".
pub const NO_LIMIT: u64 = 0;

/// Raw setting value meaning "track locally, never consult the pool".
pub const NO_POOLING: u64 = 0;

/// Default batch size for pool reservations (8 KiB).
pub const DEFAULT_GRAB_SIZE: u64 = 8 * 1024;

/// Name given to pools built without an explicit name.
pub const DEFAULT_POOL_NAME: &str = "global";

/// Configuration for a local memory tracker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Maximum combined native and heap bytes the tracker may hold.
    pub limit: MemoryLimit,
    /// Batch size for pool reservations.
    pub grab_size: GrabSize,
    /// Configuration key that established `limit`.
    pub setting_name: Option<String>,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            limit: MemoryLimit::Unbounded,
            grab_size: GrabSize::default(),
            setting_name: None,
        }
    }
}

impl TrackerConfig {
    /// Builds a configuration from raw setting values, where `0` means
    /// unbounded for the limit and no pooling for the grab size.
    pub fn from_settings(limit: u64, grab_size: u64, setting_name: impl Into<String>) -> Self {
        Self {
            limit: MemoryLimit::from_setting(limit),
            grab_size: GrabSize::from_setting(grab_size),
            setting_name: Some(setting_name.into()),
        }
    }

    /// Sets the local limit.
    pub fn with_limit(mut self, limit: MemoryLimit) -> Self {
        self.limit = limit;
        self
    }

    /// Sets the pool reservation batch size.
    pub fn with_grab_size(mut self, grab_size: GrabSize) -> Self {
        self.grab_size = grab_size;
        self
    }

    /// Sets the name of the setting that established the limit.
    pub fn with_setting_name(mut self, setting_name: impl Into<String>) -> Self {
        self.setting_name = Some(setting_name.into());
        self
    }

    /// Checks the configuration for values no tracker can work with.
    pub fn validate(&self) -> Result<()> {
        if let Some(name) = &self.setting_name {
            if name.trim().is_empty() {
                return Err(Error::InvalidConfig(
                    "tracker setting name must not be blank".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// Configuration for a shared memory pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Name reported in statistics and logs.
    pub name: String,
    /// Total bytes the pool may hand out.
    pub limit: MemoryLimit,
    /// Configuration key that established `limit`.
    pub setting_name: Option<String>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_POOL_NAME.to_string(),
            limit: MemoryLimit::Unbounded,
            setting_name: None,
        }
    }
}

impl PoolConfig {
    /// Creates an unbounded pool configuration with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Sets the total limit.
    pub fn with_limit(mut self, limit: MemoryLimit) -> Self {
        self.limit = limit;
        self
    }

    /// Sets the name of the setting that established the limit.
    pub fn with_setting_name(mut self, setting_name: impl Into<String>) -> Self {
        self.setting_name = Some(setting_name.into());
        self
    }

    /// Checks the configuration for values no pool can work with.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::InvalidConfig("pool name must not be blank".to_string()));
        }
        if let Some(name) = &self.setting_name {
            if name.trim().is_empty() {
                return Err(Error::InvalidConfig(format!(
                    "pool '{}' setting name must not be blank",
                    self.name
                )));
            }
        }
        Ok(())
    }
}
