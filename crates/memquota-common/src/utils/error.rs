//! Error types for Memquota.
//!
//! Every fallible accounting call returns [`Result`]. The failure a caller
//! most often sees is [`Error::MemoryLimitExceeded`], raised both when a
//! tracker hits its own limit and when the shared pool it draws quota from is
//! exhausted. The two cases differ only in [`LimitScope`] and the setting name
//! they carry, because the caller's remedy is the same either way.

use std::fmt;

use thiserror::Error;

use crate::utils::bytes::ByteSize;

/// Result type alias for Memquota operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for Memquota operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// An allocation would push usage over a tracker or pool limit.
    #[error(transparent)]
    MemoryLimitExceeded(#[from] MemoryLimitExceeded),

    /// A byte counter would wrap around.
    #[error("{counter} memory counter overflow: {current} + {delta} does not fit in 64 bits")]
    Overflow {
        /// Which counter would overflow.
        counter: &'static str,
        /// Counter value before the operation.
        current: u64,
        /// Amount that was being added.
        delta: u64,
    },

    /// A strict release asked to free more than is tracked.
    #[error("cannot release {requested} bytes of {counter} memory: only {available} bytes are tracked")]
    ReleaseUnderflow {
        /// Which counter was being released.
        counter: &'static str,
        /// Bytes the caller tried to release.
        requested: u64,
        /// Bytes currently tracked.
        available: u64,
    },

    /// A pool limit cannot be lowered below what is already reserved.
    #[error("cannot resize pool '{pool}' to {requested} bytes: {outstanding} bytes are reserved")]
    PoolInUse {
        /// Pool name.
        pool: String,
        /// Requested new limit.
        requested: u64,
        /// Bytes currently reserved from the pool.
        outstanding: u64,
    },

    /// Configuration is invalid.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// Returns true if this is a quota failure (tracker limit or pool exhaustion).
    #[must_use]
    pub fn is_limit_exceeded(&self) -> bool {
        matches!(self, Error::MemoryLimitExceeded(_))
    }

    /// Returns the structured quota failure, if this is one.
    #[must_use]
    pub fn as_limit_exceeded(&self) -> Option<&MemoryLimitExceeded> {
        match self {
            Error::MemoryLimitExceeded(e) => Some(e),
            _ => None,
        }
    }
}

/// Which budget refused an allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LimitScope {
    /// The tracker's own local limit.
    Tracker,
    /// The shared pool the tracker reserves quota from.
    Pool,
}

impl fmt::Display for LimitScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LimitScope::Tracker => write!(f, "tracker"),
            LimitScope::Pool => write!(f, "pool"),
        }
    }
}

/// An allocation would use more than a configured limit.
///
/// Carries the attempted size, the limit, current usage, and the name of the
/// setting that established the limit, so rendering layers can format them
/// consistently and operators can trace a failure back to its configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryLimitExceeded {
    /// Bytes the caller tried to allocate.
    pub attempted: u64,
    /// The limit that would have been exceeded.
    pub limit: u64,
    /// Bytes in use when the allocation was attempted.
    pub used: u64,
    /// Configuration key that set the limit, if known.
    pub setting_name: Option<String>,
    /// Whether the tracker or the pool refused.
    pub scope: LimitScope,
}

impl MemoryLimitExceeded {
    /// Creates a failure for the given scope with no setting name attached.
    #[must_use]
    pub fn new(scope: LimitScope, attempted: u64, limit: u64, used: u64) -> Self {
        Self {
            attempted,
            limit,
            used,
            setting_name: None,
            scope,
        }
    }

    /// Attaches the configuration key that established the limit.
    pub fn with_setting_name(mut self, setting_name: impl Into<String>) -> Self {
        self.setting_name = Some(setting_name.into());
        self
    }
}

impl fmt::Display for MemoryLimitExceeded {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "The allocation of an extra {} would use more than the limit {}. Currently using {}.",
            ByteSize(self.attempted),
            ByteSize(self.limit),
            ByteSize(self.used),
        )?;
        match &self.setting_name {
            Some(name) => write!(f, " {name} threshold reached"),
            None => write!(f, " {} limit reached", self.scope),
        }
    }
}

impl std::error::Error for MemoryLimitExceeded {}
