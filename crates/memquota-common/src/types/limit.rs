//! Limit and grab-size types.
//!
//! Configuration files express "no limit" and "no pooling" as `0`. These
//! types turn that convention into explicit variants at the boundary so the
//! accounting code never has to interpret a sentinel.

use std::fmt;
use std::num::NonZeroU64;

use serde::{Deserialize, Serialize};

use crate::config::DEFAULT_GRAB_SIZE;
use crate::utils::bytes::ByteSize;

/// Upper bound on the bytes a tracker or pool may hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryLimit {
    /// No limit is enforced.
    #[default]
    Unbounded,
    /// Usage may reach, but not exceed, this many bytes.
    Bytes(u64),
}

impl MemoryLimit {
    /// Creates a finite limit.
    #[must_use]
    pub const fn bytes(bytes: u64) -> Self {
        MemoryLimit::Bytes(bytes)
    }

    /// Interprets a raw setting value, where `0` means unbounded.
    #[must_use]
    pub const fn from_setting(value: u64) -> Self {
        if value == 0 {
            MemoryLimit::Unbounded
        } else {
            MemoryLimit::Bytes(value)
        }
    }

    /// Returns true if no limit is enforced.
    #[must_use]
    pub const fn is_unbounded(&self) -> bool {
        matches!(self, MemoryLimit::Unbounded)
    }

    /// Returns the limit in bytes, or `None` if unbounded.
    #[must_use]
    pub const fn as_bytes(&self) -> Option<u64> {
        match self {
            MemoryLimit::Unbounded => None,
            MemoryLimit::Bytes(b) => Some(*b),
        }
    }

    /// Returns true if holding `total` bytes would break this limit.
    ///
    /// The comparison is strict: usage may reach the limit exactly.
    #[must_use]
    pub const fn is_exceeded_by(&self, total: u64) -> bool {
        match self {
            MemoryLimit::Unbounded => false,
            MemoryLimit::Bytes(limit) => total > *limit,
        }
    }

    /// Bytes still available under this limit, or `None` if unbounded.
    #[must_use]
    pub const fn headroom(&self, used: u64) -> Option<u64> {
        match self {
            MemoryLimit::Unbounded => None,
            MemoryLimit::Bytes(limit) => Some(limit.saturating_sub(used)),
        }
    }
}

impl fmt::Display for MemoryLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemoryLimit::Unbounded => f.write_str("unbounded"),
            MemoryLimit::Bytes(b) => fmt::Display::fmt(&ByteSize(*b), f),
        }
    }
}

/// Batch size in which a tracker reserves quota from its pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrabSize {
    /// Track locally only; the pool is never consulted.
    NoPooling,
    /// Reserve quota in multiples of this many bytes.
    Bytes(NonZeroU64),
}

impl GrabSize {
    /// Interprets a raw setting value, where `0` means no pooling.
    #[must_use]
    pub const fn from_setting(value: u64) -> Self {
        match NonZeroU64::new(value) {
            Some(bytes) => GrabSize::Bytes(bytes),
            None => GrabSize::NoPooling,
        }
    }

    /// Returns the grab size in bytes, or `None` when pooling is disabled.
    #[must_use]
    pub const fn as_bytes(&self) -> Option<u64> {
        match self {
            GrabSize::NoPooling => None,
            GrabSize::Bytes(b) => Some(b.get()),
        }
    }

    /// Returns true if quota is reserved from a pool.
    #[must_use]
    pub const fn is_pooling(&self) -> bool {
        matches!(self, GrabSize::Bytes(_))
    }

    /// Rounds `shortfall` up to a whole number of grabs.
    ///
    /// Saturates at `u64::MAX` rather than wrapping. Without pooling the
    /// shortfall is returned unchanged.
    #[must_use]
    pub const fn round_up(&self, shortfall: u64) -> u64 {
        match self {
            GrabSize::NoPooling => shortfall,
            GrabSize::Bytes(grab) => {
                let grab = grab.get();
                match shortfall.div_ceil(grab).checked_mul(grab) {
                    Some(rounded) => rounded,
                    None => u64::MAX,
                }
            }
        }
    }
}

impl Default for GrabSize {
    fn default() -> Self {
        GrabSize::from_setting(DEFAULT_GRAB_SIZE)
    }
}

impl fmt::Display for GrabSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GrabSize::NoPooling => f.write_str("no pooling"),
            GrabSize::Bytes(b) => fmt::Display::fmt(&ByteSize(b.get()), f),
        }
    }
}
