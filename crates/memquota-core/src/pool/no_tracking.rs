//! The no-op pool used when global accounting is disabled.

use std::sync::Arc;

use memquota_common::types::MemoryLimit;
use memquota_common::utils::error::Result;

use super::{MemoryPool, PoolStats};

/// A pool that grants every reservation and keeps no books.
///
/// Trackers attached to it still enforce their own local limits, which makes
/// it the collaborator for "local limit only" mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NoTrackingPool;

impl NoTrackingPool {
    /// Name reported by [`MemoryPool::name`].
    pub const NAME: &'static str = "no-tracking";
}

/// Returns a shareable handle to a [`NoTrackingPool`].
pub fn no_tracking() -> Arc<dyn MemoryPool> {
    Arc::new(NoTrackingPool)
}

impl MemoryPool for NoTrackingPool {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn reserve(&self, _bytes: u64) -> Result<()> {
        Ok(())
    }

    fn release(&self, _bytes: u64) {}

    fn used(&self) -> u64 {
        0
    }

    fn limit(&self) -> MemoryLimit {
        MemoryLimit::Unbounded
    }

    fn stats(&self) -> PoolStats {
        PoolStats {
            name: Self::NAME.to_string(),
            limit: MemoryLimit::Unbounded,
            used: 0,
            peak: 0,
        }
    }
}
