//! CLI command implementations.

pub mod config;
pub mod simulate;

use anyhow::Result;
use memquota_common::config::{PoolConfig, TrackerConfig};
use memquota_common::types::MemoryLimit;

use crate::BudgetArgs;

/// Resolves raw budget settings into validated pool and tracker configuration.
pub fn resolve(args: &BudgetArgs) -> Result<(PoolConfig, TrackerConfig)> {
    let pool = PoolConfig::new("simulation")
        .with_limit(MemoryLimit::from_setting(args.pool_limit))
        .with_setting_name(args.pool_setting.as_str());
    pool.validate()?;

    let tracker =
        TrackerConfig::from_settings(args.tracker_limit, args.grab_size, args.tracker_setting.as_str());
    tracker.validate()?;

    Ok((pool, tracker))
}
