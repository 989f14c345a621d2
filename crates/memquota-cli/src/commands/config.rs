//! Configuration explain command.

use anyhow::Result;
use serde::Serialize;

use memquota_common::config::{PoolConfig, TrackerConfig};

use crate::output::{self, Format};
use crate::{BudgetArgs, OutputFormat};

/// Resolved configuration.
#[derive(Serialize)]
struct ConfigOutput {
    pool: PoolConfig,
    tracker: TrackerConfig,
}

/// Run the config command.
pub fn run(args: &BudgetArgs, format: OutputFormat, quiet: bool) -> Result<()> {
    let (pool, tracker) = super::resolve(args)?;

    let fmt: Format = format.into();
    match fmt {
        Format::Json => {
            output::print_json(&ConfigOutput { pool, tracker }, quiet)?;
        }
        Format::Table => {
            let items = vec![
                ("Pool", pool.name.clone()),
                ("Pool Limit", pool.limit.to_string()),
                (
                    "Pool Setting",
                    pool.setting_name.clone().unwrap_or_else(|| "-".to_string()),
                ),
                ("Tracker Limit", tracker.limit.to_string()),
                ("Grab Size", tracker.grab_size.to_string()),
                (
                    "Tracker Setting",
                    tracker.setting_name.clone().unwrap_or_else(|| "-".to_string()),
                ),
            ];
            output::print_key_value_table(&items, fmt, quiet);
        }
    }

    Ok(())
}
