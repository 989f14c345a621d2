//! Concurrent allocation simulation.
//!
//! Each worker owns one tracker over a shared pool and runs a deterministic
//! allocation pattern. Rejected allocations shed half the worker's usage, the
//! way a host would abort or spill an operator, and every eighth round frees a
//! quarter to mimic completed work.

use std::sync::Arc;

use anyhow::Result;
use comfy_table::Cell;
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use serde::Serialize;

use memquota_common::config::TrackerConfig;
use memquota_common::utils::bytes::format_bytes;
use memquota_common::LimitScope;
use memquota_core::{GlobalMemoryPool, LocalMemoryTracker, MemoryPool, MemoryTracker, PoolStats};

use crate::output::{self, Format};
use crate::{OutputFormat, SimulateArgs};

/// Outcome of one worker.
#[derive(Serialize)]
struct WorkerReport {
    worker: usize,
    granted: u64,
    tracker_rejections: u64,
    pool_rejections: u64,
    heap_peak: u64,
    reserved_at_end: u64,
    used_at_end: u64,
}

/// Outcome of the whole simulation.
#[derive(Serialize)]
struct SimulationOutput {
    pool: PoolStats,
    workers: Vec<WorkerReport>,
}

/// Run the simulate command.
pub fn run(args: &SimulateArgs, format: OutputFormat, quiet: bool) -> Result<()> {
    let (pool_config, tracker_config) = super::resolve(&args.budget)?;
    let pool = Arc::new(GlobalMemoryPool::new(pool_config)?);

    tracing::info!(
        workers = args.workers,
        rounds = args.rounds,
        pool_limit = %pool.limit(),
        grab_size = %tracker_config.grab_size,
        "starting simulation"
    );

    let fmt: Format = format.into();
    let progress = if quiet || matches!(fmt, Format::Json) {
        ProgressBar::hidden()
    } else {
        ProgressBar::new(args.workers as u64 * args.rounds)
    };
    progress.set_style(
        ProgressStyle::with_template("{bar:40} {pos}/{len} rounds")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );

    let workers = (0..args.workers)
        .into_par_iter()
        .map(|id| run_worker(id, &pool, &tracker_config, args, &progress))
        .collect::<Result<Vec<_>>>()?;
    progress.finish_and_clear();

    let output = SimulationOutput {
        pool: pool.stats(),
        workers,
    };

    match fmt {
        Format::Json => output::print_json(&output, quiet)?,
        Format::Table => print_tables(&output, quiet),
    }

    Ok(())
}

fn run_worker(
    id: usize,
    pool: &Arc<GlobalMemoryPool>,
    config: &TrackerConfig,
    args: &SimulateArgs,
    progress: &ProgressBar,
) -> Result<WorkerReport> {
    let mut tracker = LocalMemoryTracker::with_config(pool.clone(), config.clone())?;
    let mut report = WorkerReport {
        worker: id,
        granted: 0,
        tracker_rejections: 0,
        pool_rejections: 0,
        heap_peak: 0,
        reserved_at_end: 0,
        used_at_end: 0,
    };

    let mean = args.allocation.max(1);
    for round in 0..args.rounds {
        // deterministic spread between half and one and a half times the mean
        let jitter = (round.wrapping_mul(7919) ^ (id as u64).wrapping_mul(104_729)) % mean;
        let size = mean / 2 + jitter;

        let result = if round % 2 == 0 {
            tracker.allocate_native(size)
        } else {
            tracker.allocate_heap(size)
        };

        match result {
            Ok(()) => report.granted += 1,
            Err(e) => {
                let Some(scope) = e.as_limit_exceeded().map(|x| x.scope) else {
                    return Err(e.into());
                };
                match scope {
                    LimitScope::Tracker => report.tracker_rejections += 1,
                    LimitScope::Pool => report.pool_rejections += 1,
                }
                shed(&mut tracker, 2);
            }
        }

        if round % 8 == 7 {
            shed(&mut tracker, 4);
        }
        progress.inc(1);
    }

    let stats = tracker.stats();
    report.heap_peak = stats.heap_peak;
    report.reserved_at_end = stats.reserved;
    report.used_at_end = stats.total();

    tracing::debug!(
        worker = id,
        granted = report.granted,
        rejected = report.tracker_rejections + report.pool_rejections,
        "worker finished"
    );
    Ok(report)
}

/// Releases `1 / divisor` of the tracker's native and heap usage.
fn shed(tracker: &mut LocalMemoryTracker, divisor: u64) {
    let native = tracker.used_native_memory() / divisor;
    let heap = tracker.estimated_heap_memory() / divisor;
    tracker.release_native(native);
    tracker.release_heap(heap);
}

fn print_tables(output: &SimulationOutput, quiet: bool) {
    if quiet {
        return;
    }

    let mut table = output::create_table();
    output::add_header(
        &mut table,
        &[
            "Worker",
            "Granted",
            "Tracker Rejections",
            "Pool Rejections",
            "Heap Peak",
            "Used At End",
            "Reserved At End",
        ],
    );
    for w in &output.workers {
        table.add_row(vec![
            Cell::new(w.worker),
            Cell::new(w.granted),
            Cell::new(w.tracker_rejections),
            Cell::new(w.pool_rejections),
            Cell::new(format_bytes(w.heap_peak)),
            Cell::new(format_bytes(w.used_at_end)),
            Cell::new(format_bytes(w.reserved_at_end)),
        ]);
    }
    println!("{table}");

    let pool = &output.pool;
    let items = vec![
        ("Pool", pool.name.clone()),
        ("Limit", pool.limit.to_string()),
        ("Peak", format_bytes(pool.peak)),
        ("Used After Workers", format_bytes(pool.used)),
        ("Peak Utilization", peak_utilization(pool)),
    ];
    output::print_key_value_table(&items, Format::Table, quiet);
}

fn peak_utilization(pool: &PoolStats) -> String {
    match pool.limit.as_bytes() {
        Some(limit) if limit > 0 => format!("{:.1}%", pool.peak as f64 / limit as f64 * 100.0),
        _ => "-".to_string(),
    }
}
