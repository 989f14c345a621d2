//! Memquota CLI - operator tool for memory budgets.
//!
//! Runs allocation workloads against a shared pool to see how a given limit
//! and grab size behave under concurrency, and shows how raw setting values
//! resolve into tracker and pool configuration.

mod commands;
mod output;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Memquota budget tool.
///
/// Simulates concurrent workers charging memory to local trackers that share
/// one global pool, and explains configuration values.
#[derive(Parser)]
#[command(name = "memquota")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, global = true, default_value = "table")]
    format: OutputFormat,

    /// Suppress progress and info messages
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Enable verbose debug logging
    #[arg(long, short, global = true)]
    verbose: bool,
}

/// Output format options.
#[derive(Clone, Copy, ValueEnum, Default)]
enum OutputFormat {
    /// Human-readable table format (default for TTY)
    #[default]
    Table,
    /// Machine-readable JSON format
    Json,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Run concurrent workers against one shared pool and report the outcome
    Simulate(SimulateArgs),

    /// Show how raw setting values resolve into limits and grab sizes
    Config(BudgetArgs),
}

/// Budget settings, in raw configuration form.
#[derive(Args, Clone)]
struct BudgetArgs {
    /// Total pool limit in bytes (0 = unbounded)
    #[arg(long, default_value_t = 64 * 1024 * 1024)]
    pool_limit: u64,

    /// Per-tracker limit in bytes (0 = unbounded)
    #[arg(long, default_value_t = 0)]
    tracker_limit: u64,

    /// Pool reservation batch size in bytes (0 = no pooling)
    #[arg(long, default_value_t = memquota_common::config::DEFAULT_GRAB_SIZE)]
    grab_size: u64,

    /// Setting name reported when a tracker limit is hit
    #[arg(long, default_value = "memquota.tracker.max")]
    tracker_setting: String,

    /// Setting name reported when the pool is exhausted
    #[arg(long, default_value = "memquota.pool.max")]
    pool_setting: String,
}

/// Simulation parameters.
#[derive(Args)]
struct SimulateArgs {
    #[command(flatten)]
    budget: BudgetArgs,

    /// Number of concurrent workers, one tracker each
    #[arg(long, short, default_value_t = 4)]
    workers: usize,

    /// Allocation rounds per worker
    #[arg(long, short, default_value_t = 1000)]
    rounds: u64,

    /// Mean allocation size in bytes
    #[arg(long, short, default_value_t = 64 * 1024)]
    allocation: u64,
}

fn main() {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    if cli.verbose {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_writer(std::io::stderr)
            .init();
    } else if !cli.quiet {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .with_writer(std::io::stderr)
            .init();
    }

    let result = match cli.command {
        Commands::Simulate(args) => commands::simulate::run(&args, cli.format, cli.quiet),
        Commands::Config(args) => commands::config::run(&args, cli.format, cli.quiet),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
