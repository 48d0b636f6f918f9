//! Benchmark harness.
//!
//! Usage:
//!   uring-write-bench <FILE> <SIZE> [ITERATIONS] [BATCH] [SYNC]
//!
//! Runs the blocking backend, then the io_uring backend, against the same
//! target file and prints cycle counts for each.

use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use tracing::{error, info};

use uring_write_bench::{
    logging, AsyncBatchedWriteBackend, BenchError, BenchmarkConfig, CycleClock, LogLevel,
    LoggingConfig, OffsetGenerator, Reporter, RunReport, SyncWriteBackend, TscClock,
    WriteBackend, DEFAULT_BATCH_SIZE, DEFAULT_ITERATIONS,
};

/// Compare pwrite(2) with batched io_uring writes, in CPU cycles
#[derive(Parser, Debug)]
#[command(name = "uring-write-bench", version)]
struct Args {
    /// Target file (created or truncated)
    file: PathBuf,

    /// Bytes per write
    #[arg(value_parser = clap::value_parser!(u64).range(1..))]
    size: u64,

    /// Number of writes per backend
    #[arg(default_value_t = DEFAULT_ITERATIONS as u64)]
    #[arg(value_parser = clap::value_parser!(u64).range(1..))]
    iterations: u64,

    /// Completions drained per wait (io_uring)
    #[arg(default_value_t = DEFAULT_BATCH_SIZE as u64)]
    #[arg(value_parser = clap::value_parser!(u64).range(1..))]
    batch: u64,

    /// Non-zero opens the file with O_DSYNC
    #[arg(default_value_t = 0, allow_negative_numbers = true)]
    sync: i64,

    /// Seed for the offset generator (default: wall clock)
    #[arg(long)]
    seed: Option<u64>,

    /// Which write paths to run
    #[arg(long, value_enum, default_value_t = BackendChoice::Both)]
    backend: BackendChoice,

    /// Log level (overridden by RUST_LOG)
    #[arg(long, default_value = "warn")]
    log_level: LogLevel,

    /// Write logs to this file instead of stderr
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Log as JSON
    #[arg(long)]
    log_json: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum BackendChoice {
    /// Blocking pwrite(2) only
    Sync,
    /// io_uring only
    Uring,
    /// Blocking, then io_uring
    Both,
}

impl BackendChoice {
    fn runs_sync(self) -> bool {
        matches!(self, BackendChoice::Sync | BackendChoice::Both)
    }

    fn runs_uring(self) -> bool {
        matches!(self, BackendChoice::Uring | BackendChoice::Both)
    }
}

impl Args {
    fn benchmark_config(&self) -> Result<BenchmarkConfig, BenchError> {
        let config = BenchmarkConfig::new(&self.file, to_usize("transfer_size", self.size)?)
            .with_iterations(to_usize("iteration_count", self.iterations)?)
            .with_batch_size(to_usize("batch_size", self.batch)?)
            .with_durable(self.sync != 0);
        config.validate()?;
        Ok(config)
    }

    fn logging_config(&self) -> LoggingConfig {
        LoggingConfig {
            level: self.log_level,
            log_file: self.log_file.clone(),
            json_format: self.log_json,
        }
    }
}

fn to_usize(field: &'static str, value: u64) -> Result<usize, BenchError> {
    usize::try_from(value).map_err(|_| BenchError::InvalidConfig {
        field,
        reason: format!("{value} does not fit in usize"),
    })
}

fn main() -> ExitCode {
    let args = Args::parse();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Sets up and runs the selected backends. Returns an error only for failures
/// that stop the process.
fn run(args: &Args) -> Result<(), BenchError> {
    let config = args.benchmark_config()?;
    logging::init(&args.logging_config())?;
    let clock = TscClock::new()?;

    let mut offsets = match args.seed {
        Some(seed) => OffsetGenerator::with_seed(seed),
        None => OffsetGenerator::from_time(),
    };

    info!(
        path = %config.file_path.display(),
        transfer_size = config.transfer_size,
        iterations = config.iteration_count,
        batch_size = config.batch_size,
        durability = config.durability_label(),
        seed = offsets.seed(),
        clock = clock.source(),
        "benchmark configured"
    );

    let mut reporter = Reporter::new(io::stdout());

    if args.backend.runs_sync() {
        println!("Running write...");
        let mut backend = SyncWriteBackend::new();
        run_backend(&mut backend, &config, &mut offsets, &clock, &mut reporter)?;
    }

    if args.backend.runs_uring() {
        println!("Running write with io_uring...");
        let mut backend = AsyncBatchedWriteBackend::new();
        run_backend(&mut backend, &config, &mut offsets, &clock, &mut reporter)?;
    }

    Ok(())
}

/// Runs one backend and prints its report.
fn run_backend(
    backend: &mut dyn WriteBackend,
    config: &BenchmarkConfig,
    offsets: &mut OffsetGenerator,
    clock: &dyn CycleClock,
    reporter: &mut Reporter<io::Stdout>,
) -> Result<(), BenchError> {
    let outcome = backend.run(config, offsets, clock);
    let Some(report) = settle(backend.name(), outcome)? else {
        return Ok(());
    };

    if let Err(e) = reporter.emit(&report) {
        error!(backend = backend.name(), error = %e, "failed to print report");
    }
    Ok(())
}

/// Splits a backend outcome into a report to print, a logged failure that
/// ends only this backend (`None`), or an error that stops the process.
fn settle(
    backend: &str,
    outcome: Result<RunReport, BenchError>,
) -> Result<Option<RunReport>, BenchError> {
    match outcome {
        Ok(report) => Ok(Some(report)),
        Err(e) if e.is_fatal_to_process() => Err(e),
        Err(e) => {
            error!(backend, error = %e, "backend run failed");
            Ok(None)
        }
    }
}
