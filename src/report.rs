//! Run results and their human-readable output.

use std::fmt;
use std::io::{self, Write};

/// Which write path produced a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// Blocking `pwrite(2)` loop
    Sync,
    /// Batched io_uring submission and completion
    IoUring,
}

impl BackendKind {
    /// Backend name used in logs.
    pub fn name(self) -> &'static str {
        match self {
            BackendKind::Sync => "write",
            BackendKind::IoUring => "io_uring",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Outcome of a single write, classified from its return value.
#[derive(Debug)]
pub enum WriteOutcome {
    /// All requested bytes were written
    Complete,
    /// Fewer bytes than requested were written
    Short {
        /// Bytes actually written
        written: usize,
    },
    /// The write failed
    Failed(io::Error),
}

impl WriteOutcome {
    /// Classifies the result of a blocking positional write.
    pub fn from_io(result: io::Result<usize>, expected: usize) -> Self {
        match result {
            Ok(written) if written == expected => WriteOutcome::Complete,
            Ok(written) => WriteOutcome::Short { written },
            Err(e) => WriteOutcome::Failed(e),
        }
    }

    /// Classifies a completion result code: bytes written, or a negated errno.
    pub fn from_completion(code: i32, expected: usize) -> Self {
        if code < 0 {
            WriteOutcome::Failed(io::Error::from_raw_os_error(-code))
        } else {
            Self::from_io(Ok(code as usize), expected)
        }
    }

    /// Returns `true` unless all bytes were written.
    pub fn is_failure(&self) -> bool {
        !matches!(self, WriteOutcome::Complete)
    }
}

/// Aggregate success and failure counts for one run.
///
/// Individual results are not kept: requests are indistinguishable, so only
/// the counts matter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutcomeTally {
    /// Writes that transferred every byte
    pub succeeded: usize,
    /// Writes that transferred fewer bytes than requested
    pub short: usize,
    /// Writes that returned an error
    pub failed: usize,
}

impl OutcomeTally {
    /// Adds one outcome.
    pub fn record(&mut self, outcome: &WriteOutcome) {
        match outcome {
            WriteOutcome::Complete => self.succeeded += 1,
            WriteOutcome::Short { .. } => self.short += 1,
            WriteOutcome::Failed(_) => self.failed += 1,
        }
    }

    /// Total outcomes recorded.
    pub fn total(&self) -> usize {
        self.succeeded + self.short + self.failed
    }

    /// Returns `true` if no write failed or came up short.
    pub fn all_succeeded(&self) -> bool {
        self.short == 0 && self.failed == 0
    }
}

/// Result of one backend run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    /// Backend that produced the report
    pub backend: BackendKind,
    /// Whether the file was opened with `O_DSYNC`
    pub durable: bool,
    /// Cycles between the start and end readings
    pub elapsed_cycles: u64,
    /// Bytes per write
    pub transfer_size: usize,
    /// Writes requested
    pub iteration_count: usize,
    /// Per-write outcome counts
    pub tally: OutcomeTally,
    /// Blocking write calls issued (sync backend)
    pub write_calls: usize,
    /// Batched submission calls issued (async backend)
    pub submit_calls: usize,
    /// Completion wait calls issued (async backend)
    pub wait_calls: usize,
    /// Completions consumed (async backend)
    pub completions: usize,
}

impl RunReport {
    /// Empty report for `backend`; counters are filled in by the run.
    pub fn new(backend: BackendKind, config: &crate::config::BenchmarkConfig) -> Self {
        Self {
            backend,
            durable: config.durable,
            elapsed_cycles: 0,
            transfer_size: config.transfer_size,
            iteration_count: config.iteration_count,
            tally: OutcomeTally::default(),
            write_calls: 0,
            submit_calls: 0,
            wait_calls: 0,
            completions: 0,
        }
    }

    /// Bytes requested across all iterations.
    pub fn total_bytes(&self) -> u64 {
        self.transfer_size as u64 * self.iteration_count as u64
    }

    /// `elapsed_cycles / (transfer_size * iteration_count)`; 0 when no bytes
    /// were requested.
    pub fn cycles_per_byte(&self) -> f64 {
        let total = self.total_bytes();
        if total == 0 {
            return 0.0;
        }
        self.elapsed_cycles as f64 / total as f64
    }

    /// Label printed in report lines, e.g. `io_uring, O_DSYNC`.
    pub fn label(&self) -> String {
        let durability = crate::config::durability_label(self.durable);
        match self.backend {
            BackendKind::Sync => durability.to_string(),
            BackendKind::IoUring => format!("io_uring, {durability}"),
        }
    }
}

/// Writes report lines to an output stream (stdout in the harness).
#[derive(Debug)]
pub struct Reporter<W: Write> {
    out: W,
}

impl<W: Write> Reporter<W> {
    /// Creates a reporter writing to `out`.
    pub fn new(out: W) -> Self {
        Self { out }
    }

    /// Prints the total-cycles and cycles-per-byte lines for `report`.
    pub fn emit(&mut self, report: &RunReport) -> io::Result<()> {
        let label = report.label();
        writeln!(
            self.out,
            "Total cycles for write ({label}): {}",
            report.elapsed_cycles
        )?;
        writeln!(
            self.out,
            "Cycles per byte ({label}): {:.2}",
            report.cycles_per_byte()
        )?;
        self.out.flush()?;

        tracing::info!(
            backend = %report.backend,
            succeeded = report.tally.succeeded,
            short = report.tally.short,
            failed = report.tally.failed,
            "run complete"
        );
        Ok(())
    }

    /// Consumes the reporter and returns the output stream.
    pub fn into_inner(self) -> W {
        self.out
    }
}
