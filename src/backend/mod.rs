//! Write backends.
//!
//! Both backends implement [`WriteBackend`] so the harness can run them in
//! sequence through one interface:
//!
//! - [`SyncWriteBackend`]: one blocking `pwrite(2)` per iteration
//! - [`AsyncBatchedWriteBackend`]: every write queued on an io_uring, submitted
//!   in one call, completions drained in batches
//!
//! Each backend opens the target itself through [`open_target`] and owns the
//! file, buffer and (for io_uring) the ring for the length of one run. All of
//! them are released when the run returns, on success and on every error.

use std::fs::{File, OpenOptions};
use std::os::unix::fs::OpenOptionsExt;

use crate::clock::CycleClock;
use crate::config::BenchmarkConfig;
use crate::error::{BenchError, Result};
use crate::offset::OffsetGenerator;
use crate::report::{BackendKind, RunReport, WriteOutcome};

pub mod sync;
pub mod uring;

pub use sync::{PositionalWrite, SyncWriteBackend};
pub use uring::{AsyncBatchedWriteBackend, SubmissionRing, UringQueue};

/// Permission bits for a newly created target file.
pub const TARGET_FILE_MODE: u32 = 0o644;

/// A write path that can be benchmarked.
///
/// # Errors
///
/// [`run`](WriteBackend::run) returns an error only for failures that end the
/// run: the file cannot be opened, the ring cannot be set up, or submission
/// or waiting fails. Individual write failures are counted in the report.
pub trait WriteBackend {
    /// Which write path this is.
    fn kind(&self) -> BackendKind;

    /// Runs `config.iteration_count` writes and returns the measurement.
    fn run(
        &mut self,
        config: &BenchmarkConfig,
        offsets: &mut OffsetGenerator,
        clock: &dyn CycleClock,
    ) -> Result<RunReport>;

    /// Backend name for logs.
    fn name(&self) -> &'static str {
        self.kind().name()
    }
}

/// Opens the benchmark target for writing.
///
/// The file is created if missing and truncated if present, with mode
/// [`TARGET_FILE_MODE`]. Durable configurations add `O_DSYNC`.
pub fn open_target(config: &BenchmarkConfig) -> Result<File> {
    let mut options = OpenOptions::new();
    options
        .write(true)
        .create(true)
        .truncate(true)
        .mode(TARGET_FILE_MODE);

    if config.durable {
        options.custom_flags(libc::O_DSYNC);
    }

    options
        .open(&config.file_path)
        .map_err(|source| BenchError::Open {
            path: config.file_path.clone(),
            source,
        })
}

/// Logs a failed or short write. Complete writes are not logged.
pub(crate) fn log_outcome(backend: BackendKind, outcome: &WriteOutcome, expected: usize) {
    match outcome {
        WriteOutcome::Complete => {}
        WriteOutcome::Short { written } => {
            tracing::warn!(%backend, written, expected, "short write");
        }
        WriteOutcome::Failed(e) => {
            tracing::warn!(%backend, error = %e, "write failed");
        }
    }
}
