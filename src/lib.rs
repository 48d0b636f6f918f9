//! # uring-write-bench: pwrite(2) versus batched io_uring writes
//!
//! A micro-benchmark that measures, in CPU cycles, how long it takes to issue
//! a fixed number of fixed-size writes at random offsets into one file, once
//! with one blocking `pwrite(2)` per write and once with every write queued
//! on an io_uring, submitted in a single call and reaped in batches.
//!
//! ## Measurement
//!
//! - Time is read from the time-stamp counter ([`TscClock`]) immediately
//!   before the first write is issued and immediately after the last one has
//!   completed. Results are reported as total cycles and cycles per byte.
//! - Offsets are uniform over `[0, 1 GiB)` ([`OffsetGenerator`]), so the
//!   target file is sparse. One generator is shared by both backends.
//! - Each write sends the same [`WriteBuffer`] of `transfer_size` bytes.
//! - With durability enabled the file is opened with `O_DSYNC`, so each write
//!   returns only after its data reaches stable storage.
//!
//! Individual write failures never abort a run: they are logged and counted
//! in the [`RunReport`]. Only setup and queue failures surface as
//! [`BenchError`].
//!
//! ## Example
//!
//! ```rust,no_run
//! use uring_write_bench::{
//!     BenchmarkConfig, OffsetGenerator, Reporter, SyncWriteBackend, TscClock, WriteBackend,
//! };
//!
//! # fn main() -> uring_write_bench::Result<()> {
//! let config = BenchmarkConfig::new("/tmp/bench.dat", 4096).with_iterations(1000);
//! config.validate()?;
//!
//! let clock = TscClock::new()?;
//! let mut offsets = OffsetGenerator::from_time();
//! let report = SyncWriteBackend::new().run(&config, &mut offsets, &clock)?;
//!
//! Reporter::new(std::io::stdout()).emit(&report)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Platform Support
//!
//! - **Linux 5.1+**: both backends
//! - **Other Unix**: blocking backend only; [`UringQueue::new`] fails
//! - **Non-x86**: no cycle counter; [`TscClock::new`] fails

#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod backend; // Blocking and io_uring write paths
pub mod buffer;
pub mod clock; // Cycle counter abstraction
pub mod config;
pub mod error;
pub mod logging;
pub mod offset;
pub mod report; // Outcome tallies and report lines

pub use backend::{
    open_target, AsyncBatchedWriteBackend, PositionalWrite, SubmissionRing, SyncWriteBackend,
    UringQueue, WriteBackend,
};
pub use buffer::{WriteBuffer, FILL_BYTE};
pub use clock::{CycleClock, CycleMeasurement, TscClock};
pub use config::{BenchmarkConfig, LoggingConfig, DEFAULT_BATCH_SIZE, DEFAULT_ITERATIONS};
pub use error::{BenchError, Result};
pub use logging::LogLevel;
pub use offset::{OffsetGenerator, ADDRESS_SPACE_BOUND};
pub use report::{BackendKind, OutcomeTally, Reporter, RunReport, WriteOutcome};
