//! Error types and handling for benchmark runs.
//!
//! Only failures that end a run (or stop the process before any run) are
//! represented here. Individual write failures inside a run are tallied in
//! [`OutcomeTally`](crate::report::OutcomeTally) and logged instead, because a
//! benchmark must keep going and measure the full iteration count.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for benchmark operations.
pub type Result<T> = std::result::Result<T, BenchError>;

/// Error type for everything that can abort a benchmark run.
///
/// # Design Notes
///
/// - Uses `thiserror` for the `Error` trait and `Display`
/// - Open, queue and submission failures carry enough context to be logged
///   on their own by the harness
/// - All variants are `Send + Sync`
#[derive(Debug, Error)]
pub enum BenchError {
    /// A configuration value violated its invariant.
    ///
    /// Configuration errors are detected before any backend runs.
    #[error("invalid {field}: {reason}")]
    InvalidConfig {
        /// Name of the offending field
        field: &'static str,
        /// Why the value was rejected
        reason: String,
    },

    /// No hardware cycle counter is available on this architecture.
    #[error("no cycle counter available on {arch}")]
    UnsupportedClock {
        /// Target architecture the crate was built for
        arch: &'static str,
    },

    /// The target file could not be created or opened.
    #[error("failed to open {}: {source}", path.display())]
    Open {
        /// Path that was being opened
        path: PathBuf,
        /// Underlying OS error
        #[source]
        source: std::io::Error,
    },

    /// The submission/completion queue pair could not be set up.
    #[error("failed to initialise io_uring with {entries} entries: {source}")]
    QueueInit {
        /// Requested queue depth
        entries: u32,
        /// Underlying OS error
        #[source]
        source: std::io::Error,
    },

    /// No free submission slot was available.
    ///
    /// The queue depth is derived from the configuration, so this indicates
    /// the kernel handed back a smaller ring than requested.
    #[error("submission queue full after {pushed} entries (capacity {capacity})")]
    QueueFull {
        /// Entries pushed before the queue filled up
        pushed: usize,
        /// Capacity reported by the ring
        capacity: usize,
    },

    /// The batched submission call failed.
    #[error("io_uring submit failed: {0}")]
    Submit(#[source] std::io::Error),

    /// The kernel accepted fewer entries than were queued.
    #[error("io_uring accepted {submitted} of {expected} entries")]
    ShortSubmit {
        /// Entries the kernel consumed
        submitted: usize,
        /// Entries that were queued
        expected: usize,
    },

    /// Waiting for completions failed.
    #[error("waiting for completions failed after {drained} of {expected}: {source}")]
    Wait {
        /// Completions drained before the failure
        drained: usize,
        /// Completions expected in total
        expected: usize,
        /// Underlying OS error
        #[source]
        source: std::io::Error,
    },

    /// Standard I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BenchError {
    /// Returns `true` for errors that must stop the process before any run.
    pub fn is_fatal_to_process(&self) -> bool {
        matches!(
            self,
            BenchError::InvalidConfig { .. } | BenchError::UnsupportedClock { .. }
        )
    }

    /// Returns `true` if the kernel may still hold write requests from the
    /// aborted run: entries were handed over but not all of them were reaped.
    pub fn leaves_requests_in_flight(&self) -> bool {
        matches!(
            self,
            BenchError::ShortSubmit { .. } | BenchError::Wait { .. }
        )
    }
}

static_assertions::assert_impl_all!(BenchError: Send, Sync);
