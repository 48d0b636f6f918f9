//! Benchmark and logging configuration.
//!
//! A [`BenchmarkConfig`] is built once (normally by the command-line harness),
//! validated, and then handed by reference to each backend. Nothing in the
//! crate keeps process-wide copies of these values.

use std::path::{Path, PathBuf};

use crate::error::{BenchError, Result};
use crate::logging::LogLevel;

/// Default number of writes per backend.
pub const DEFAULT_ITERATIONS: usize = 1;

/// Default number of completions drained per wait call.
pub const DEFAULT_BATCH_SIZE: usize = 64;

/// Parameters for one benchmark run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BenchmarkConfig {
    /// File written by both backends; created or truncated on open
    pub file_path: PathBuf,
    /// Bytes per write
    pub transfer_size: usize,
    /// Writes issued by each backend
    pub iteration_count: usize,
    /// Completions awaited per wait call (async backend)
    pub batch_size: usize,
    /// Open the file with `O_DSYNC`
    pub durable: bool,
}

impl BenchmarkConfig {
    /// Creates a configuration with default iteration count, batch size and
    /// durability.
    pub fn new<P: AsRef<Path>>(file_path: P, transfer_size: usize) -> Self {
        Self {
            file_path: file_path.as_ref().to_path_buf(),
            transfer_size,
            iteration_count: DEFAULT_ITERATIONS,
            batch_size: DEFAULT_BATCH_SIZE,
            durable: false,
        }
    }

    /// Sets the iteration count.
    pub fn with_iterations(mut self, iteration_count: usize) -> Self {
        self.iteration_count = iteration_count;
        self
    }

    /// Sets the completion batch size.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Enables or disables durable (`O_DSYNC`) writes.
    pub fn with_durable(mut self, durable: bool) -> Self {
        self.durable = durable;
        self
    }

    /// Checks every invariant.
    ///
    /// All numeric fields must be positive. The transfer size must fit a
    /// 32-bit io_uring write length and the queue depth must fit in a `u32`.
    /// The kernel's own ring size limit is not checked here: it only binds the
    /// io_uring backend, which reports it as
    /// [`BenchError::QueueInit`] when the ring is set up.
    pub fn validate(&self) -> Result<()> {
        if self.transfer_size == 0 {
            return Err(positive("transfer_size"));
        }

        if self.iteration_count == 0 {
            return Err(positive("iteration_count"));
        }

        if self.batch_size == 0 {
            return Err(positive("batch_size"));
        }

        if u32::try_from(self.transfer_size).is_err() {
            return Err(BenchError::InvalidConfig {
                field: "transfer_size",
                reason: format!("{} exceeds {} bytes", self.transfer_size, u32::MAX),
            });
        }

        if u32::try_from(self.queue_depth()).is_err() {
            return Err(BenchError::InvalidConfig {
                field: "iteration_count",
                reason: format!("queue depth {} exceeds {}", self.queue_depth(), u32::MAX),
            });
        }

        Ok(())
    }

    /// Submission queue depth for the async backend.
    ///
    /// Every write is pushed before the single submit call, so the ring must
    /// hold `iteration_count` entries; it is never smaller than `batch_size`.
    pub fn queue_depth(&self) -> usize {
        self.batch_size.max(self.iteration_count)
    }

    /// Total bytes written by one backend run.
    pub fn total_bytes(&self) -> u64 {
        self.transfer_size as u64 * self.iteration_count as u64
    }

    /// Number of wait calls needed to drain all completions.
    pub fn wait_groups(&self) -> usize {
        self.iteration_count.div_ceil(self.batch_size)
    }

    /// Durability label used in report lines.
    pub fn durability_label(&self) -> &'static str {
        durability_label(self.durable)
    }
}

/// `O_DSYNC` for durable writes, `normal` otherwise.
pub fn durability_label(durable: bool) -> &'static str {
    if durable {
        "O_DSYNC"
    } else {
        "normal"
    }
}

fn positive(field: &'static str) -> BenchError {
    BenchError::InvalidConfig {
        field,
        reason: "must be a positive integer".to_string(),
    }
}

/// Logging and diagnostics configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Minimum log level
    pub level: LogLevel,
    /// Log file path (None = stderr only)
    pub log_file: Option<PathBuf>,
    /// Use JSON format for logs
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Warn,
            log_file: None,
            json_format: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod defaults {
        use super::*;

        #[test]
        fn new_uses_defaults() {
            let config = BenchmarkConfig::new("/tmp/target", 4096);
            assert_eq!(config.file_path, PathBuf::from("/tmp/target"));
            assert_eq!(config.transfer_size, 4096);
            assert_eq!(config.iteration_count, DEFAULT_ITERATIONS);
            assert_eq!(config.batch_size, DEFAULT_BATCH_SIZE);
            assert!(!config.durable);
            assert!(config.validate().is_ok());
        }

        #[test]
        fn logging_defaults() {
            let logging = LoggingConfig::default();
            assert_eq!(logging.level, LogLevel::Warn);
            assert!(logging.log_file.is_none());
            assert!(!logging.json_format);
        }
    }

    mod validation {
        use super::*;

        fn rejected_field(config: &BenchmarkConfig) -> &'static str {
            match config.validate() {
                Err(BenchError::InvalidConfig { field, .. }) => field,
                other => panic!("Expected InvalidConfig, got {other:?}"),
            }
        }

        #[test]
        fn zero_transfer_size() {
            let config = BenchmarkConfig::new("f", 0);
            assert_eq!(rejected_field(&config), "transfer_size");
        }

        #[test]
        fn zero_iterations() {
            let config = BenchmarkConfig::new("f", 4096).with_iterations(0);
            assert_eq!(rejected_field(&config), "iteration_count");
        }

        #[test]
        fn zero_batch_size() {
            let config = BenchmarkConfig::new("f", 4096).with_batch_size(0);
            assert_eq!(rejected_field(&config), "batch_size");
        }

        #[cfg(target_pointer_width = "64")]
        #[test]
        fn oversized_transfer() {
            let config = BenchmarkConfig::new("f", u32::MAX as usize + 1);
            assert_eq!(rejected_field(&config), "transfer_size");
        }

        #[test]
        fn batch_larger_than_iterations_is_valid() {
            let config = BenchmarkConfig::new("f", 512)
                .with_iterations(3)
                .with_batch_size(64);
            assert!(config.validate().is_ok());
        }
    }

    mod derived {
        use super::*;

        #[test]
        fn queue_depth_is_max_of_batch_and_iterations() {
            let config = BenchmarkConfig::new("f", 4096)
                .with_iterations(100)
                .with_batch_size(16);
            assert_eq!(config.queue_depth(), 100);

            let config = config.with_iterations(3);
            assert_eq!(config.queue_depth(), 16);
        }

        #[test]
        fn wait_groups_round_up() {
            let config = BenchmarkConfig::new("f", 4096)
                .with_iterations(100)
                .with_batch_size(16);
            assert_eq!(config.wait_groups(), 7);

            let config = BenchmarkConfig::new("f", 4096)
                .with_iterations(1)
                .with_batch_size(1);
            assert_eq!(config.wait_groups(), 1);

            let config = BenchmarkConfig::new("f", 4096)
                .with_iterations(64)
                .with_batch_size(64);
            assert_eq!(config.wait_groups(), 1);
        }

        #[test]
        fn total_bytes() {
            let config = BenchmarkConfig::new("f", 4096).with_iterations(100);
            assert_eq!(config.total_bytes(), 409_600);
        }

        #[test]
        fn durability_label() {
            let config = BenchmarkConfig::new("f", 1);
            assert_eq!(config.durability_label(), "normal");
            assert_eq!(config.with_durable(true).durability_label(), "O_DSYNC");
        }
    }
}
