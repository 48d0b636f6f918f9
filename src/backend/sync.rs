//! Blocking positional write backend.

use std::fs::File;
use std::io;

use crate::backend::{log_outcome, open_target, WriteBackend};
use crate::buffer::WriteBuffer;
use crate::clock::{CycleClock, CycleMeasurement};
use crate::config::BenchmarkConfig;
use crate::error::Result;
use crate::offset::OffsetGenerator;
use crate::report::{BackendKind, RunReport, WriteOutcome};

/// A sink that accepts writes at an explicit offset, without moving any
/// file cursor.
pub trait PositionalWrite {
    /// Writes `buf` at `offset`, returning the number of bytes written.
    ///
    /// A single call, no retry on short writes.
    fn write_at(&mut self, buf: &[u8], offset: u64) -> io::Result<usize>;
}

impl PositionalWrite for File {
    #[inline]
    fn write_at(&mut self, buf: &[u8], offset: u64) -> io::Result<usize> {
        std::os::unix::fs::FileExt::write_at(self, buf, offset)
    }
}

/// Benchmarks one blocking `pwrite(2)` per iteration.
#[derive(Debug, Default, Clone, Copy)]
pub struct SyncWriteBackend;

impl SyncWriteBackend {
    /// Creates the backend.
    pub fn new() -> Self {
        Self
    }
}

impl WriteBackend for SyncWriteBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Sync
    }

    fn run(
        &mut self,
        config: &BenchmarkConfig,
        offsets: &mut OffsetGenerator,
        clock: &dyn CycleClock,
    ) -> Result<RunReport> {
        let mut file = open_target(config)?;
        let buffer = WriteBuffer::filled(config.transfer_size);

        tracing::debug!(
            path = %config.file_path.display(),
            transfer_size = config.transfer_size,
            iterations = config.iteration_count,
            durable = config.durable,
            "starting blocking write run"
        );

        Ok(write_loop(&mut file, &buffer, config, offsets, clock))
    }
}

/// Issues exactly `config.iteration_count` positional writes of `buffer` at
/// random offsets and measures the cycles spent.
///
/// Failed and short writes are logged and counted; the loop always runs to
/// the end.
pub fn write_loop<W: PositionalWrite + ?Sized>(
    writer: &mut W,
    buffer: &WriteBuffer,
    config: &BenchmarkConfig,
    offsets: &mut OffsetGenerator,
    clock: &dyn CycleClock,
) -> RunReport {
    let mut report = RunReport::new(BackendKind::Sync, config);
    let expected = buffer.len();

    let measurement = CycleMeasurement::start(clock);

    for _ in 0..config.iteration_count {
        let offset = offsets.next_offset();
        let outcome = WriteOutcome::from_io(writer.write_at(buffer.as_slice(), offset), expected);
        report.write_calls += 1;

        if outcome.is_failure() {
            log_outcome(BackendKind::Sync, &outcome, expected);
        }
        report.tally.record(&outcome);
    }

    report.elapsed_cycles = measurement.finish(clock).elapsed();
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::testing::StepClock;
    use crate::offset::ADDRESS_SPACE_BOUND;

    /// Records every call; fails the calls whose index is in `fail_on`, and
    /// writes half the buffer on calls listed in `short_on`.
    #[derive(Default)]
    struct ScriptedWriter {
        offsets: Vec<u64>,
        lengths: Vec<usize>,
        fail_on: Vec<usize>,
        short_on: Vec<usize>,
    }

    impl PositionalWrite for ScriptedWriter {
        fn write_at(&mut self, buf: &[u8], offset: u64) -> io::Result<usize> {
            let call = self.offsets.len();
            self.offsets.push(offset);
            self.lengths.push(buf.len());

            if self.fail_on.contains(&call) {
                Err(io::Error::from_raw_os_error(libc::ENOSPC))
            } else if self.short_on.contains(&call) {
                Ok(buf.len() / 2)
            } else {
                Ok(buf.len())
            }
        }
    }

    fn config(iterations: usize) -> BenchmarkConfig {
        BenchmarkConfig::new("unused", 4096).with_iterations(iterations)
    }

    #[test]
    fn issues_one_write_per_iteration() {
        let config = config(100);
        let buffer = WriteBuffer::filled(config.transfer_size);
        let mut writer = ScriptedWriter::default();
        let mut offsets = OffsetGenerator::with_seed(1);
        let clock = StepClock::new(0, 10_000);

        let report = write_loop(&mut writer, &buffer, &config, &mut offsets, &clock);

        assert_eq!(writer.offsets.len(), 100);
        assert!(writer.offsets.iter().all(|&o| o < ADDRESS_SPACE_BOUND));
        assert!(writer.lengths.iter().all(|&l| l == 4096));
        assert_eq!(report.write_calls, 100);
        assert_eq!(report.tally.succeeded, 100);
        assert!(report.tally.all_succeeded());
        assert_eq!(report.submit_calls, 0);
        assert_eq!(report.wait_calls, 0);
    }

    #[test]
    fn failures_do_not_stop_the_loop() {
        let config = config(10);
        let buffer = WriteBuffer::filled(config.transfer_size);
        let mut writer = ScriptedWriter {
            fail_on: vec![0, 4],
            short_on: vec![7],
            ..Default::default()
        };
        let mut offsets = OffsetGenerator::with_seed(2);
        let clock = StepClock::new(0, 1);

        let report = write_loop(&mut writer, &buffer, &config, &mut offsets, &clock);

        assert_eq!(writer.offsets.len(), 10);
        assert_eq!(report.write_calls, 10);
        assert_eq!(report.tally.failed, 2);
        assert_eq!(report.tally.short, 1);
        assert_eq!(report.tally.succeeded, 7);
    }

    #[test]
    fn elapsed_spans_the_loop() {
        let config = config(3);
        let buffer = WriteBuffer::filled(config.transfer_size);
        let mut writer = ScriptedWriter::default();
        let mut offsets = OffsetGenerator::with_seed(3);
        let clock = StepClock::new(5_000, 12_288);

        let report = write_loop(&mut writer, &buffer, &config, &mut offsets, &clock);

        // One read before and one after the loop.
        assert_eq!(report.elapsed_cycles, 12_288);
        assert_eq!(report.cycles_per_byte(), 1.0);
    }

    #[test]
    fn offsets_follow_the_shared_generator() {
        let config = config(5);
        let buffer = WriteBuffer::filled(config.transfer_size);
        let mut writer = ScriptedWriter::default();
        let mut offsets = OffsetGenerator::with_seed(99);
        let clock = StepClock::new(0, 1);

        write_loop(&mut writer, &buffer, &config, &mut offsets, &clock);

        let mut replay = OffsetGenerator::with_seed(99);
        let expected: Vec<u64> = (0..5).map(|_| replay.next_offset()).collect();
        assert_eq!(writer.offsets, expected);
    }

    #[test]
    fn run_writes_the_target_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = BenchmarkConfig::new(dir.path().join("sync.dat"), 512).with_iterations(4);
        let mut offsets = OffsetGenerator::with_seed(4);
        let clock = StepClock::new(0, 1);

        let report = SyncWriteBackend::new()
            .run(&config, &mut offsets, &clock)
            .unwrap();

        assert_eq!(report.backend, BackendKind::Sync);
        assert_eq!(report.write_calls, 4);
        assert!(report.tally.all_succeeded());
        // Sparse: the logical size reaches the highest offset written.
        assert!(std::fs::metadata(&config.file_path).unwrap().len() >= 512);
    }
}
