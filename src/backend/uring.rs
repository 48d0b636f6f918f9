//! Batched io_uring write backend.
//!
//! A run has two phases:
//!
//! 1. **Submission**: one `Write` entry per iteration is pushed onto the
//!    submission queue, then all of them are handed to the kernel in a single
//!    `io_uring_enter` call.
//! 2. **Completion**: completions are drained in groups of `batch_size`. Each
//!    group is one blocking wait for `min(batch_size, remaining)` entries,
//!    followed by reaping exactly that many and advancing the completion head.
//!
//! The thread never submits while waiting. Failed completions are counted
//! and draining continues until every submitted entry has been consumed.

use std::io;
use std::os::unix::io::{AsRawFd, RawFd};

use crate::backend::{log_outcome, open_target, WriteBackend};
use crate::buffer::WriteBuffer;
use crate::clock::{CycleClock, CycleMeasurement};
use crate::config::BenchmarkConfig;
use crate::error::{BenchError, Result};
use crate::offset::OffsetGenerator;
use crate::report::{BackendKind, RunReport, WriteOutcome};

#[cfg(target_os = "linux")]
use io_uring::{opcode, types, IoUring};

/// `user_data` carried by every write entry. Completions are only counted, so
/// all entries share one tag.
pub const WRITE_TAG: u64 = 0x5752_4954; // "WRIT"

/// Largest ring the kernel will set up (`IORING_MAX_ENTRIES`).
pub const MAX_QUEUE_ENTRIES: u32 = 32_768;

/// A submission/completion queue pair that can carry positional writes.
///
/// [`UringQueue`] is the production implementation; the phase logic in
/// [`run_batched`] only talks to this trait.
pub trait SubmissionRing {
    /// Number of submission slots.
    fn capacity(&self) -> usize;

    /// Queues one write of `len` bytes from `buf` to `fd` at `offset`.
    ///
    /// Returns `false` if no submission slot is free.
    ///
    /// # Safety
    ///
    /// `buf` must be valid for reads of `len` bytes until the entry's
    /// completion has been reaped or the ring has been dropped, and `fd` must
    /// stay open for as long.
    unsafe fn push_write(&mut self, fd: RawFd, buf: *const u8, len: u32, offset: u64) -> bool;

    /// Hands every queued entry to the kernel in one call. Returns how many
    /// entries were consumed.
    fn submit(&mut self) -> io::Result<usize>;

    /// Blocks until at least `want` completions are ready to reap.
    fn wait(&mut self, want: usize) -> io::Result<()>;

    /// Consumes up to `max` ready completions, passing each result code to
    /// `on_result`, and marks them seen. Returns how many were consumed.
    fn reap(&mut self, max: usize, on_result: &mut dyn FnMut(i32)) -> usize;
}

/// Linux io_uring submission/completion queue pair.
#[cfg(target_os = "linux")]
pub struct UringQueue {
    ring: IoUring,
}

#[cfg(target_os = "linux")]
impl UringQueue {
    /// Sets up a ring with at least `entries` submission slots.
    ///
    /// The kernel rounds `entries` up to a power of two and sizes the
    /// completion queue at twice that, so every submitted entry has room to
    /// complete.
    pub fn new(entries: u32) -> Result<Self> {
        if entries == 0 {
            return Err(BenchError::QueueInit {
                entries,
                source: io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "queue depth must be greater than 0",
                ),
            });
        }

        if entries > MAX_QUEUE_ENTRIES {
            return Err(BenchError::QueueInit {
                entries,
                source: io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("queue depth exceeds the kernel limit of {MAX_QUEUE_ENTRIES}"),
                ),
            });
        }

        let ring = IoUring::new(entries)
            .map_err(|source| BenchError::QueueInit { entries, source })?;
        Ok(Self { ring })
    }
}

#[cfg(target_os = "linux")]
impl std::fmt::Debug for UringQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UringQueue")
            .field("sq_entries", &self.ring.params().sq_entries())
            .field("cq_entries", &self.ring.params().cq_entries())
            .finish()
    }
}

#[cfg(target_os = "linux")]
impl SubmissionRing for UringQueue {
    fn capacity(&self) -> usize {
        self.ring.params().sq_entries() as usize
    }

    unsafe fn push_write(&mut self, fd: RawFd, buf: *const u8, len: u32, offset: u64) -> bool {
        let entry = opcode::Write::new(types::Fd(fd), buf, len)
            .offset(offset)
            .build()
            .user_data(WRITE_TAG);

        // SAFETY: the caller guarantees `buf` and `fd` outlive the entry.
        unsafe { self.ring.submission().push(&entry).is_ok() }
    }

    fn submit(&mut self) -> io::Result<usize> {
        self.ring.submit()
    }

    fn wait(&mut self, want: usize) -> io::Result<()> {
        loop {
            match self.ring.submit_and_wait(want) {
                Ok(_) => return Ok(()),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }

    fn reap(&mut self, max: usize, on_result: &mut dyn FnMut(i32)) -> usize {
        let mut cq = self.ring.completion();
        let mut reaped = 0;
        for cqe in cq.by_ref().take(max) {
            on_result(cqe.result());
            reaped += 1;
        }
        cq.sync();
        reaped
    }
}

/// Stub for platforms without io_uring.
#[cfg(not(target_os = "linux"))]
#[derive(Debug)]
pub struct UringQueue;

#[cfg(not(target_os = "linux"))]
impl UringQueue {
    /// Always fails: io_uring is Linux only.
    pub fn new(entries: u32) -> Result<Self> {
        Err(BenchError::QueueInit {
            entries,
            source: io::Error::new(
                io::ErrorKind::Unsupported,
                "io_uring is only supported on Linux",
            ),
        })
    }
}

#[cfg(not(target_os = "linux"))]
impl SubmissionRing for UringQueue {
    fn capacity(&self) -> usize {
        0
    }

    unsafe fn push_write(
        &mut self,
        _fd: RawFd,
        _buf: *const u8,
        _len: u32,
        _offset: u64,
    ) -> bool {
        false
    }

    fn submit(&mut self) -> io::Result<usize> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "io_uring is only supported on Linux",
        ))
    }

    fn wait(&mut self, _want: usize) -> io::Result<()> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "io_uring is only supported on Linux",
        ))
    }

    fn reap(&mut self, _max: usize, _on_result: &mut dyn FnMut(i32)) -> usize {
        0
    }
}

/// Benchmarks batched io_uring writes.
#[derive(Debug, Default, Clone, Copy)]
pub struct AsyncBatchedWriteBackend;

impl AsyncBatchedWriteBackend {
    /// Creates the backend.
    pub fn new() -> Self {
        Self
    }
}

impl WriteBackend for AsyncBatchedWriteBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::IoUring
    }

    fn run(
        &mut self,
        config: &BenchmarkConfig,
        offsets: &mut OffsetGenerator,
        clock: &dyn CycleClock,
    ) -> Result<RunReport> {
        // Dropped in reverse: ring, then buffer, then file.
        let file = open_target(config)?;
        let buffer = WriteBuffer::filled(config.transfer_size);

        let entries = u32::try_from(config.queue_depth()).unwrap_or(u32::MAX);
        let mut ring = UringQueue::new(entries)?;

        tracing::debug!(
            path = %config.file_path.display(),
            entries,
            capacity = ring.capacity(),
            batch_size = config.batch_size,
            durable = config.durable,
            "starting io_uring write run"
        );

        let result = run_batched(&mut ring, file.as_raw_fd(), &buffer, config, offsets, clock);

        // Closing the ring does not wait for requests already handed to
        // io-wq workers, and those may still read the buffer. The file is
        // safe to close: each request holds its own reference to it.
        if let Err(e) = &result {
            if e.leaves_requests_in_flight() {
                tracing::warn!(
                    error = %e,
                    bytes = buffer.len(),
                    "leaking write buffer, requests may still be in flight"
                );
                std::mem::forget(buffer);
            }
        }

        result
    }
}

/// Runs both phases on `ring` and measures the cycles spent.
///
/// The caller owns `ring`, `fd` and `buffer`. On success every entry has been
/// reaped. If the returned error
/// [leaves requests in flight](BenchError::leaves_requests_in_flight), the
/// kernel may still read `buffer` after the ring is gone, so the caller must
/// not free it. Write entries only read from the buffer.
pub fn run_batched<R: SubmissionRing + ?Sized>(
    ring: &mut R,
    fd: RawFd,
    buffer: &WriteBuffer,
    config: &BenchmarkConfig,
    offsets: &mut OffsetGenerator,
    clock: &dyn CycleClock,
) -> Result<RunReport> {
    let expected = config.iteration_count;
    let len = u32::try_from(buffer.len()).map_err(|_| BenchError::InvalidConfig {
        field: "transfer_size",
        reason: format!("{} exceeds {} bytes", buffer.len(), u32::MAX),
    })?;

    let mut report = RunReport::new(BackendKind::IoUring, config);
    let measurement = CycleMeasurement::start(clock);

    for pushed in 0..expected {
        let offset = offsets.next_offset();

        // SAFETY: the caller keeps `buffer` and `fd` alive until the ring is
        // dropped, and on success every entry is reaped before returning.
        let queued = unsafe { ring.push_write(fd, buffer.as_ptr(), len, offset) };
        if !queued {
            return Err(BenchError::QueueFull {
                pushed,
                capacity: ring.capacity(),
            });
        }
    }

    let submitted = ring.submit().map_err(BenchError::Submit)?;
    report.submit_calls += 1;
    if submitted != expected {
        return Err(BenchError::ShortSubmit {
            submitted,
            expected,
        });
    }

    let transfer_size = buffer.len();
    while report.completions < expected {
        let want = config.batch_size.min(expected - report.completions);

        ring.wait(want).map_err(|source| BenchError::Wait {
            drained: report.completions,
            expected,
            source,
        })?;
        report.wait_calls += 1;

        let tally = &mut report.tally;
        let reaped = ring.reap(want, &mut |code| {
            let outcome = WriteOutcome::from_completion(code, transfer_size);
            if outcome.is_failure() {
                log_outcome(BackendKind::IoUring, &outcome, transfer_size);
            }
            tally.record(&outcome);
        });
        report.completions += reaped;
    }

    report.elapsed_cycles = measurement.finish(clock).elapsed();
    Ok(report)
}
