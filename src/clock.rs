//! Hardware cycle counting.
//!
//! [`TscClock`] reads the x86 time-stamp counter. The counter is per core:
//! if the benchmarking thread migrates between cores the two readings may come
//! from counters that are not perfectly synchronised. Pin the process
//! (`taskset`) when that matters; the measurement is not corrected here.
//!
//! Other architectures have no implementation and [`TscClock::new`] fails
//! with [`BenchError::UnsupportedClock`](crate::error::BenchError::UnsupportedClock).

use crate::error::Result;

/// A monotonically non-decreasing cycle counter.
///
/// Object safe so backends can take `&dyn CycleClock` and tests can swap in a
/// deterministic counter.
pub trait CycleClock {
    /// Current counter value.
    fn now(&self) -> u64;

    /// Short name of the counter source, used in log lines.
    fn source(&self) -> &'static str;
}

/// Time-stamp counter clock (`rdtsc`).
#[derive(Debug, Clone, Copy)]
pub struct TscClock {
    _private: (),
}

impl TscClock {
    /// Returns the TSC clock, or an error where no cycle counter exists.
    #[cfg(any(target_arch = "x86_64", target_arch = "x86"))]
    pub fn new() -> Result<Self> {
        Ok(Self { _private: () })
    }

    /// Returns the TSC clock, or an error where no cycle counter exists.
    #[cfg(not(any(target_arch = "x86_64", target_arch = "x86")))]
    pub fn new() -> Result<Self> {
        Err(crate::error::BenchError::UnsupportedClock {
            arch: std::env::consts::ARCH,
        })
    }
}

impl CycleClock for TscClock {
    #[cfg(target_arch = "x86_64")]
    #[inline]
    fn now(&self) -> u64 {
        // SAFETY: rdtsc has no preconditions and is available on every x86_64 CPU.
        unsafe { core::arch::x86_64::_rdtsc() }
    }

    #[cfg(target_arch = "x86")]
    #[inline]
    fn now(&self) -> u64 {
        // SAFETY: rdtsc has no preconditions on Pentium and later.
        unsafe { core::arch::x86::_rdtsc() }
    }

    // Unreachable: `TscClock::new` refuses to construct one here.
    #[cfg(not(any(target_arch = "x86_64", target_arch = "x86")))]
    fn now(&self) -> u64 {
        0
    }

    fn source(&self) -> &'static str {
        "rdtsc"
    }
}

/// Start and end counter values bracketing a timed region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleMeasurement {
    /// Counter value when the region started
    pub start: u64,
    /// Counter value when the region ended
    pub end: u64,
}

impl CycleMeasurement {
    /// Starts a measurement. `end` equals `start` until [`finish`](Self::finish).
    #[inline]
    pub fn start(clock: &dyn CycleClock) -> Self {
        let start = clock.now();
        Self { start, end: start }
    }

    /// Records the end of the region.
    #[inline]
    pub fn finish(mut self, clock: &dyn CycleClock) -> Self {
        self.end = clock.now();
        self
    }

    /// Elapsed cycles. Never negative: a backwards reading (core migration)
    /// yields 0.
    #[inline]
    pub fn elapsed(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::CycleClock;
    use std::cell::Cell;

    /// Clock advancing by a fixed step on every read.
    #[derive(Debug)]
    pub(crate) struct StepClock {
        next: Cell<u64>,
        step: u64,
    }

    impl StepClock {
        pub(crate) fn new(start: u64, step: u64) -> Self {
            Self {
                next: Cell::new(start),
                step,
            }
        }
    }

    impl CycleClock for StepClock {
        fn now(&self) -> u64 {
            let value = self.next.get();
            self.next.set(value + self.step);
            value
        }

        fn source(&self) -> &'static str {
            "step"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::StepClock;
    use super::*;

    #[test]
    fn measurement_elapsed() {
        let clock = StepClock::new(1_000, 250);
        let measurement = CycleMeasurement::start(&clock).finish(&clock);
        assert_eq!(measurement.start, 1_000);
        assert_eq!(measurement.end, 1_250);
        assert_eq!(measurement.elapsed(), 250);
    }

    #[test]
    fn unfinished_measurement_is_zero() {
        let clock = StepClock::new(42, 1);
        let measurement = CycleMeasurement::start(&clock);
        assert_eq!(measurement.elapsed(), 0);
    }

    #[test]
    fn backwards_reading_saturates() {
        let measurement = CycleMeasurement {
            start: 500,
            end: 100,
        };
        assert_eq!(measurement.elapsed(), 0);
    }

    #[cfg(any(target_arch = "x86_64", target_arch = "x86"))]
    #[test]
    fn tsc_is_non_decreasing() {
        let clock = TscClock::new().unwrap();
        let mut previous = clock.now();
        for _ in 0..1_000 {
            let current = clock.now();
            assert!(current >= previous);
            previous = current;
        }
        assert_eq!(clock.source(), "rdtsc");
    }

    #[cfg(not(any(target_arch = "x86_64", target_arch = "x86")))]
    #[test]
    fn tsc_unsupported_elsewhere() {
        assert!(matches!(
            TscClock::new(),
            Err(crate::error::BenchError::UnsupportedClock { .. })
        ));
    }
}
