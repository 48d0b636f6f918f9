//! Random write offsets inside the sparse target range.

use std::time::{SystemTime, UNIX_EPOCH};

/// Size of the sparse target address range: 1 GiB.
///
/// Every offset handed out lies in `[0, ADDRESS_SPACE_BOUND)`. Offsets are not
/// aligned and a write may extend past the bound by up to one transfer size.
pub const ADDRESS_SPACE_BOUND: u64 = 1024 * 1024 * 1024;

/// Uniform pseudo-random offsets over `[0, ADDRESS_SPACE_BOUND)`.
///
/// Repeats are expected. One generator is seeded per process and shared by
/// both backends, so they see different offset sequences.
#[derive(Debug, Clone)]
pub struct OffsetGenerator {
    rng: fastrand::Rng,
    seed: u64,
}

impl OffsetGenerator {
    /// Creates a generator with a fixed seed.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: fastrand::Rng::with_seed(seed),
            seed,
        }
    }

    /// Creates a generator seeded from the wall clock.
    pub fn from_time() -> Self {
        let seed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() ^ u64::from(d.subsec_nanos()))
            .unwrap_or_default();
        Self::with_seed(seed)
    }

    /// Seed this generator was created with.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Next offset in `[0, ADDRESS_SPACE_BOUND)`.
    #[inline]
    pub fn next_offset(&mut self) -> u64 {
        self.rng.u64(0..ADDRESS_SPACE_BOUND)
    }
}
