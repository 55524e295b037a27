//! Per-worker pseudo-random value sources
//!
//! Every worker draws the values it multiplies into its local product from its
//! own source. Sources are never shared: each worker thread or process owns one
//! instance, so no locking is involved.
//!
//! # Seeding
//!
//! Workers of a group are typically started within microseconds of each other,
//! so seeding from a coarse wall clock would give them identical streams. The
//! default source is seeded from OS entropy instead. When a seed is configured,
//! it is mixed with the worker rank: runs become reproducible while ranks still
//! draw different values.
//!
//! # Example
//!
//! ```
//! use geomean::source::{ValueSource, UniformSource};
//!
//! let mut source = UniformSource::with_seed(42, 100);
//! let value = source.next_value();
//! assert!((0.0..=100.0).contains(&value));
//! ```

use crate::group::Rank;
use rand::Rng;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;

/// Largest value drawn by default (the classic C `RAND_MAX`)
pub const DEFAULT_MAX_VALUE: u64 = 2_147_483_647;

/// Source of non-negative pseudo-random values
pub trait ValueSource: Send {
    /// Draw the next value
    fn next_value(&mut self) -> f64;
}

/// Uniform integer values in `[0, max_value]`, returned as `f64`
///
/// Backed by xoshiro256++, which is fast and has good statistical properties.
pub struct UniformSource {
    rng: Xoshiro256PlusPlus,
    max_value: u64,
}

impl UniformSource {
    /// Create a source seeded from OS entropy
    pub fn new(max_value: u64) -> Self {
        Self {
            rng: Xoshiro256PlusPlus::from_entropy(),
            max_value,
        }
    }

    /// Create a source with a specific seed
    pub fn with_seed(seed: u64, max_value: u64) -> Self {
        Self {
            rng: Xoshiro256PlusPlus::seed_from_u64(seed),
            max_value,
        }
    }

    /// Create the source for `rank`
    ///
    /// With `seed == None` the source is entropy-seeded. Otherwise the seed is
    /// mixed with the rank so that every rank gets its own reproducible stream.
    pub fn for_rank(rank: Rank, seed: Option<u64>, max_value: u64) -> Self {
        match seed {
            Some(seed) => Self::with_seed(rank_seed(seed, rank), max_value),
            None => Self::new(max_value),
        }
    }
}

impl ValueSource for UniformSource {
    #[inline]
    fn next_value(&mut self) -> f64 {
        self.rng.gen_range(0..=self.max_value) as f64
    }
}

/// Derive the seed of one rank from the run seed
///
/// splitmix64 finalizer over `seed + golden * (rank + 1)`: neighbouring ranks
/// end up with unrelated seeds.
pub fn rank_seed(seed: u64, rank: Rank) -> u64 {
    let mut z = seed.wrapping_add(0x9E37_79B9_7F4A_7C15u64.wrapping_mul(rank as u64 + 1));
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}
