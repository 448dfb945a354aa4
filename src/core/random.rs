//! Per-tree random number generation.
//!
//! Each tree owns one [`Random`] stream seeded once, up front, from the
//! master seed. The stream is threaded explicitly through sampling and split
//! search so that results do not depend on thread scheduling.

use crate::core::constants::RAND_R_MAX;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// A small xorshift generator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Random {
    state: u32,
}

impl Random {
    /// Constructor, with specific seed. A zero seed would lock the
    /// generator at zero and is replaced by 1.
    pub fn with_seed(seed: u32) -> Self {
        Random {
            state: if seed == 0 { 1 } else { seed },
        }
    }

    /// Generate a value in [0, RAND_R_MAX]
    pub fn next_u32(&mut self) -> u32 {
        self.state ^= self.state << 13;
        self.state ^= self.state >> 17;
        self.state ^= self.state << 5;
        self.state % (RAND_R_MAX + 1)
    }

    /// Generate random integer in [0, end). `end` must be positive.
    pub fn next_int(&mut self, end: usize) -> usize {
        debug_assert!(end > 0);
        self.next_u32() as usize % end
    }

    /// Generate a float in [low, high)
    pub fn next_uniform(&mut self, low: f64, high: f64) -> f64 {
        let unit = self.next_u32() as f64 / (RAND_R_MAX as f64 + 1.0);
        low + (high - low) * unit
    }

    /// Draws `count` non-zero stream seeds from a master seed.
    pub fn derive_seeds(master_seed: u64, count: usize) -> Vec<u32> {
        let mut rng = StdRng::seed_from_u64(master_seed);
        (0..count).map(|_| rng.gen_range(1..=RAND_R_MAX)).collect()
    }
}
