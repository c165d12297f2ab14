//! Deterministic random number generation for the anomaly detector.
//!
//! RULE: The detector never calls a platform RNG. Every tree draws from
//! its own stream derived from the configured seed, so the same data and
//! the same seed always flag the same transactions.

use rand::{RngCore, SeedableRng};
use rand_pcg::Pcg64Mcg;

pub struct DetectorRng {
    inner: Pcg64Mcg,
}

impl DetectorRng {
    pub fn new(seed: u64) -> Self {
        Self { inner: Pcg64Mcg::seed_from_u64(seed) }
    }

    /// Stream for one tree. Adding trees never changes earlier streams.
    pub fn for_tree(seed: u64, tree_index: u64) -> Self {
        let derived_seed = seed ^ tree_index.wrapping_mul(0x9e37_79b9_7f4a_7c15);
        Self::new(derived_seed)
    }

    /// Roll a float in [0.0, 1.0).
    pub fn next_f64(&mut self) -> f64 {
        let bits = self.inner.next_u64();
        (bits >> 11) as f64 * (1.0 / (1u64 << 53) as f64)
    }

    /// Roll a usize in [0, n).
    pub fn next_below(&mut self, n: usize) -> usize {
        assert!(n > 0, "n must be > 0");
        (self.inner.next_u64() % n as u64) as usize
    }

    /// Uniform float in [lo, hi).
    pub fn uniform(&mut self, lo: f64, hi: f64) -> f64 {
        lo + (hi - lo) * self.next_f64()
    }

    /// `k` distinct indices from `0..n` (partial Fisher–Yates).
    pub fn sample_indices(&mut self, n: usize, k: usize) -> Vec<usize> {
        let mut pool: Vec<usize> = (0..n).collect();
        let k = k.min(n);
        for i in 0..k {
            let j = i + self.next_below(n - i);
            pool.swap(i, j);
        }
        pool.truncate(k);
        pool
    }
}
