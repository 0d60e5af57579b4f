//! Exponential sampler
//!
//! Draws memoryless gaps with a configured mean. Used as the inter-arrival
//! delay of the distribution-sampling rate limiter, this produces Poisson
//! arrivals: on average `1 / mean` requests per unit, with realistic
//! clustering instead of a perfectly even cadence.

use super::DiscreteNumericDistributionSampler;
use rand::SeedableRng;
use rand_distr::{Distribution, Exp};
use rand_xoshiro::Xoshiro256PlusPlus;

/// Exponential sampler around a mean, capped at `cap`
pub struct ExponentialSampler {
    mean: f64,
    cap: u64,
    dist: Option<Exp<f64>>,
    rng: Xoshiro256PlusPlus,
}

impl ExponentialSampler {
    /// Create a new exponential sampler with random seed
    ///
    /// A zero mean yields a sampler that always returns 0.
    pub fn new(mean: u64, cap: u64) -> Self {
        Self::with_rng(mean, cap, Xoshiro256PlusPlus::from_entropy())
    }

    /// Create a new exponential sampler with specific seed
    pub fn with_seed(mean: u64, cap: u64, seed: u64) -> Self {
        Self::with_rng(mean, cap, Xoshiro256PlusPlus::seed_from_u64(seed))
    }

    fn with_rng(mean: u64, cap: u64, rng: Xoshiro256PlusPlus) -> Self {
        let mean = mean as f64;
        // Exp::new only fails for a negative or NaN lambda
        let dist = if mean > 0.0 { Exp::new(1.0 / mean).ok() } else { None };
        Self { mean, cap, dist, rng }
    }

    /// Configured mean
    pub fn mean(&self) -> f64 {
        self.mean
    }
}

impl DiscreteNumericDistributionSampler for ExponentialSampler {
    fn get_value(&mut self) -> u64 {
        match &self.dist {
            Some(dist) => {
                let v = dist.sample(&mut self.rng);
                (v.round() as u64).min(self.cap)
            }
            None => 0,
        }
    }

    fn min(&self) -> u64 {
        0
    }

    fn max(&self) -> u64 {
        self.cap
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exponential_mean_is_close() {
        let mut sampler = ExponentialSampler::with_seed(1_000, u64::MAX, 7);
        let n = 20_000u64;
        let total: u64 = (0..n).map(|_| sampler.get_value()).sum();
        let mean = total as f64 / n as f64;

        assert!(mean > 950.0 && mean < 1050.0, "sample mean {} too far from 1000", mean);
    }

    #[test]
    fn test_exponential_respects_cap() {
        let mut sampler = ExponentialSampler::with_seed(1_000, 1_500, 7);
        for _ in 0..10_000 {
            assert!(sampler.get_value() <= 1_500);
        }
        assert_eq!(sampler.max(), 1_500);
    }

    #[test]
    fn test_exponential_zero_mean() {
        let mut sampler = ExponentialSampler::with_seed(0, 100, 7);
        assert_eq!(sampler.get_value(), 0);
    }

    #[test]
    fn test_exponential_seeded_is_reproducible() {
        let mut a = ExponentialSampler::with_seed(500, u64::MAX, 99);
        let mut b = ExponentialSampler::with_seed(500, u64::MAX, 99);
        for _ in 0..32 {
            assert_eq!(a.get_value(), b.get_value());
        }
    }
}
