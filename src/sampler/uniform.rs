//! Uniform sampler
//!
//! Every integer in `[lower, upper]` is equally likely. Uses the xoshiro256++
//! PRNG since a sample may be drawn for every request.

use super::DiscreteNumericDistributionSampler;
use rand::Rng;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;

/// Uniform sampler over an inclusive range
pub struct UniformSampler {
    lower: u64,
    upper: u64,
    rng: Xoshiro256PlusPlus,
}

impl UniformSampler {
    /// Create a new uniform sampler with random seed
    ///
    /// Bounds given in the wrong order are swapped.
    pub fn new(lower: u64, upper: u64) -> Self {
        Self::with_rng(lower, upper, Xoshiro256PlusPlus::from_entropy())
    }

    /// Create a new uniform sampler with specific seed
    pub fn with_seed(lower: u64, upper: u64, seed: u64) -> Self {
        Self::with_rng(lower, upper, Xoshiro256PlusPlus::seed_from_u64(seed))
    }

    fn with_rng(lower: u64, upper: u64, rng: Xoshiro256PlusPlus) -> Self {
        Self {
            lower: lower.min(upper),
            upper: lower.max(upper),
            rng,
        }
    }
}

impl DiscreteNumericDistributionSampler for UniformSampler {
    #[inline]
    fn get_value(&mut self) -> u64 {
        self.rng.gen_range(self.lower..=self.upper)
    }

    fn min(&self) -> u64 {
        self.lower
    }

    fn max(&self) -> u64 {
        self.upper
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_within_bounds() {
        let mut sampler = UniformSampler::new(100, 200);
        for _ in 0..1000 {
            let v = sampler.get_value();
            assert!((100..=200).contains(&v));
        }
        assert_eq!(sampler.min(), 100);
        assert_eq!(sampler.max(), 200);
    }

    #[test]
    fn test_uniform_degenerate_range() {
        let mut sampler = UniformSampler::with_seed(5, 5, 1);
        for _ in 0..10 {
            assert_eq!(sampler.get_value(), 5);
        }
    }

    #[test]
    fn test_uniform_swapped_bounds() {
        let sampler = UniformSampler::with_seed(9, 3, 1);
        assert_eq!(sampler.min(), 3);
        assert_eq!(sampler.max(), 9);
    }

    #[test]
    fn test_uniform_seeded_is_reproducible() {
        let mut a = UniformSampler::with_seed(0, 1_000_000, 12345);
        let mut b = UniformSampler::with_seed(0, 1_000_000, 12345);
        for _ in 0..32 {
            assert_eq!(a.get_value(), b.get_value());
        }
    }

    #[test]
    fn test_uniform_coverage() {
        let mut sampler = UniformSampler::with_seed(0, 99, 42);
        let mut buckets = vec![0u32; 10];

        for _ in 0..10000 {
            buckets[(sampler.get_value() / 10) as usize] += 1;
        }

        // Each bucket should land near 1000; allow 20% deviation
        for count in buckets {
            assert!(count > 800 && count < 1200, "Bucket count {} outside expected range", count);
        }
    }
}
