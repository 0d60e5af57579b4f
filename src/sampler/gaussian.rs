//! Gaussian (normal) sampler
//!
//! Values cluster around a mean with a configured standard deviation.
//! Negative draws are clamped to zero, so a mean close to zero skews the
//! effective distribution upward.
//!
//! Uses the Box-Muller transform, caching the spare variate for the next call.

use super::DiscreteNumericDistributionSampler;
use rand::Rng;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use std::f64::consts::PI;

/// Gaussian sampler clamped to `[0, cap]`
pub struct GaussianSampler {
    mean: f64,
    stddev: f64,
    cap: u64,
    rng: Xoshiro256PlusPlus,
    spare: Option<f64>,
}

impl GaussianSampler {
    /// Create a new Gaussian sampler with random seed
    ///
    /// # Panics
    ///
    /// Panics if stddev is negative or not finite. Configuration validation
    /// rejects such values before they reach here.
    pub fn new(mean: f64, stddev: f64, cap: u64) -> Self {
        Self::with_rng(mean, stddev, cap, Xoshiro256PlusPlus::from_entropy())
    }

    /// Create a new Gaussian sampler with specific seed
    pub fn with_seed(mean: f64, stddev: f64, cap: u64, seed: u64) -> Self {
        Self::with_rng(mean, stddev, cap, Xoshiro256PlusPlus::seed_from_u64(seed))
    }

    fn with_rng(mean: f64, stddev: f64, cap: u64, rng: Xoshiro256PlusPlus) -> Self {
        assert!(stddev.is_finite() && stddev >= 0.0, "Standard deviation must be non-negative");

        Self {
            mean,
            stddev,
            cap,
            rng,
            spare: None,
        }
    }

    fn generate_standard_normal(&mut self) -> f64 {
        if let Some(spare) = self.spare.take() {
            return spare;
        }

        // gen() is in [0, 1); shift to (0, 1] so ln() stays finite
        let u1: f64 = 1.0 - self.rng.gen::<f64>();
        let u2: f64 = self.rng.gen();

        let r = (-2.0 * u1.ln()).sqrt();
        let theta = 2.0 * PI * u2;

        self.spare = Some(r * theta.sin());
        r * theta.cos()
    }
}

impl DiscreteNumericDistributionSampler for GaussianSampler {
    fn get_value(&mut self) -> u64 {
        let z = self.generate_standard_normal();
        let v = self.mean + z * self.stddev;
        if v <= 0.0 {
            0
        } else {
            (v.round() as u64).min(self.cap)
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
    fn test_gaussian_clusters_around_mean() {
        let mut sampler = GaussianSampler::with_seed(10_000.0, 1_000.0, u64::MAX, 3);
        let n = 20_000;
        let mut within_one_sigma = 0;
        for _ in 0..n {
            let v = sampler.get_value();
            if (9_000..=11_000).contains(&v) {
                within_one_sigma += 1;
            }
        }
        let fraction = within_one_sigma as f64 / n as f64;

        // ~68% for a normal distribution
        assert!(fraction > 0.64 && fraction < 0.72, "fraction within 1 sigma: {}", fraction);
    }

    #[test]
    fn test_gaussian_clamps_negative_to_zero() {
        let mut sampler = GaussianSampler::with_seed(0.0, 100.0, u64::MAX, 3);
        let zeros = (0..1000).filter(|_| sampler.get_value() == 0).count();
        assert!(zeros > 400);
    }

    #[test]
    fn test_gaussian_zero_stddev_is_constant() {
        let mut sampler = GaussianSampler::with_seed(250.0, 0.0, u64::MAX, 3);
        for _ in 0..10 {
            assert_eq!(sampler.get_value(), 250);
        }
    }

    #[test]
    fn test_gaussian_respects_cap() {
        let mut sampler = GaussianSampler::with_seed(1_000.0, 500.0, 1_200, 3);
        for _ in 0..1000 {
            assert!(sampler.get_value() <= 1_200);
        }
    }

    #[test]
    #[should_panic(expected = "Standard deviation must be non-negative")]
    fn test_gaussian_negative_stddev() {
        GaussianSampler::new(10.0, -1.0, 100);
    }
}
