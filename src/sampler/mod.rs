//! Discrete numeric distribution samplers
//!
//! Samplers supply the jitter consumed by rate limiter variants: per-request
//! delays, inter-arrival gaps for Poisson-like traffic, and so on. Values are
//! unitless non-negative integers; the consumer decides the unit (the
//! distribution-sampling rate limiter treats them as nanoseconds).
//!
//! # Samplers
//!
//! - **Uniform**: every value in `[lower, upper]` equally likely
//! - **Exponential**: memoryless gaps around a mean (Poisson arrivals)
//! - **Gaussian**: bell curve around a mean, clamped at zero
//!
//! # Reproducibility
//!
//! Every sampler has a `with_seed` constructor. The same seed always yields
//! the same sequence, which keeps paced test runs reproducible.
//!
//! # Example
//!
//! ```
//! use reqpulse::sampler::{DiscreteNumericDistributionSampler, uniform::UniformSampler};
//!
//! let mut sampler = UniformSampler::with_seed(10, 20, 7);
//! let value = sampler.get_value();
//! assert!((10..=20).contains(&value));
//! ```

pub mod exponential;
pub mod gaussian;
pub mod uniform;

/// Source of jittered non-negative integers
///
/// # Thread Safety
///
/// Samplers are `Send` so they can move into a worker thread together with
/// the rate limiter that owns them. They are never shared between limiters.
pub trait DiscreteNumericDistributionSampler: Send {
    /// Draw the next value
    fn get_value(&mut self) -> u64;

    /// Smallest value this sampler can return
    fn min(&self) -> u64;

    /// Largest value this sampler can return
    fn max(&self) -> u64;
}
