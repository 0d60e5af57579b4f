//! Request pacing
//!
//! A rate limiter decides, once per sequencer tick, whether one more request
//! attempt may be made right now. Acquisition is non-blocking and cheap
//! enough to be called millions of times per second.
//!
//! # Budget accounting
//!
//! Every acquired unit must end up either consumed (a request was started)
//! or handed back with [`RateLimiter::release_one`] (the executor refused the
//! start). A caller that acquires and silently drops a unit starves later
//! acquisitions. Releasing more units than were acquired is ignored and
//! logged; the outstanding count never goes negative.
//!
//! # Variants
//!
//! - [`linear::LinearRateLimiter`]: fixed requests-per-second from monotonic time deltas
//! - [`UnlimitedRateLimiter`]: always grants (open-loop, as fast as possible)
//! - [`bursting::BurstingRateLimiter`]: groups inner grants into bursts
//! - [`distribution::DistributionSamplingRateLimiter`]: delays inner grants by a sampled jitter
//! - [`chained::ChainedRateLimiter`]: grants only when every member grants

pub mod bursting;
pub mod chained;
pub mod distribution;
pub mod linear;

pub use bursting::BurstingRateLimiter;
pub use chained::ChainedRateLimiter;
pub use distribution::DistributionSamplingRateLimiter;
pub use linear::LinearRateLimiter;

/// Pacing capability consumed by the sequencer
///
/// Each worker owns its own limiter; limiters are `Send` so they can move
/// into the worker thread, but are never shared between sequencers.
pub trait RateLimiter: Send {
    /// Take one unit if one is available right now
    fn try_acquire_one(&mut self) -> bool;

    /// Hand back a unit that was acquired but could not be consumed
    fn release_one(&mut self);

    /// Forget all accounting and restart pacing from the next acquisition
    ///
    /// Called by the sequencer when a run starts.
    fn reset(&mut self) {}
}

impl<T: RateLimiter + ?Sized> RateLimiter for Box<T> {
    #[inline]
    fn try_acquire_one(&mut self) -> bool {
        (**self).try_acquire_one()
    }

    #[inline]
    fn release_one(&mut self) {
        (**self).release_one()
    }

    fn reset(&mut self) {
        (**self).reset()
    }
}

/// Limiter that always grants
///
/// Used for open-loop runs that should issue requests as fast as the
/// executor accepts them.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnlimitedRateLimiter;

impl RateLimiter for UnlimitedRateLimiter {
    #[inline(always)]
    fn try_acquire_one(&mut self) -> bool {
        true
    }

    #[inline(always)]
    fn release_one(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unlimited_always_grants() {
        let mut limiter = UnlimitedRateLimiter;
        for _ in 0..10_000 {
            assert!(limiter.try_acquire_one());
        }
        limiter.release_one();
        assert!(limiter.try_acquire_one());
    }

    #[test]
    fn test_boxed_limiter_delegates() {
        let mut limiter: Box<dyn RateLimiter> = Box::new(UnlimitedRateLimiter);
        assert!(limiter.try_acquire_one());
        limiter.release_one();
        limiter.reset();
    }
}
