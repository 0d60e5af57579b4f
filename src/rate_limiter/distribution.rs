//! Jitter over another limiter
//!
//! Every grant from the inner limiter is held back by a delay drawn from a
//! sampler (in nanoseconds) before being passed on. Over an unlimited inner
//! limiter this turns the sampler into the inter-arrival distribution: with
//! an exponential sampler the result is Poisson arrivals.

use super::RateLimiter;
use crate::platform::TimeSource;
use crate::sampler::DiscreteNumericDistributionSampler;
use crate::util::fast_time::FastInstant;
use std::sync::Arc;
use std::time::Duration;

/// Delays inner grants by sampled jitter
pub struct DistributionSamplingRateLimiter<L: RateLimiter> {
    inner: L,
    sampler: Box<dyn DiscreteNumericDistributionSampler>,
    time_source: Arc<dyn TimeSource>,
    pending_until: Option<FastInstant>,
    outstanding: u64,
}

impl<L: RateLimiter> DistributionSamplingRateLimiter<L> {
    pub fn new(
        inner: L,
        sampler: Box<dyn DiscreteNumericDistributionSampler>,
        time_source: Arc<dyn TimeSource>,
    ) -> Self {
        Self {
            inner,
            sampler,
            time_source,
            pending_until: None,
            outstanding: 0,
        }
    }

    /// Whether an inner grant is currently being held back
    pub fn has_pending(&self) -> bool {
        self.pending_until.is_some()
    }

    /// Units handed out and not released
    pub fn outstanding(&self) -> u64 {
        self.outstanding
    }

    pub fn inner(&self) -> &L {
        &self.inner
    }
}

impl<L: RateLimiter> RateLimiter for DistributionSamplingRateLimiter<L> {
    fn try_acquire_one(&mut self) -> bool {
        let now = self.time_source.monotonic_now();

        if self.pending_until.is_none() && self.inner.try_acquire_one() {
            let delay = Duration::from_nanos(self.sampler.get_value());
            self.pending_until = Some(now.saturating_add(delay));
        }

        match self.pending_until {
            Some(due) if now >= due => {
                self.pending_until = None;
                self.outstanding += 1;
                true
            }
            _ => false,
        }
    }

    fn release_one(&mut self) {
        if self.outstanding == 0 {
            tracing::warn!("release_one called on jittered rate limiter with no outstanding units");
            return;
        }
        self.outstanding -= 1;
        self.inner.release_one();
    }

    fn reset(&mut self) {
        // A held-back unit was acquired from the inner limiter; the inner reset forgets it
        self.pending_until = None;
        self.outstanding = 0;
        self.inner.reset();
    }
}
