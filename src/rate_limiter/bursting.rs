//! Burst-size cap over another limiter
//!
//! Collects grants from the inner limiter until `burst_size` have
//! accumulated, then hands them out back-to-back. The average rate is that
//! of the inner limiter; the traffic shape becomes bursty.

use super::RateLimiter;

/// Groups inner grants into bursts of `burst_size`
///
/// Every unit taken from the inner limiter is in exactly one place:
/// accumulating toward the next burst, waiting in the current burst, or
/// handed out and not yet released.
pub struct BurstingRateLimiter<L: RateLimiter> {
    inner: L,
    burst_size: u64,
    accumulated: u64,
    releasing: u64,
    outstanding: u64,
}

impl<L: RateLimiter> BurstingRateLimiter<L> {
    /// Wrap `inner`; a burst size of 0 is treated as 1 (no bursting)
    pub fn new(inner: L, burst_size: u64) -> Self {
        Self {
            inner,
            burst_size: burst_size.max(1),
            accumulated: 0,
            releasing: 0,
            outstanding: 0,
        }
    }

    /// Units acquired from the inner limiter but not yet part of a released burst
    pub fn accumulated(&self) -> u64 {
        self.accumulated
    }

    /// Units handed out and not released
    pub fn outstanding(&self) -> u64 {
        self.outstanding
    }

    pub fn inner(&self) -> &L {
        &self.inner
    }
}

impl<L: RateLimiter> RateLimiter for BurstingRateLimiter<L> {
    fn try_acquire_one(&mut self) -> bool {
        if self.releasing > 0 {
            self.releasing -= 1;
            self.outstanding += 1;
            return true;
        }

        while self.accumulated < self.burst_size && self.inner.try_acquire_one() {
            self.accumulated += 1;
        }

        if self.accumulated == self.burst_size {
            self.accumulated = 0;
            self.releasing = self.burst_size - 1;
            self.outstanding += 1;
            return true;
        }

        false
    }

    fn release_one(&mut self) {
        if self.outstanding == 0 {
            tracing::warn!("release_one called on bursting rate limiter with no outstanding units");
            return;
        }
        // Still held from the inner limiter; handed out again next
        self.outstanding -= 1;
        self.releasing += 1;
    }

    fn reset(&mut self) {
        self.inner.reset();
        self.accumulated = 0;
        self.releasing = 0;
        self.outstanding = 0;
    }
}
