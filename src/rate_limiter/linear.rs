//! Fixed-rate limiter
//!
//! Grants units at a constant requests-per-second cadence. The number of
//! units due is derived from the monotonic time elapsed since the first
//! acquisition attempt, not from accumulated sleeps, so pacing does not drift
//! when individual ticks run late: a late tick simply finds several units due
//! at once and the loop catches up.

use super::RateLimiter;
use crate::platform::TimeSource;
use crate::util::fast_time::FastInstant;
use std::sync::Arc;

const NANOS_PER_SEC: u128 = 1_000_000_000;

/// Limiter releasing `requests_per_second` units per second
///
/// The first unit becomes available one interval after pacing starts, so a
/// 10/s limiter grants at 100ms, 200ms, 300ms, ...
///
/// # Invariant
///
/// At any instant, `acquired <= floor(elapsed * rate)`. Releasing a unit
/// lowers `acquired` and makes the unit immediately acquirable again.
pub struct LinearRateLimiter {
    time_source: Arc<dyn TimeSource>,
    requests_per_second: u32,
    started_at: Option<FastInstant>,
    acquired: u64,
    acquireable: u64,
}

impl LinearRateLimiter {
    /// Create a limiter paced by `time_source`
    ///
    /// A rate of 0 never grants. Configuration validation rejects it before
    /// it gets here, but the limiter stays well-defined.
    pub fn new(time_source: Arc<dyn TimeSource>, requests_per_second: u32) -> Self {
        Self {
            time_source,
            requests_per_second,
            started_at: None,
            acquired: 0,
            acquireable: 0,
        }
    }

    /// Units currently held by callers (acquired and not released)
    pub fn acquired(&self) -> u64 {
        self.acquired
    }

    /// Configured rate
    pub fn requests_per_second(&self) -> u32 {
        self.requests_per_second
    }

    /// Total units due since pacing started
    pub fn due(&self) -> u64 {
        match self.started_at {
            Some(start) => {
                let elapsed = self.time_source.monotonic_now().duration_since(start);
                let due = elapsed.as_nanos() * self.requests_per_second as u128 / NANOS_PER_SEC;
                u64::try_from(due).unwrap_or(u64::MAX)
            }
            None => 0,
        }
    }

    #[inline]
    fn take(&mut self) -> bool {
        if self.acquireable > 0 {
            self.acquireable -= 1;
            self.acquired += 1;
            true
        } else {
            false
        }
    }
}

impl RateLimiter for LinearRateLimiter {
    fn try_acquire_one(&mut self) -> bool {
        if self.take() {
            return true;
        }

        if self.started_at.is_none() {
            self.started_at = Some(self.time_source.monotonic_now());
        }

        self.acquireable = self.due().saturating_sub(self.acquired);
        self.take()
    }

    fn release_one(&mut self) {
        if self.acquired == 0 {
            tracing::warn!("release_one called on linear rate limiter with no outstanding units");
            return;
        }
        self.acquired -= 1;
        self.acquireable += 1;
    }

    fn reset(&mut self) {
        self.started_at = None;
        self.acquired = 0;
        self.acquireable = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::SimulatedTimeSource;
    use rand::{Rng, SeedableRng};
    use rand_xoshiro::Xoshiro256PlusPlus;
    use std::time::Duration;

    fn limiter(rps: u32) -> (Arc<SimulatedTimeSource>, LinearRateLimiter) {
        let time = Arc::new(SimulatedTimeSource::new());
        let limiter = LinearRateLimiter::new(time.clone(), rps);
        (time, limiter)
    }

    #[test]
    fn test_nothing_due_at_start() {
        let (_time, mut limiter) = limiter(10);
        assert!(!limiter.try_acquire_one());
        assert!(!limiter.try_acquire_one());
    }

    #[test]
    fn test_grants_one_per_interval() {
        let (time, mut limiter) = limiter(10);
        assert!(!limiter.try_acquire_one());

        time.advance(Duration::from_millis(99));
        assert!(!limiter.try_acquire_one());

        time.advance(Duration::from_millis(1));
        assert!(limiter.try_acquire_one());
        assert!(!limiter.try_acquire_one());

        time.advance(Duration::from_millis(100));
        assert!(limiter.try_acquire_one());
        assert!(!limiter.try_acquire_one());
    }

    #[test]
    fn test_catches_up_after_late_tick() {
        let (time, mut limiter) = limiter(1000);
        assert!(!limiter.try_acquire_one());

        time.advance(Duration::from_millis(5));
        let granted = (0..10).filter(|_| limiter.try_acquire_one()).count();
        assert_eq!(granted, 5);
    }

    #[test]
    fn test_release_makes_unit_available_again() {
        let (time, mut limiter) = limiter(10);
        limiter.try_acquire_one();
        time.advance(Duration::from_millis(100));

        assert!(limiter.try_acquire_one());
        assert_eq!(limiter.acquired(), 1);

        limiter.release_one();
        assert_eq!(limiter.acquired(), 0);

        assert!(limiter.try_acquire_one());
        assert!(!limiter.try_acquire_one());
    }

    #[test]
    fn test_release_without_acquire_is_ignored() {
        let (time, mut limiter) = limiter(10);
        limiter.release_one();
        limiter.release_one();
        assert_eq!(limiter.acquired(), 0);

        limiter.try_acquire_one();
        time.advance(Duration::from_millis(100));
        assert!(limiter.try_acquire_one());
        assert!(!limiter.try_acquire_one());
    }

    #[test]
    fn test_reset_restarts_pacing() {
        let (time, mut limiter) = limiter(10);
        limiter.try_acquire_one();
        time.advance(Duration::from_secs(1));
        assert!(limiter.try_acquire_one());

        limiter.reset();
        assert_eq!(limiter.acquired(), 0);
        assert!(!limiter.try_acquire_one());

        time.advance(Duration::from_millis(100));
        assert!(limiter.try_acquire_one());
    }

    #[test]
    fn test_zero_rate_never_grants() {
        let (time, mut limiter) = limiter(0);
        limiter.try_acquire_one();
        time.advance(Duration::from_secs(60));
        assert!(!limiter.try_acquire_one());
    }

    #[test]
    fn test_accounting_stays_within_bounds_for_random_call_sequences() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(2024);

        for _ in 0..50 {
            let (time, mut limiter) = limiter(rng.gen_range(1..5000));
            let mut held: u64 = 0;

            for _ in 0..2000 {
                match rng.gen_range(0..3) {
                    0 => time.advance(Duration::from_micros(rng.gen_range(0..2000))),
                    1 => {
                        if limiter.try_acquire_one() {
                            held += 1;
                        }
                    }
                    _ => {
                        limiter.release_one();
                        held = held.saturating_sub(1);
                    }
                }

                assert_eq!(limiter.acquired(), held);
                assert!(limiter.acquired() <= limiter.due());
            }
        }
    }
}
