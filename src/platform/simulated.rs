//! Simulated clock and platform for deterministic tests
//!
//! Time only advances when someone asks it to: either the test directly via
//! [`SimulatedTimeSource::advance`], or the sequencer while it idles through
//! a [`SimulatedPlatform`]. A run paced at 10 requests/second therefore
//! finishes in microseconds of wall time with exact, reproducible timing.

use super::{PlatformTiming, TimeSource};
use crate::util::fast_time::FastInstant;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Manually driven monotonic clock
#[derive(Debug, Default)]
pub struct SimulatedTimeSource {
    nanos: AtomicU64,
}

impl SimulatedTimeSource {
    /// Clock starting at t = 0
    pub fn new() -> Self {
        Self::default()
    }

    /// Clock starting at an arbitrary instant
    pub fn starting_at(start: FastInstant) -> Self {
        Self {
            nanos: AtomicU64::new(start.as_nanos()),
        }
    }

    /// Move the clock forward
    pub fn advance(&self, delta: Duration) {
        let delta = u64::try_from(delta.as_nanos()).unwrap_or(u64::MAX);
        self.nanos.fetch_add(delta, Ordering::SeqCst);
    }
}

impl TimeSource for SimulatedTimeSource {
    fn monotonic_now(&self) -> FastInstant {
        FastInstant::from_nanos(self.nanos.load(Ordering::SeqCst))
    }
}

/// Platform fake that advances a [`SimulatedTimeSource`]
///
/// Each yield moves the clock by a fixed step, each sleep by the requested
/// duration. Both also yield the real OS thread so that executors completing
/// requests on other threads keep making progress.
#[derive(Debug)]
pub struct SimulatedPlatform {
    time: Arc<SimulatedTimeSource>,
    yield_step: Duration,
    yields: AtomicU64,
    sleeps: AtomicU64,
}

impl SimulatedPlatform {
    pub fn new(time: Arc<SimulatedTimeSource>, yield_step: Duration) -> Self {
        Self {
            time,
            yield_step,
            yields: AtomicU64::new(0),
            sleeps: AtomicU64::new(0),
        }
    }

    /// Number of `yield_current_thread` calls so far
    pub fn yield_count(&self) -> u64 {
        self.yields.load(Ordering::Relaxed)
    }

    /// Number of `sleep` calls so far
    pub fn sleep_count(&self) -> u64 {
        self.sleeps.load(Ordering::Relaxed)
    }
}

impl PlatformTiming for SimulatedPlatform {
    fn yield_current_thread(&self) {
        self.yields.fetch_add(1, Ordering::Relaxed);
        self.time.advance(self.yield_step);
        std::thread::yield_now();
    }

    fn sleep(&self, duration: Duration) {
        self.sleeps.fetch_add(1, Ordering::Relaxed);
        self.time.advance(duration);
        std::thread::yield_now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simulated_time_advances_only_on_request() {
        let time = SimulatedTimeSource::new();
        assert_eq!(time.monotonic_now().as_nanos(), 0);
        assert_eq!(time.monotonic_now().as_nanos(), 0);

        time.advance(Duration::from_millis(3));
        assert_eq!(time.monotonic_now().as_nanos(), 3_000_000);
    }

    #[test]
    fn test_starting_at() {
        let time = SimulatedTimeSource::starting_at(FastInstant::from_nanos(42));
        assert_eq!(time.monotonic_now().as_nanos(), 42);
    }

    #[test]
    fn test_platform_sleep_advances_by_duration() {
        let time = Arc::new(SimulatedTimeSource::new());
        let platform = SimulatedPlatform::new(time.clone(), Duration::from_nanos(1));

        platform.sleep(Duration::from_millis(5));

        assert_eq!(time.monotonic_now().as_nanos(), 5_000_000);
        assert_eq!(platform.sleep_count(), 1);
    }
}
