//! Time and scheduling abstractions
//!
//! The sequencer never touches the OS clock or scheduler directly. Both are
//! injected so that tests can substitute a simulated clock that only moves
//! when the sequencer idles, which makes pacing runs fully deterministic.
//!
//! - [`TimeSource`]: monotonic "now"
//! - [`PlatformTiming`]: cooperative yield and best-effort sleep
//! - [`IdleStrategy`]: how the tick loop backs off when pacing denies a request

pub mod affinity;
pub mod simulated;

use crate::util::fast_time::FastInstant;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

pub use simulated::{SimulatedPlatform, SimulatedTimeSource};

/// Source of monotonic time
pub trait TimeSource: Send + Sync {
    /// Current monotonic instant
    fn monotonic_now(&self) -> FastInstant;
}

/// Time source backed by `CLOCK_MONOTONIC`
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    #[inline(always)]
    fn monotonic_now(&self) -> FastInstant {
        FastInstant::now()
    }
}

/// Low-level yield and sleep
///
/// `yield_current_thread` is used inside busy-wait loops and has no duration
/// guarantee. `sleep` is only used where sub-tick precision does not matter,
/// such as polling for in-flight requests during drain.
pub trait PlatformTiming: Send + Sync {
    fn yield_current_thread(&self);
    fn sleep(&self, duration: Duration);
}

/// Platform timing backed by the OS scheduler
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemPlatform;

impl PlatformTiming for SystemPlatform {
    #[inline]
    fn yield_current_thread(&self) {
        std::thread::yield_now();
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Sleep period used by [`IdleStrategy::Sleep`]
pub const SLEEP_IDLE_PERIOD: Duration = Duration::from_micros(50);

/// Back-off behaviour of the tick loop while pacing denies a request
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum IdleStrategy {
    /// Busy-spin with a CPU hint. Lowest jitter, burns a core.
    Spin,
    /// Yield the thread to the scheduler between ticks.
    #[default]
    Poll,
    /// Sleep for [`SLEEP_IDLE_PERIOD`] between ticks. Cheapest, least precise.
    Sleep,
}

impl IdleStrategy {
    /// Back off once
    #[inline]
    pub fn idle(&self, platform: &dyn PlatformTiming) {
        match self {
            IdleStrategy::Spin => std::hint::spin_loop(),
            IdleStrategy::Poll => platform.yield_current_thread(),
            IdleStrategy::Sleep => platform.sleep(SLEEP_IDLE_PERIOD),
        }
    }
}

impl fmt::Display for IdleStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdleStrategy::Spin => write!(f, "spin"),
            IdleStrategy::Poll => write!(f, "poll"),
            IdleStrategy::Sleep => write!(f, "sleep"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_system_time_source_is_monotonic() {
        let source = SystemTimeSource;
        let a = source.monotonic_now();
        let b = source.monotonic_now();
        assert!(b >= a);
    }

    #[test]
    fn test_poll_strategy_yields() {
        let time = Arc::new(SimulatedTimeSource::new());
        let platform = SimulatedPlatform::new(time.clone(), Duration::from_micros(10));

        IdleStrategy::Poll.idle(&platform);
        IdleStrategy::Poll.idle(&platform);

        assert_eq!(platform.yield_count(), 2);
        assert_eq!(platform.sleep_count(), 0);
        assert_eq!(time.monotonic_now().as_nanos(), 20_000);
    }

    #[test]
    fn test_sleep_strategy_sleeps() {
        let time = Arc::new(SimulatedTimeSource::new());
        let platform = SimulatedPlatform::new(time.clone(), Duration::from_micros(10));

        IdleStrategy::Sleep.idle(&platform);

        assert_eq!(platform.yield_count(), 0);
        assert_eq!(platform.sleep_count(), 1);
        assert_eq!(time.monotonic_now().as_nanos(), SLEEP_IDLE_PERIOD.as_nanos() as u64);
    }

    #[test]
    fn test_spin_strategy_touches_nothing() {
        let time = Arc::new(SimulatedTimeSource::new());
        let platform = SimulatedPlatform::new(time.clone(), Duration::from_micros(10));

        IdleStrategy::Spin.idle(&platform);

        assert_eq!(platform.yield_count(), 0);
        assert_eq!(platform.sleep_count(), 0);
    }

    #[test]
    fn test_idle_strategy_serde() {
        let parsed: IdleStrategy = serde_json::from_str("\"sleep\"").unwrap();
        assert_eq!(parsed, IdleStrategy::Sleep);
        assert_eq!(IdleStrategy::default(), IdleStrategy::Poll);
        assert_eq!(IdleStrategy::Spin.to_string(), "spin");
    }
}
