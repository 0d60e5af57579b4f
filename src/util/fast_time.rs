//! Monotonic instants read straight from `clock_gettime`
//!
//! The sequencer and the linear limiter read the clock on every tick. An
//! instant is a plain nanosecond count, so simulated time sources can mint
//! them without touching the system clock.

use std::time::Duration;

/// Monotonic timestamp in nanoseconds (`CLOCK_MONOTONIC`)
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FastInstant {
    nanos: u64,
}

impl FastInstant {
    /// Read `CLOCK_MONOTONIC`
    #[inline(always)]
    pub fn now() -> Self {
        let mut ts = libc::timespec { tv_sec: 0, tv_nsec: 0 };

        // SAFETY: `ts` is a valid, writable timespec and CLOCK_MONOTONIC is always supported on Linux
        unsafe {
            libc::clock_gettime(libc::CLOCK_MONOTONIC, &mut ts);
        }

        Self::from_nanos((ts.tv_sec as u64) * 1_000_000_000 + ts.tv_nsec as u64)
    }

    #[inline(always)]
    pub const fn from_nanos(nanos: u64) -> Self {
        Self { nanos }
    }

    #[inline(always)]
    pub const fn as_nanos(&self) -> u64 {
        self.nanos
    }

    /// Time from `earlier` to `self`; zero if `earlier` is in fact later
    #[inline(always)]
    pub fn duration_since(&self, earlier: FastInstant) -> Duration {
        Duration::from_nanos(self.nanos.saturating_sub(earlier.nanos))
    }

    /// `self + delta`, pinned at the largest representable instant
    #[inline(always)]
    pub fn saturating_add(&self, delta: Duration) -> FastInstant {
        let delta = u64::try_from(delta.as_nanos()).unwrap_or(u64::MAX);
        Self::from_nanos(self.nanos.saturating_add(delta))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_follows_sleep() {
        let before = FastInstant::now();
        std::thread::sleep(Duration::from_millis(5));
        let after = FastInstant::now();

        assert!(after > before);
        assert!(after.duration_since(before) >= Duration::from_millis(5));
    }

    #[test]
    fn test_duration_since_saturates() {
        let early = FastInstant::from_nanos(100);
        let late = FastInstant::from_nanos(500);

        assert_eq!(late.duration_since(early), Duration::from_nanos(400));
        assert_eq!(early.duration_since(late), Duration::ZERO);
    }

    #[test]
    fn test_saturating_add() {
        let t = FastInstant::from_nanos(1_000);
        assert_eq!(t.saturating_add(Duration::from_micros(1)).as_nanos(), 2_000);
        assert_eq!(
            FastInstant::from_nanos(u64::MAX).saturating_add(Duration::from_secs(1)),
            FastInstant::from_nanos(u64::MAX)
        );
    }
}
