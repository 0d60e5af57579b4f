//! Rate and duration helpers
//!
//! Used by the sequencer to derive completions-per-second and by the report
//! writers to print run summaries.

use std::time::Duration;

/// Duration units from largest to smallest, as (nanoseconds per unit, suffix)
const DURATION_UNITS: [(f64, &str); 3] = [(1e9, "s"), (1e6, "ms"), (1e3, "us")];

/// Rate units from largest to smallest, as (events per unit, suffix)
const RATE_UNITS: [(f64, &str); 3] = [(1e9, "G"), (1e6, "M"), (1e3, "K")];

/// Format a duration with the largest unit that keeps the value >= 1
///
/// Sub-microsecond values print as whole nanoseconds.
///
/// ```
/// use std::time::Duration;
/// use reqpulse::util::time::format_duration;
///
/// assert_eq!(format_duration(Duration::from_nanos(500)), "500ns");
/// assert_eq!(format_duration(Duration::from_micros(2500)), "2.50ms");
/// ```
pub fn format_duration(duration: Duration) -> String {
    let nanos = duration.as_nanos() as f64;
    scaled(nanos, &DURATION_UNITS).unwrap_or_else(|| format!("{}ns", duration.as_nanos()))
}

/// Format a per-second rate with a K/M/G suffix above one thousand
///
/// ```
/// use reqpulse::util::time::format_rate;
///
/// assert_eq!(format_rate(12.4), "12");
/// assert_eq!(format_rate(2_500_000.0), "2.50M");
/// ```
pub fn format_rate(rate: f64) -> String {
    scaled(rate, &RATE_UNITS).unwrap_or_else(|| format!("{:.0}", rate))
}

fn scaled(value: f64, units: &[(f64, &str)]) -> Option<String> {
    units
        .iter()
        .find(|(scale, _)| value >= *scale)
        .map(|(scale, suffix)| format!("{:.2}{}", value / scale, suffix))
}

/// Events per second over `duration`; 0.0 when no time has passed
pub fn calculate_rate(events: u64, duration: Duration) -> f64 {
    match duration.as_secs_f64() {
        secs if secs > 0.0 => events as f64 / secs,
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration_unit_boundaries() {
        assert_eq!(format_duration(Duration::ZERO), "0ns");
        assert_eq!(format_duration(Duration::from_nanos(999)), "999ns");
        assert_eq!(format_duration(Duration::from_nanos(1_000)), "1.00us");
        assert_eq!(format_duration(Duration::from_micros(250)), "250.00us");
        assert_eq!(format_duration(Duration::from_millis(1)), "1.00ms");
        assert_eq!(format_duration(Duration::from_millis(1_500)), "1.50s");
        assert_eq!(format_duration(Duration::from_secs(90)), "90.00s");
    }

    #[test]
    fn test_rate_suffixes() {
        assert_eq!(format_rate(0.0), "0");
        assert_eq!(format_rate(999.0), "999");
        assert_eq!(format_rate(1_000.0), "1.00K");
        assert_eq!(format_rate(1_500.0), "1.50K");
        assert_eq!(format_rate(3_000_000_000.0), "3.00G");
    }

    #[test]
    fn test_rate_over_execution_time() {
        assert_eq!(calculate_rate(10, Duration::from_millis(500)), 20.0);
        assert_eq!(calculate_rate(0, Duration::from_secs(3)), 0.0);
        assert_eq!(calculate_rate(1_000, Duration::ZERO), 0.0);
    }
}
