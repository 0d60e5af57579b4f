//! Value accumulator using HdrHistogram
//!
//! Every named statistic of a run is a [`Statistic`]: an HdrHistogram of
//! non-negative integer samples (nanoseconds for latencies) that answers
//! count, mean, standard deviation, extremes and percentiles, and can be
//! merged with the same statistic from another worker.
//!
//! # Example
//!
//! ```
//! use reqpulse::stats::histogram::Statistic;
//! use std::time::Duration;
//!
//! let mut stat = Statistic::new();
//! stat.record(Duration::from_micros(100));
//! stat.record(Duration::from_micros(200));
//!
//! assert_eq!(stat.count(), 2);
//! assert!(stat.percentile(50.0).is_some());
//! ```

use crate::Result;
use hdrhistogram::Histogram;
use serde::Serialize;
use std::time::Duration;

/// Largest trackable value: one hour in nanoseconds
const MAX_TRACKABLE: u64 = 3_600_000_000_000;

/// Histogram-backed accumulator
///
/// Tracks values from 1 to 3,600,000,000,000 (one hour of nanoseconds) with
/// 3 significant digits, so every answer is within 0.1% of the exact value.
/// Out-of-range samples are clamped. Zero is recorded as 1.
#[derive(Debug, Clone)]
pub struct Statistic {
    histogram: Histogram<u64>,
}

impl Statistic {
    pub fn new() -> Self {
        let histogram = Histogram::new_with_bounds(1, MAX_TRACKABLE, 3)
            .expect("Failed to create histogram with valid bounds");

        Self { histogram }
    }

    /// Record a raw sample
    #[inline]
    pub fn record_value(&mut self, value: u64) {
        let value = value.clamp(1, MAX_TRACKABLE);
        let _ = self.histogram.record(value);
    }

    /// Record a duration as nanoseconds
    #[inline]
    pub fn record(&mut self, latency: Duration) {
        let nanos = u64::try_from(latency.as_nanos()).unwrap_or(u64::MAX);
        self.record_value(nanos);
    }

    /// Number of samples recorded
    pub fn count(&self) -> u64 {
        self.histogram.len()
    }

    pub fn is_empty(&self) -> bool {
        self.histogram.len() == 0
    }

    /// Mean of recorded samples, or None if empty
    pub fn mean(&self) -> Option<f64> {
        if self.is_empty() {
            return None;
        }
        Some(self.histogram.mean())
    }

    /// Population standard deviation, or None if empty
    pub fn pstdev(&self) -> Option<f64> {
        if self.is_empty() {
            return None;
        }
        Some(self.histogram.stdev())
    }

    pub fn min(&self) -> Option<u64> {
        if self.is_empty() {
            return None;
        }
        Some(self.histogram.min())
    }

    pub fn max(&self) -> Option<u64> {
        if self.is_empty() {
            return None;
        }
        Some(self.histogram.max())
    }

    /// Value at `percentile` (0.0 - 100.0), or None if empty
    pub fn percentile(&self, percentile: f64) -> Option<u64> {
        if self.is_empty() {
            return None;
        }
        Some(self.histogram.value_at_percentile(percentile))
    }

    /// Fold another statistic's samples into this one
    pub fn merge(&mut self, other: &Statistic) -> Result<()> {
        self.histogram
            .add(&other.histogram)
            .map_err(|e| anyhow::anyhow!("Failed to merge histograms: {}", e))?;
        Ok(())
    }

    pub fn reset(&mut self) {
        self.histogram.reset();
    }

    /// Condensed, serializable view
    pub fn summary(&self) -> StatisticSummary {
        StatisticSummary {
            count: self.count(),
            mean: self.mean().unwrap_or(0.0),
            pstdev: self.pstdev().unwrap_or(0.0),
            min: self.min().unwrap_or(0),
            max: self.max().unwrap_or(0),
            p50: self.percentile(50.0).unwrap_or(0),
            p90: self.percentile(90.0).unwrap_or(0),
            p99: self.percentile(99.0).unwrap_or(0),
            p999: self.percentile(99.9).unwrap_or(0),
        }
    }
}

impl Default for Statistic {
    fn default() -> Self {
        Self::new()
    }
}

/// Summary of a [`Statistic`]; empty statistics summarize to zeros
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StatisticSummary {
    pub count: u64,
    pub mean: f64,
    pub pstdev: f64,
    pub min: u64,
    pub max: u64,
    pub p50: u64,
    pub p90: u64,
    pub p99: u64,
    pub p999: u64,
}
