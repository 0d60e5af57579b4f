//! Per-run named statistics
//!
//! A [`StatisticSink`] maps metric names to [`histogram::Statistic`]
//! accumulators. The sequencer writes to it from its own thread only; the
//! owning worker reads it back once the run has stopped, and the
//! coordinator merges sinks from all workers after every worker stopped.
//!
//! # Names recorded by the sequencer
//!
//! - [`SEQUENCER_CALLBACK`]: start attempt to completion delivery, in ns
//! - [`SEQUENCER_BLOCKING`]: time the loop was blocked by executor refusals, in ns
//! - [`REQUEST_LATENCY`]: latency reported by the executor, in ns (only when measured)
//!
//! # Example
//!
//! ```
//! use reqpulse::stats::StatisticSink;
//!
//! let mut worker_a = StatisticSink::new();
//! worker_a.record("request.latency", 1_000);
//!
//! let mut worker_b = StatisticSink::new();
//! worker_b.record("request.latency", 3_000);
//!
//! worker_a.merge(&worker_b).unwrap();
//! assert_eq!(worker_a.get("request.latency").unwrap().count(), 2);
//! ```

pub mod histogram;

use crate::Result;
use histogram::{Statistic, StatisticSummary};
use std::collections::BTreeMap;
use std::time::Duration;

pub const SEQUENCER_CALLBACK: &str = "sequencer.callback";
pub const SEQUENCER_BLOCKING: &str = "sequencer.blocking";
pub const REQUEST_LATENCY: &str = "request.latency";

/// Name to accumulator mapping; names are unique within a run
pub type StatisticMap = BTreeMap<String, Statistic>;

/// Write side of a run's statistics
#[derive(Debug, Clone, Default)]
pub struct StatisticSink {
    statistics: StatisticMap,
}

impl StatisticSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `sample` to the statistic called `name`, creating it on first use
    #[inline]
    pub fn record(&mut self, name: &str, sample: u64) {
        match self.statistics.get_mut(name) {
            Some(stat) => stat.record_value(sample),
            None => {
                let mut stat = Statistic::new();
                stat.record_value(sample);
                self.statistics.insert(name.to_string(), stat);
            }
        }
    }

    /// Add a duration sample (in nanoseconds) to `name`
    #[inline]
    pub fn record_duration(&mut self, name: &str, sample: Duration) {
        self.record(name, u64::try_from(sample.as_nanos()).unwrap_or(u64::MAX));
    }

    pub fn get(&self, name: &str) -> Option<&Statistic> {
        self.statistics.get(name)
    }

    /// Number of distinct statistics
    pub fn len(&self) -> usize {
        self.statistics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statistics.is_empty()
    }

    pub fn statistics(&self) -> &StatisticMap {
        &self.statistics
    }

    pub fn into_map(self) -> StatisticMap {
        self.statistics
    }

    /// Fold another sink in, merging statistics that share a name
    pub fn merge(&mut self, other: &StatisticSink) -> Result<()> {
        for (name, stat) in &other.statistics {
            match self.statistics.get_mut(name) {
                Some(existing) => existing.merge(stat)?,
                None => {
                    self.statistics.insert(name.clone(), stat.clone());
                }
            }
        }
        Ok(())
    }

    /// Serializable summaries keyed by name
    pub fn summaries(&self) -> BTreeMap<String, StatisticSummary> {
        self.statistics
            .iter()
            .map(|(name, stat)| (name.clone(), stat.summary()))
            .collect()
    }
}
