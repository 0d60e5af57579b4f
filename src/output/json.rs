//! JSON output formatting
//!
//! Durations carry both a machine value and a human-readable string:
//!
//! ```json
//! { "micros": 1500, "human": "1.50ms" }
//! ```

use crate::coordinator::RunReport;
use crate::sequencer::TerminationReason;
use crate::stats::histogram::StatisticSummary;
use crate::termination::RunProgress;
use crate::util::time::format_duration;
use crate::Result;
use anyhow::Context;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;
use std::time::Duration;

/// Duration with both microseconds and human-readable format
#[derive(Debug, Clone, Serialize)]
pub struct JsonDuration {
    pub micros: u64,
    pub human: String,
}

impl JsonDuration {
    pub fn from_duration(d: Duration) -> Self {
        Self {
            micros: d.as_micros() as u64,
            human: format_duration(d),
        }
    }

    pub fn from_nanos(nanos: u64) -> Self {
        Self::from_duration(Duration::from_nanos(nanos))
    }
}

/// Percentile summary of one statistic
#[derive(Debug, Clone, Serialize)]
pub struct JsonStatistic {
    pub count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<JsonDuration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mean: Option<JsonDuration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<JsonDuration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pstdev: Option<JsonDuration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub p50: Option<JsonDuration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub p90: Option<JsonDuration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub p99: Option<JsonDuration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub p99_9: Option<JsonDuration>,
}

impl From<&StatisticSummary> for JsonStatistic {
    fn from(summary: &StatisticSummary) -> Self {
        let value = |nanos: u64| (summary.count > 0).then(|| JsonDuration::from_nanos(nanos));
        Self {
            count: summary.count,
            min: value(summary.min),
            mean: value(summary.mean as u64),
            max: value(summary.max),
            pstdev: value(summary.pstdev as u64),
            p50: value(summary.p50),
            p90: value(summary.p90),
            p99: value(summary.p99),
            p99_9: value(summary.p999),
        }
    }
}

/// One worker's entry
#[derive(Debug, Clone, Serialize)]
pub struct JsonWorker {
    pub worker_id: usize,
    pub reason: TerminationReason,
    pub progress: JsonProgress,
    pub execution_duration: JsonDuration,
    pub completions_per_second: f64,
}

/// Counters of a run
#[derive(Debug, Clone, Serialize)]
pub struct JsonProgress {
    pub started: u64,
    pub completed: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub rejected: u64,
}

impl From<&RunProgress> for JsonProgress {
    fn from(p: &RunProgress) -> Self {
        Self {
            started: p.started,
            completed: p.completed,
            succeeded: p.succeeded,
            failed: p.failed,
            rejected: p.rejected,
        }
    }
}

/// Complete JSON document for a run
#[derive(Debug, Clone, Serialize)]
pub struct JsonReport {
    pub version: String,
    pub reason: TerminationReason,
    pub execution_duration: JsonDuration,
    pub completions_per_second: f64,
    pub totals: JsonProgress,
    pub statistics: BTreeMap<String, JsonStatistic>,
    pub workers: Vec<JsonWorker>,
}

impl From<&RunReport> for JsonReport {
    fn from(report: &RunReport) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            reason: report.reason,
            execution_duration: JsonDuration::from_duration(report.execution_duration),
            completions_per_second: report.completions_per_second,
            totals: JsonProgress::from(&report.totals),
            statistics: report
                .statistics
                .iter()
                .map(|(name, summary)| (name.clone(), JsonStatistic::from(summary)))
                .collect(),
            workers: report
                .workers
                .iter()
                .map(|w| JsonWorker {
                    worker_id: w.worker_id,
                    reason: w.reason,
                    progress: JsonProgress::from(&w.progress),
                    execution_duration: JsonDuration::from_duration(w.execution_duration),
                    completions_per_second: w.completions_per_second,
                })
                .collect(),
        }
    }
}

/// Serialize a report as pretty-printed JSON
pub fn report_to_string(report: &RunReport) -> Result<String> {
    serde_json::to_string_pretty(&JsonReport::from(report)).context("Failed to serialize report")
}

/// Write a report as pretty-printed JSON to `path`
pub fn write_report(report: &RunReport, path: &Path) -> Result<()> {
    let file = File::create(path).with_context(|| format!("Failed to create JSON output file: {}", path.display()))?;
    serde_json::to_writer_pretty(file, &JsonReport::from(report))
        .with_context(|| format!("Failed to write JSON output: {}", path.display()))?;
    Ok(())
}
