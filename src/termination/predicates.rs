//! Built-in termination predicates

use super::{RunProgress, TerminationPredicate, TerminationStatus};
use crate::executor::CompletionRecord;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;

/// Terminates once the run has lasted `duration`
///
/// Depends only on elapsed time, so it fires even if no request ever completes.
#[derive(Debug, Clone)]
pub struct DurationPredicate {
    duration: Duration,
}

impl DurationPredicate {
    pub fn new(duration: Duration) -> Self {
        Self { duration }
    }
}

impl TerminationPredicate for DurationPredicate {
    #[inline]
    fn evaluate(&mut self, progress: &RunProgress) -> TerminationStatus {
        if progress.elapsed >= self.duration {
            TerminationStatus::Terminate
        } else {
            TerminationStatus::Proceed
        }
    }

    fn name(&self) -> &str {
        "duration"
    }
}

/// Counter of [`RunProgress`] a predicate can watch
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ProgressCounter {
    Started,
    Completed,
    Succeeded,
    Failed,
    Rejected,
}

impl ProgressCounter {
    /// Read this counter from a progress snapshot
    #[inline]
    pub fn read(&self, progress: &RunProgress) -> u64 {
        match self {
            ProgressCounter::Started => progress.started,
            ProgressCounter::Completed => progress.completed,
            ProgressCounter::Succeeded => progress.succeeded,
            ProgressCounter::Failed => progress.failed,
            ProgressCounter::Rejected => progress.rejected,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProgressCounter::Started => "started",
            ProgressCounter::Completed => "completed",
            ProgressCounter::Succeeded => "succeeded",
            ProgressCounter::Failed => "failed",
            ProgressCounter::Rejected => "rejected",
        }
    }
}

impl fmt::Display for ProgressCounter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminates once a progress counter reaches a threshold
#[derive(Debug, Clone)]
pub struct CounterThresholdPredicate {
    counter: ProgressCounter,
    threshold: u64,
    name: String,
}

impl CounterThresholdPredicate {
    pub fn new(counter: ProgressCounter, threshold: u64) -> Self {
        Self {
            counter,
            threshold,
            name: format!("{}>={}", counter, threshold),
        }
    }
}

impl TerminationPredicate for CounterThresholdPredicate {
    #[inline]
    fn evaluate(&mut self, progress: &RunProgress) -> TerminationStatus {
        if self.counter.read(progress) >= self.threshold {
            TerminationStatus::Terminate
        } else {
            TerminationStatus::Proceed
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Terminates when the failure ratio over the last `window` completions reaches `threshold`
///
/// Nothing fires until `window` completions have been observed, so a single
/// early failure cannot end a run. Once the window is full, every new record
/// pushes the oldest one out.
#[derive(Debug, Clone)]
pub struct FailureRatioPredicate {
    threshold: f64,
    window: usize,
    recent: VecDeque<bool>,
    failures: usize,
}

impl FailureRatioPredicate {
    /// `window` of 0 is treated as 1
    pub fn new(threshold: f64, window: usize) -> Self {
        let window = window.max(1);
        Self {
            threshold,
            window,
            recent: VecDeque::with_capacity(window),
            failures: 0,
        }
    }

    /// Failure ratio over the records currently in the window
    pub fn ratio(&self) -> f64 {
        if self.recent.is_empty() {
            0.0
        } else {
            self.failures as f64 / self.recent.len() as f64
        }
    }
}

impl TerminationPredicate for FailureRatioPredicate {
    fn evaluate(&mut self, _progress: &RunProgress) -> TerminationStatus {
        if self.recent.len() == self.window && self.ratio() >= self.threshold {
            TerminationStatus::Terminate
        } else {
            TerminationStatus::Proceed
        }
    }

    fn observe(&mut self, record: &CompletionRecord) {
        if self.recent.len() == self.window {
            if let Some(false) = self.recent.pop_front() {
                self.failures -= 1;
            }
        }
        self.recent.push_back(record.success);
        if !record.success {
            self.failures += 1;
        }
    }

    fn name(&self) -> &str {
        "failure_ratio"
    }
}
