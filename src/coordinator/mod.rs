//! Coordinator module
//!
//! Runs one [`Worker`] per configured worker on its own OS thread and
//! aggregates the results once every worker has stopped.
//!
//! Workers never share mutable state while running. Statistics are merged
//! only after all worker threads have been joined, so the merged view is
//! always a complete, final snapshot.
//!
//! # Overall outcome
//!
//! The run as a whole is `Failed` if any worker failed, otherwise
//! `Cancelled` if any worker was cancelled, otherwise `Completed`.

use crate::config::factory;
use crate::config::RunConfig;
use crate::executor::RequestExecutor;
use crate::platform::affinity;
use crate::sequencer::TerminationReason;
use crate::stats::histogram::StatisticSummary;
use crate::stats::StatisticSink;
use crate::termination::RunProgress;
use crate::util::time::calculate_rate;
use crate::worker::{CancelRegistry, Worker, WorkerReport};
use crate::Result;
use anyhow::Context;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// Aggregated outcome of a multi-worker run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub reason: TerminationReason,
    /// Counters summed over workers; `elapsed` is the longest execution duration
    pub totals: RunProgress,
    /// Longest worker execution duration
    pub execution_duration: Duration,
    /// Sum of per-worker completion rates
    pub completions_per_second: f64,
    pub workers: Vec<WorkerReport>,
    /// Merged statistics summaries keyed by name
    pub statistics: BTreeMap<String, StatisticSummary>,
    #[serde(skip)]
    pub merged: StatisticSink,
}

impl RunReport {
    /// Aggregate worker reports; reports are ordered by worker id
    pub fn from_workers(mut workers: Vec<WorkerReport>) -> Result<Self> {
        workers.sort_by_key(|w| w.worker_id);

        let mut merged = StatisticSink::new();
        let mut totals = RunProgress::default();
        let mut execution_duration = Duration::ZERO;
        let mut completions_per_second = 0.0;

        for report in &workers {
            merged
                .merge(&report.statistics)
                .with_context(|| format!("Failed to merge statistics of worker {}", report.worker_id))?;
            totals.started += report.progress.started;
            totals.completed += report.progress.completed;
            totals.succeeded += report.progress.succeeded;
            totals.failed += report.progress.failed;
            totals.rejected += report.progress.rejected;
            execution_duration = execution_duration.max(report.execution_duration);
            completions_per_second += report.completions_per_second;
        }
        totals.elapsed = execution_duration;

        let reason = overall_reason(workers.iter().map(|w| w.reason));

        Ok(Self {
            reason,
            totals,
            execution_duration,
            completions_per_second,
            statistics: merged.summaries(),
            merged,
            workers,
        })
    }

    /// Completions over the longest execution duration
    pub fn overall_rate(&self) -> f64 {
        calculate_rate(self.totals.completed, self.execution_duration)
    }
}

fn overall_reason(reasons: impl IntoIterator<Item = TerminationReason>) -> TerminationReason {
    let mut overall = TerminationReason::Completed;
    for reason in reasons {
        match reason {
            TerminationReason::Failed => return TerminationReason::Failed,
            TerminationReason::Cancelled => overall = TerminationReason::Cancelled,
            TerminationReason::Completed => {}
        }
    }
    overall
}

/// Runs workers and merges their results
pub struct Coordinator {
    config: Arc<RunConfig>,
    cancel: CancelRegistry,
}

impl Coordinator {
    pub fn new(config: RunConfig) -> Self {
        Self {
            config: Arc::new(config),
            cancel: CancelRegistry::new(),
        }
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Registry that cancels every worker of this coordinator
    pub fn cancel_registry(&self) -> CancelRegistry {
        self.cancel.clone()
    }

    /// Run every worker against the simulated target
    pub fn run(&self) -> Result<RunReport> {
        let target = self.config.target.clone();
        self.run_with(|worker| factory::build_simulated_executor(&target, worker.seed()))
    }

    /// Run every worker against executors built by `make_executor`
    ///
    /// `make_executor` is called on the worker's own thread. If any worker
    /// fails to run, the others are cancelled and the first error is returned.
    pub fn run_with<F>(&self, make_executor: F) -> Result<RunReport>
    where
        F: Fn(&Worker) -> Result<Box<dyn RequestExecutor>> + Sync,
    {
        let workers = self.config.workers;
        affinity::warn_if_oversubscribed(workers);
        tracing::debug!(workers, "starting workers");

        let outcomes: Vec<Result<WorkerReport>> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..workers)
                .map(|id| {
                    let config = self.config.clone();
                    let cancel = &self.cancel;
                    let make_executor = &make_executor;
                    std::thread::Builder::new()
                        .name(format!("worker-{}", id))
                        .spawn_scoped(scope, move || {
                            let worker = Worker::new(id, config);
                            let result = make_executor(&worker).and_then(|executor| worker.run(executor, Some(cancel)));
                            if result.is_err() {
                                cancel.cancel_all();
                            }
                            result
                        })
                        .with_context(|| format!("Failed to spawn worker thread {}", id))
                })
                .collect();

            if handles.iter().any(|handle| handle.is_err()) {
                self.cancel.cancel_all();
            }

            handles
                .into_iter()
                .enumerate()
                .map(|(id, handle)| {
                    handle?
                        .join()
                        .unwrap_or_else(|_| Err(anyhow::anyhow!("Worker {} panicked", id)))
                })
                .collect()
        });

        let reports = outcomes.into_iter().collect::<Result<Vec<_>>>()?;
        let report = RunReport::from_workers(reports)?;

        tracing::debug!(
            reason = %report.reason,
            completed = report.totals.completed,
            failed = report.totals.failed,
            "all workers stopped"
        );
        Ok(report)
    }
}
