//! Worker: one paced run on one thread
//!
//! A [`Worker`] turns the shared [`RunConfig`] into its own rate limiter,
//! termination chains and sequencer options, drives a [`Sequencer`] over a
//! request executor, and hands back a [`WorkerReport`].
//!
//! # Isolation
//!
//! Workers share only the read-only configuration. Each one builds fresh
//! per-run state and owns its statistics; the coordinator merges reports
//! after every worker has stopped.
//!
//! # Seeding
//!
//! With `seed = Some(s)` in the configuration, worker `i` uses `s + i` for
//! its samplers and simulated target, so workers are reproducible without
//! producing identical streams.
//!
//! # Example
//!
//! ```
//! use reqpulse::config::RunConfig;
//! use reqpulse::executor::MockExecutor;
//! use reqpulse::sequencer::TerminationReason;
//! use reqpulse::termination::predicates::ProgressCounter;
//! use reqpulse::worker::Worker;
//! use std::sync::Arc;
//!
//! let mut config = RunConfig::default();
//! config.termination_predicates.insert(ProgressCounter::Completed, 20);
//!
//! let worker = Worker::new(0, Arc::new(config));
//! let report = worker.run(Box::new(MockExecutor::new()), None)?;
//!
//! assert_eq!(report.reason, TerminationReason::Completed);
//! assert_eq!(report.progress.completed, 20);
//! # Ok::<(), anyhow::Error>(())
//! ```

use crate::config::factory;
use crate::config::RunConfig;
use crate::executor::RequestExecutor;
use crate::platform::{PlatformTiming, SystemPlatform, SystemTimeSource, TimeSource};
use crate::sequencer::{CancelHandle, Sequencer, TerminationReason};
use crate::stats::StatisticSink;
use crate::termination::RunProgress;
use crate::Result;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Outcome of one worker's run
#[derive(Debug, Clone, Serialize)]
pub struct WorkerReport {
    pub worker_id: usize,
    pub reason: TerminationReason,
    /// Final counters; `elapsed` equals `execution_duration`
    pub progress: RunProgress,
    /// Start until the terminal condition fired
    pub execution_duration: Duration,
    pub completions_per_second: f64,
    #[serde(skip)]
    pub statistics: StatisticSink,
}

/// Cancels every registered run, including runs registered after the fact
///
/// Shared between the coordinator and its workers.
#[derive(Debug, Clone, Default)]
pub struct CancelRegistry {
    inner: Arc<CancelRegistryInner>,
}

#[derive(Debug, Default)]
struct CancelRegistryInner {
    cancelled: AtomicBool,
    handles: Mutex<Vec<CancelHandle>>,
}

impl CancelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a run; cancels it immediately if the registry was already cancelled
    pub fn register(&self, handle: CancelHandle) {
        if let Ok(mut handles) = self.inner.handles.lock() {
            handles.push(handle.clone());
        }
        if self.is_cancelled() {
            handle.cancel();
        }
    }

    /// Cancel every tracked run; idempotent
    pub fn cancel_all(&self) {
        self.inner.cancelled.store(true, Ordering::Release);
        if let Ok(handles) = self.inner.handles.lock() {
            for handle in handles.iter() {
                handle.cancel();
            }
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }
}

/// Runs one sequencer built from shared configuration
pub struct Worker {
    id: usize,
    config: Arc<RunConfig>,
    time: Arc<dyn TimeSource>,
    platform: Arc<dyn PlatformTiming>,
}

impl Worker {
    /// Worker `id` on the system clock and scheduler
    pub fn new(id: usize, config: Arc<RunConfig>) -> Self {
        Self {
            id,
            config,
            time: Arc::new(SystemTimeSource),
            platform: Arc::new(SystemPlatform),
        }
    }

    /// Replace the clock and scheduler for the limiter and the sequencer
    pub fn with_timing(mut self, time: Arc<dyn TimeSource>, platform: Arc<dyn PlatformTiming>) -> Self {
        self.time = time;
        self.platform = platform;
        self
    }

    pub fn id(&self) -> usize {
        self.id
    }

    /// Seed for this worker's random sources
    pub fn seed(&self) -> Option<u64> {
        self.config.seed.map(|seed| seed.wrapping_add(self.id as u64))
    }

    /// Build an idle sequencer over `executor`
    pub fn build_sequencer(&self, executor: Box<dyn RequestExecutor>) -> Sequencer {
        let limiter = factory::build_rate_limiter(&self.config, self.time.clone(), self.seed());
        Sequencer::new(
            limiter,
            executor,
            factory::build_completion_chain(&self.config),
            factory::build_failure_chain(&self.config),
            factory::build_sequencer_options(&self.config, self.id),
        )
        .with_timing(self.time.clone(), self.platform.clone())
    }

    /// Run to completion against `executor`
    ///
    /// Blocks the calling thread until the sequencer has stopped.
    pub fn run(&self, executor: Box<dyn RequestExecutor>, cancel: Option<&CancelRegistry>) -> Result<WorkerReport> {
        let mut sequencer = self.build_sequencer(executor);
        if let Some(registry) = cancel {
            registry.register(sequencer.cancel_handle());
        }

        sequencer.start()?;
        let reason = sequencer.wait_for_completion()?;

        let progress = sequencer.progress();
        tracing::debug!(
            worker_id = self.id,
            %reason,
            started = progress.started,
            completed = progress.completed,
            failed = progress.failed,
            rejected = progress.rejected,
            "worker finished"
        );

        Ok(WorkerReport {
            worker_id: self.id,
            reason,
            progress,
            execution_duration: sequencer.execution_duration(),
            completions_per_second: sequencer.completions_per_second(),
            statistics: sequencer.statistic_sink(),
        })
    }
}
