//! Request pacing loop
//!
//! The [`Sequencer`] ties a [`RateLimiter`], two [`TerminationChain`]s and a
//! [`RequestExecutor`] together and owns the lifecycle of one run:
//!
//! ```text
//! Idle --start()--> Running --terminal condition / cancel()--> Draining --> Stopped
//! ```
//!
//! # Tick loop
//!
//! `start` spawns a dedicated thread that repeats, until a terminal
//! condition is met:
//!
//! 1. Fold in completion records delivered since the last tick
//! 2. Stop as `Cancelled` if cancellation was requested
//! 3. Evaluate the completion chain and the failure chain (both, every tick)
//! 4. In closed-loop mode, back off while `concurrency` requests are in flight
//! 5. Ask the rate limiter for one unit; back off if denied
//! 6. Try to start a request; if the executor refuses, release the unit,
//!    count a rejection and back off
//!
//! Back-off goes through the configured [`IdleStrategy`] and the injected
//! [`PlatformTiming`], never a hard sleep on the pacing path.
//!
//! # Completions
//!
//! Executors may invoke completion callbacks from any thread. Callbacks only
//! push the record onto a channel; counters, statistics and predicate state
//! are updated exclusively by the loop thread when it drains that channel.
//!
//! # Drain
//!
//! Once a chain fires (or on cancel) no new attempts are made. The loop keeps
//! collecting completions until nothing is in flight or the drain timeout
//! passes, then calls [`RequestExecutor::terminate`] and collects whatever the
//! executor delivers while terminating.
//!
//! # Example
//!
//! ```
//! use reqpulse::executor::MockExecutor;
//! use reqpulse::rate_limiter::UnlimitedRateLimiter;
//! use reqpulse::sequencer::{Sequencer, SequencerOptions, TerminationReason};
//! use reqpulse::termination::TerminationChain;
//! use reqpulse::termination::predicates::{CounterThresholdPredicate, ProgressCounter};
//!
//! let mut completion = TerminationChain::new();
//! completion.link(Box::new(CounterThresholdPredicate::new(ProgressCounter::Completed, 10)));
//!
//! let mut sequencer = Sequencer::new(
//!     Box::new(UnlimitedRateLimiter),
//!     Box::new(MockExecutor::new()),
//!     completion,
//!     TerminationChain::new(),
//!     SequencerOptions::default(),
//! );
//!
//! sequencer.start()?;
//! assert_eq!(sequencer.wait_for_completion()?, TerminationReason::Completed);
//! assert_eq!(sequencer.progress().completed, 10);
//! # Ok::<(), anyhow::Error>(())
//! ```

use crate::error::SequencerError;
use crate::executor::{CompletionCallback, CompletionRecord, RequestExecutor};
use crate::platform::{affinity, IdleStrategy, PlatformTiming, SystemPlatform, SystemTimeSource, TimeSource};
use crate::rate_limiter::RateLimiter;
use crate::stats::{StatisticMap, StatisticSink, REQUEST_LATENCY, SEQUENCER_BLOCKING, SEQUENCER_CALLBACK};
use crate::termination::{RunProgress, TerminationChain, TerminationStatus};
use crate::util::fast_time::FastInstant;
use crate::util::time::calculate_rate;
use crate::Result;
use anyhow::Context;
use crossbeam::channel::{self, Receiver, Sender};
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::Duration;

/// Drain timeout used when none is configured
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Poll period while waiting for in-flight requests during drain
const DRAIN_POLL_PERIOD: Duration = Duration::from_millis(1);

/// Lifecycle state of a [`Sequencer`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SequencerState {
    Idle,
    Running,
    Draining,
    Stopped,
}

impl SequencerState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => SequencerState::Idle,
            1 => SequencerState::Running,
            2 => SequencerState::Draining,
            _ => SequencerState::Stopped,
        }
    }
}

impl fmt::Display for SequencerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SequencerState::Idle => write!(f, "idle"),
            SequencerState::Running => write!(f, "running"),
            SequencerState::Draining => write!(f, "draining"),
            SequencerState::Stopped => write!(f, "stopped"),
        }
    }
}

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TerminationReason {
    /// The completion chain fired
    Completed,
    /// The failure chain fired (takes precedence if both fire on the same tick)
    Failed,
    /// `cancel()` was called
    Cancelled,
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TerminationReason::Completed => write!(f, "completed"),
            TerminationReason::Failed => write!(f, "failed"),
            TerminationReason::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Run parameters consumed at construction
#[derive(Debug, Clone)]
pub struct SequencerOptions {
    /// Pace purely by the rate limiter, ignoring in-flight requests
    pub open_loop: bool,
    /// Closed-loop ceiling on in-flight requests
    pub concurrency: u64,
    /// Back-off used while pacing denies a request
    pub idle_strategy: IdleStrategy,
    /// Upper bound on the time spent waiting for in-flight requests after termination
    pub drain_timeout: Duration,
    /// Ask the executor for per-request latencies
    pub measure_latencies: bool,
    /// Pin the loop thread to this CPU core
    pub cpu_core: Option<usize>,
}

impl Default for SequencerOptions {
    fn default() -> Self {
        Self {
            open_loop: false,
            concurrency: 1,
            idle_strategy: IdleStrategy::default(),
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
            measure_latencies: false,
            cpu_core: None,
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// State visible to both the loop thread and the owning handle
struct Shared {
    state: AtomicU8,
    cancelled: AtomicBool,
    progress: Mutex<RunProgress>,
    execution_duration: Mutex<Option<Duration>>,
    statistics: Mutex<StatisticSink>,
}

impl Shared {
    fn new() -> Self {
        Self {
            state: AtomicU8::new(SequencerState::Idle as u8),
            cancelled: AtomicBool::new(false),
            progress: Mutex::new(RunProgress::default()),
            execution_duration: Mutex::new(None),
            statistics: Mutex::new(StatisticSink::new()),
        }
    }

    fn state(&self) -> SequencerState {
        SequencerState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: SequencerState) {
        self.state.store(state as u8, Ordering::Release);
    }

    fn request_cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
        let _ = self.state.compare_exchange(
            SequencerState::Running as u8,
            SequencerState::Draining as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// Cloneable handle that cancels a run from another thread
#[derive(Clone)]
pub struct CancelHandle {
    shared: Arc<Shared>,
}

impl CancelHandle {
    /// Request a cooperative stop; idempotent
    pub fn cancel(&self) {
        self.shared.request_cancel();
    }
}

impl fmt::Debug for CancelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelHandle")
            .field("cancelled", &self.shared.is_cancelled())
            .finish()
    }
}

/// Components moved onto the loop thread by `start`
struct RunParts {
    limiter: Box<dyn RateLimiter>,
    executor: Box<dyn RequestExecutor>,
    completion_chain: TerminationChain,
    failure_chain: TerminationChain,
}

/// Drives one run
///
/// Each sequencer owns its limiter, chains, executor and statistics; nothing
/// is shared with other sequencers.
pub struct Sequencer {
    options: SequencerOptions,
    time: Arc<dyn TimeSource>,
    platform: Arc<dyn PlatformTiming>,
    parts: Option<RunParts>,
    shared: Arc<Shared>,
    started_at: Option<FastInstant>,
    handle: Option<JoinHandle<TerminationReason>>,
    reason: Option<TerminationReason>,
    loop_panicked: bool,
}

impl Sequencer {
    /// Create an idle sequencer using the system clock and scheduler
    pub fn new(
        limiter: Box<dyn RateLimiter>,
        executor: Box<dyn RequestExecutor>,
        completion_chain: TerminationChain,
        failure_chain: TerminationChain,
        options: SequencerOptions,
    ) -> Self {
        Self {
            options,
            time: Arc::new(SystemTimeSource),
            platform: Arc::new(SystemPlatform),
            parts: Some(RunParts {
                limiter,
                executor,
                completion_chain,
                failure_chain,
            }),
            shared: Arc::new(Shared::new()),
            started_at: None,
            handle: None,
            reason: None,
            loop_panicked: false,
        }
    }

    /// Replace the clock and scheduler (simulated time in tests)
    ///
    /// Rate limiters that read time must be built on the same time source.
    pub fn with_timing(mut self, time: Arc<dyn TimeSource>, platform: Arc<dyn PlatformTiming>) -> Self {
        self.time = time;
        self.platform = platform;
        self
    }

    /// Begin the run
    ///
    /// Captures the start time, resets the rate limiter and spawns the loop
    /// thread. Fails with [`SequencerError::AlreadyStarted`] on a second call.
    pub fn start(&mut self) -> Result<()> {
        let Some(mut parts) = self.parts.take() else {
            return Err(SequencerError::AlreadyStarted.into());
        };

        parts.limiter.reset();
        parts.executor.set_measure_latencies(self.options.measure_latencies);

        let started_at = self.time.monotonic_now();
        self.started_at = Some(started_at);
        self.shared.set_state(SequencerState::Running);

        tracing::debug!(
            open_loop = self.options.open_loop,
            concurrency = self.options.concurrency,
            idle_strategy = %self.options.idle_strategy,
            completion_links = parts.completion_chain.len(),
            failure_links = parts.failure_chain.len(),
            "sequencer started"
        );

        let (tx, rx) = channel::unbounded();
        let tick_loop = TickLoop {
            options: self.options.clone(),
            time: self.time.clone(),
            platform: self.platform.clone(),
            shared: self.shared.clone(),
            parts,
            tx,
            rx,
            started_at,
            progress: RunProgress::default(),
            blocked_since: None,
        };

        let spawned = std::thread::Builder::new()
            .name("sequencer".to_string())
            .spawn(move || tick_loop.run())
            .context("Failed to spawn sequencer loop thread");

        match spawned {
            Ok(handle) => {
                self.handle = Some(handle);
                Ok(())
            }
            Err(e) => {
                self.shared.set_state(SequencerState::Stopped);
                Err(e)
            }
        }
    }

    /// Block until the run is fully stopped and report how it ended
    ///
    /// Returns immediately with the same result once stopped.
    pub fn wait_for_completion(&mut self) -> Result<TerminationReason> {
        if let Some(reason) = self.reason {
            return Ok(reason);
        }
        if self.loop_panicked {
            return Err(SequencerError::LoopPanicked.into());
        }
        let Some(handle) = self.handle.take() else {
            return Err(SequencerError::NotStarted.into());
        };

        match handle.join() {
            Ok(reason) => {
                self.reason = Some(reason);
                Ok(reason)
            }
            Err(_) => {
                self.loop_panicked = true;
                self.shared.set_state(SequencerState::Stopped);
                Err(SequencerError::LoopPanicked.into())
            }
        }
    }

    /// Request a cooperative stop
    ///
    /// No new requests are started; in-flight requests are allowed to drain.
    /// Idempotent. Cancelling before `start` makes the run end as soon as it starts.
    pub fn cancel(&self) {
        self.shared.request_cancel();
    }

    /// Handle for cancelling from another thread while blocked in `wait_for_completion`
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            shared: self.shared.clone(),
        }
    }

    /// Current lifecycle state, readable from any thread
    pub fn state(&self) -> SequencerState {
        self.shared.state()
    }

    /// How the run ended, once `wait_for_completion` returned
    pub fn termination_reason(&self) -> Option<TerminationReason> {
        self.reason
    }

    /// Time from `start` until the terminal condition fired
    ///
    /// Drain time is excluded. While running, this is the time elapsed so far.
    pub fn execution_duration(&self) -> Duration {
        if let Some(duration) = *lock(&self.shared.execution_duration) {
            return duration;
        }
        match self.started_at {
            Some(started_at) => self.time.monotonic_now().duration_since(started_at),
            None => Duration::ZERO,
        }
    }

    /// Total completions divided by [`Self::execution_duration`]
    pub fn completions_per_second(&self) -> f64 {
        let completed = lock(&self.shared.progress).completed;
        calculate_rate(completed, self.execution_duration())
    }

    /// Counters as last published by the loop, with `elapsed` set to the execution duration
    pub fn progress(&self) -> RunProgress {
        let mut progress = *lock(&self.shared.progress);
        progress.elapsed = self.execution_duration();
        progress
    }

    /// Copy of the named statistics; final once stopped
    pub fn statistics(&self) -> StatisticMap {
        lock(&self.shared.statistics).statistics().clone()
    }

    /// Copy of the statistic sink, for merging across workers
    pub fn statistic_sink(&self) -> StatisticSink {
        lock(&self.shared.statistics).clone()
    }
}

impl Drop for Sequencer {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.shared.request_cancel();
            let _ = handle.join();
        }
    }
}

/// A completion as delivered by an executor callback
struct Delivered {
    record: CompletionRecord,
    /// Start attempt to callback invocation
    delivered_in: Duration,
}

/// Loop-thread side of a run
struct TickLoop {
    options: SequencerOptions,
    time: Arc<dyn TimeSource>,
    platform: Arc<dyn PlatformTiming>,
    shared: Arc<Shared>,
    parts: RunParts,
    tx: Sender<Delivered>,
    rx: Receiver<Delivered>,
    started_at: FastInstant,
    progress: RunProgress,
    /// Set at the first refused start, cleared by the next accepted one
    blocked_since: Option<FastInstant>,
}

impl TickLoop {
    fn run(mut self) -> TerminationReason {
        if let Some(core) = self.options.cpu_core {
            if let Err(e) = affinity::pin_current_thread(core) {
                tracing::warn!(core, error = %e, "could not pin sequencer thread");
            }
        }

        let (reason, trigger) = self.pace();

        let execution_duration = self.elapsed();
        *lock(&self.shared.execution_duration) = Some(execution_duration);
        self.shared.set_state(SequencerState::Draining);

        if let Some(since) = self.blocked_since.take() {
            let blocked = self.time.monotonic_now().duration_since(since);
            lock(&self.shared.statistics).record_duration(SEQUENCER_BLOCKING, blocked);
        }

        tracing::debug!(
            %reason,
            trigger = trigger.as_deref().unwrap_or("-"),
            elapsed_ms = execution_duration.as_millis() as u64,
            started = self.progress.started,
            completed = self.progress.completed,
            "sequencer terminal condition reached"
        );

        self.drain();
        self.parts.executor.terminate();
        self.collect_completions();
        self.publish_progress();

        self.shared.set_state(SequencerState::Stopped);
        tracing::debug!(
            completed = self.progress.completed,
            failed = self.progress.failed,
            rejected = self.progress.rejected,
            "sequencer stopped"
        );
        reason
    }

    /// Tick until a terminal condition is met
    fn pace(&mut self) -> (TerminationReason, Option<String>) {
        loop {
            self.collect_completions();

            if self.shared.is_cancelled() {
                return (TerminationReason::Cancelled, None);
            }

            self.progress.elapsed = self.elapsed();
            let (completion, completion_trigger) = {
                let (status, trigger) = self.parts.completion_chain.evaluate_with_trigger(&self.progress);
                (status, trigger.map(str::to_string))
            };
            let (failure, failure_trigger) = {
                let (status, trigger) = self.parts.failure_chain.evaluate_with_trigger(&self.progress);
                (status, trigger.map(str::to_string))
            };

            if failure == TerminationStatus::Terminate {
                return (TerminationReason::Failed, failure_trigger);
            }
            if completion == TerminationStatus::Terminate {
                return (TerminationReason::Completed, completion_trigger);
            }

            if !self.options.open_loop && self.progress.in_flight() >= self.options.concurrency {
                self.idle();
                continue;
            }

            if !self.parts.limiter.try_acquire_one() {
                self.idle();
                continue;
            }

            if !self.try_start() {
                // Every unit acquired for a refused start goes back
                self.parts.limiter.release_one();
                self.progress.rejected += 1;
                if self.blocked_since.is_none() {
                    self.blocked_since = Some(self.time.monotonic_now());
                }
                self.publish_progress();
                self.idle();
            }
        }
    }

    /// Hand one request to the executor; false if it refused
    fn try_start(&mut self) -> bool {
        let tx = self.tx.clone();
        let time = self.time.clone();
        let attempted_at = time.monotonic_now();

        let on_complete: CompletionCallback = Box::new(move |record| {
            let delivered_in = time.monotonic_now().duration_since(attempted_at);
            // The loop may already be gone if the executor outlives the run
            let _ = tx.send(Delivered { record, delivered_in });
        });

        if !self.parts.executor.try_start_request(on_complete) {
            return false;
        }

        self.progress.started += 1;
        if let Some(since) = self.blocked_since.take() {
            lock(&self.shared.statistics).record_duration(SEQUENCER_BLOCKING, attempted_at.duration_since(since));
        }
        self.publish_progress();
        true
    }

    /// Fold every delivered completion into counters, statistics and predicates
    fn collect_completions(&mut self) -> usize {
        let shared = self.shared.clone();
        let mut statistics: Option<MutexGuard<'_, StatisticSink>> = None;
        let mut collected = 0;

        while let Ok(delivered) = self.rx.try_recv() {
            let record = delivered.record;
            let sink = statistics.get_or_insert_with(|| lock(&shared.statistics));

            self.progress.completed += 1;
            if record.success {
                self.progress.succeeded += 1;
            } else {
                self.progress.failed += 1;
            }

            sink.record_duration(SEQUENCER_CALLBACK, delivered.delivered_in);
            if let Some(latency) = record.latency {
                sink.record_duration(REQUEST_LATENCY, latency);
            }

            self.parts.completion_chain.observe(&record);
            self.parts.failure_chain.observe(&record);
            collected += 1;
        }
        drop(statistics);

        if collected > 0 {
            self.publish_progress();
        }
        collected
    }

    /// Wait for in-flight requests, bounded by the drain timeout
    fn drain(&mut self) {
        let drain_started = self.time.monotonic_now();

        loop {
            self.collect_completions();

            let in_flight = self.progress.in_flight();
            if in_flight == 0 {
                return;
            }

            let waited = self.time.monotonic_now().duration_since(drain_started);
            if waited >= self.options.drain_timeout {
                tracing::warn!(
                    in_flight,
                    timeout_ms = self.options.drain_timeout.as_millis() as u64,
                    "drain timed out with requests still in flight"
                );
                return;
            }

            self.platform.sleep(DRAIN_POLL_PERIOD);
        }
    }

    #[inline]
    fn idle(&self) {
        self.options.idle_strategy.idle(self.platform.as_ref());
    }

    #[inline]
    fn elapsed(&self) -> Duration {
        self.time.monotonic_now().duration_since(self.started_at)
    }

    fn publish_progress(&self) {
        *lock(&self.shared.progress) = self.progress;
    }
}
