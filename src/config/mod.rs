//! Configuration module
//!
//! Handles CLI argument parsing, TOML configuration files, validation, and
//! turning a validated [`RunConfig`] into the per-worker components of a run.

pub mod cli;
pub mod cli_convert;
pub mod factory;
pub mod toml;
pub mod validator;

use crate::platform::IdleStrategy;
use crate::termination::predicates::ProgressCounter;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// Complete run configuration
///
/// Values apply to each worker: with `workers = 4` and
/// `requests_per_second = 100` the process paces 400 requests/second in total.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Target rate per worker; `None` means unpaced
    pub requests_per_second: Option<u32>,
    /// Release grants in bursts of this size (0 or 1 disables bursting)
    #[serde(default)]
    pub burst_size: u32,
    /// Extra delay sampled per grant, in nanoseconds
    pub jitter: Option<SamplerConfig>,
    /// Ignore in-flight requests when pacing
    #[serde(default)]
    pub open_loop: bool,
    /// Closed-loop in-flight ceiling per worker
    #[serde(default = "default_concurrency")]
    pub concurrency: u32,
    /// Stop after this many seconds
    pub duration_secs: Option<u64>,
    /// Stop normally once a counter reaches its limit
    #[serde(default)]
    pub termination_predicates: BTreeMap<ProgressCounter, u64>,
    /// Stop as failed once a counter reaches its limit
    #[serde(default)]
    pub failure_predicates: BTreeMap<ProgressCounter, u64>,
    /// Stop as failed once the recent failure ratio is too high
    pub failure_ratio: Option<FailureRatioConfig>,
    /// Back-off while pacing denies a request
    #[serde(default)]
    pub idle_strategy: IdleStrategy,
    /// Upper bound on waiting for in-flight requests after termination
    #[serde(default = "default_drain_timeout_ms")]
    pub drain_timeout_ms: u64,
    /// Record executor-reported request latencies
    #[serde(default)]
    pub measure_latencies: bool,
    /// Seed for samplers and the simulated target (each worker offsets it by its id)
    pub seed: Option<u64>,
    /// Number of worker threads, one sequencer each
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// CPU cores to pin worker loops to, cycled by worker id
    pub cpu_cores: Option<Vec<usize>>,
    /// Simulated request target
    #[serde(default)]
    pub target: SimulatedTargetConfig,
}

fn default_concurrency() -> u32 {
    1
}

fn default_drain_timeout_ms() -> u64 {
    5_000
}

fn default_workers() -> usize {
    1
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            requests_per_second: None,
            burst_size: 0,
            jitter: None,
            open_loop: false,
            concurrency: default_concurrency(),
            duration_secs: None,
            termination_predicates: BTreeMap::new(),
            failure_predicates: BTreeMap::new(),
            failure_ratio: None,
            idle_strategy: IdleStrategy::default(),
            drain_timeout_ms: default_drain_timeout_ms(),
            measure_latencies: false,
            seed: None,
            workers: default_workers(),
            cpu_cores: None,
            target: SimulatedTargetConfig::default(),
        }
    }
}

impl RunConfig {
    pub fn drain_timeout(&self) -> Duration {
        Duration::from_millis(self.drain_timeout_ms)
    }

    /// Whether any predicate can end the run on its own
    pub fn has_stop_condition(&self) -> bool {
        self.duration_secs.is_some()
            || !self.termination_predicates.is_empty()
            || !self.failure_predicates.is_empty()
            || self.failure_ratio.is_some()
    }
}

/// Discrete distribution of non-negative integers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SamplerConfig {
    /// Always `value`
    Constant { value: u64 },
    /// Uniform over `[min, max]`
    Uniform { min: u64, max: u64 },
    /// Exponential with the given mean, capped (Poisson arrivals)
    Exponential { mean: u64, cap: u64 },
    /// Normal around `mean`, clamped to `[0, cap]`
    Gaussian { mean: f64, stddev: f64, cap: u64 },
}

/// Sliding-window failure ratio stop condition
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FailureRatioConfig {
    /// Ratio in (0, 1] at which the run fails
    pub threshold: f64,
    /// Number of most recent completions considered
    pub window: usize,
}

/// Background-thread target used by the binary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulatedTargetConfig {
    /// Per-request latency in nanoseconds
    #[serde(default = "default_target_latency")]
    pub latency: SamplerConfig,
    /// Chance in [0, 1] that a request fails
    #[serde(default)]
    pub failure_probability: f64,
    /// Starts are refused while this many requests are outstanding
    #[serde(default = "default_max_outstanding")]
    pub max_outstanding: u64,
}

fn default_target_latency() -> SamplerConfig {
    SamplerConfig::Constant { value: 1_000_000 }
}

fn default_max_outstanding() -> u64 {
    100
}

impl Default for SimulatedTargetConfig {
    fn default() -> Self {
        Self {
            latency: default_target_latency(),
            failure_probability: 0.0,
            max_outstanding: default_max_outstanding(),
        }
    }
}

// Display trait implementations

impl fmt::Display for RunConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Configuration:")?;
        match self.requests_per_second {
            Some(rps) => write!(f, "  Pacing: {} req/s per worker", rps)?,
            None => write!(f, "  Pacing: unlimited")?,
        }
        if self.burst_size > 1 {
            write!(f, ", burst={}", self.burst_size)?;
        }
        if let Some(ref jitter) = self.jitter {
            write!(f, ", jitter={}", jitter)?;
        }
        writeln!(f)?;
        if self.open_loop {
            writeln!(f, "  Loop: open")?;
        } else {
            writeln!(f, "  Loop: closed, concurrency={}", self.concurrency)?;
        }
        write!(f, "  Workers: {}, idle={}", self.workers, self.idle_strategy)?;
        if let Some(ref cores) = self.cpu_cores {
            write!(f, ", cpu_cores={:?}", cores)?;
        }
        writeln!(f)?;
        if let Some(secs) = self.duration_secs {
            writeln!(f, "  Duration: {}s", secs)?;
        }
        for (counter, limit) in &self.termination_predicates {
            writeln!(f, "  Stop when: {} >= {}", counter, limit)?;
        }
        for (counter, limit) in &self.failure_predicates {
            writeln!(f, "  Fail when: {} >= {}", counter, limit)?;
        }
        if let Some(ref ratio) = self.failure_ratio {
            writeln!(f, "  Fail when: {}", ratio)?;
        }
        write!(f, "  Target: {}", self.target)
    }
}

impl fmt::Display for SamplerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SamplerConfig::Constant { value } => write!(f, "constant({})", value),
            SamplerConfig::Uniform { min, max } => write!(f, "uniform({}..={})", min, max),
            SamplerConfig::Exponential { mean, cap } => write!(f, "exponential(mean={}, cap={})", mean, cap),
            SamplerConfig::Gaussian { mean, stddev, cap } => {
                write!(f, "gaussian(mean={}, stddev={}, cap={})", mean, stddev, cap)
            }
        }
    }
}

impl fmt::Display for FailureRatioConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failure ratio >= {} over last {}", self.threshold, self.window)
    }
}

impl fmt::Display for SimulatedTargetConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "latency={}ns, failure_probability={}, max_outstanding={}",
            self.latency, self.failure_probability, self.max_outstanding
        )
    }
}
