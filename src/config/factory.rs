//! Building run components from configuration
//!
//! Every call returns fresh objects: limiters, chains and samplers carry
//! per-run state and are never shared between workers or runs.

use super::*;
use crate::executor::{RequestExecutor, SimulatedExecutor};
use crate::platform::TimeSource;
use crate::rate_limiter::{
    BurstingRateLimiter, DistributionSamplingRateLimiter, LinearRateLimiter, RateLimiter, UnlimitedRateLimiter,
};
use crate::sampler::exponential::ExponentialSampler;
use crate::sampler::gaussian::GaussianSampler;
use crate::sampler::uniform::UniformSampler;
use crate::sampler::DiscreteNumericDistributionSampler;
use crate::sequencer::SequencerOptions;
use crate::termination::predicates::{CounterThresholdPredicate, DurationPredicate, FailureRatioPredicate};
use crate::termination::TerminationChain;
use crate::Result;
use std::sync::Arc;

/// Build a sampler; seeded samplers are reproducible
pub fn build_sampler(config: &SamplerConfig, seed: Option<u64>) -> Box<dyn DiscreteNumericDistributionSampler> {
    match (config, seed) {
        (SamplerConfig::Constant { value }, _) => Box::new(UniformSampler::with_seed(*value, *value, 0)),
        (SamplerConfig::Uniform { min, max }, Some(seed)) => Box::new(UniformSampler::with_seed(*min, *max, seed)),
        (SamplerConfig::Uniform { min, max }, None) => Box::new(UniformSampler::new(*min, *max)),
        (SamplerConfig::Exponential { mean, cap }, Some(seed)) => {
            Box::new(ExponentialSampler::with_seed(*mean, *cap, seed))
        }
        (SamplerConfig::Exponential { mean, cap }, None) => Box::new(ExponentialSampler::new(*mean, *cap)),
        (SamplerConfig::Gaussian { mean, stddev, cap }, Some(seed)) => {
            Box::new(GaussianSampler::with_seed(*mean, *stddev, *cap, seed))
        }
        (SamplerConfig::Gaussian { mean, stddev, cap }, None) => Box::new(GaussianSampler::new(*mean, *stddev, *cap)),
    }
}

/// Build the pacing limiter
///
/// Layers, innermost first: linear rate (or unlimited), bursting, jitter.
pub fn build_rate_limiter(
    config: &RunConfig,
    time_source: Arc<dyn TimeSource>,
    seed: Option<u64>,
) -> Box<dyn RateLimiter> {
    let mut limiter: Box<dyn RateLimiter> = match config.requests_per_second {
        Some(rps) => Box::new(LinearRateLimiter::new(time_source.clone(), rps)),
        None => Box::new(UnlimitedRateLimiter),
    };

    if config.burst_size > 1 {
        limiter = Box::new(BurstingRateLimiter::new(limiter, config.burst_size as u64));
    }

    if let Some(ref jitter) = config.jitter {
        limiter = Box::new(DistributionSamplingRateLimiter::new(
            limiter,
            build_sampler(jitter, seed),
            time_source,
        ));
    }

    limiter
}

/// Chain whose firing ends the run normally
///
/// Duration first, then counter limits in counter order.
pub fn build_completion_chain(config: &RunConfig) -> TerminationChain {
    let mut chain = TerminationChain::new();
    if let Some(secs) = config.duration_secs {
        chain.link(Box::new(DurationPredicate::new(Duration::from_secs(secs))));
    }
    for (&counter, &limit) in &config.termination_predicates {
        chain.link(Box::new(CounterThresholdPredicate::new(counter, limit)));
    }
    chain
}

/// Chain whose firing ends the run as failed
pub fn build_failure_chain(config: &RunConfig) -> TerminationChain {
    let mut chain = TerminationChain::new();
    for (&counter, &limit) in &config.failure_predicates {
        chain.link(Box::new(CounterThresholdPredicate::new(counter, limit)));
    }
    if let Some(ratio) = config.failure_ratio {
        chain.link(Box::new(FailureRatioPredicate::new(ratio.threshold, ratio.window)));
    }
    chain
}

/// Sequencer options for worker `worker_id`
pub fn build_sequencer_options(config: &RunConfig, worker_id: usize) -> SequencerOptions {
    SequencerOptions {
        open_loop: config.open_loop,
        concurrency: config.concurrency as u64,
        idle_strategy: config.idle_strategy,
        drain_timeout: config.drain_timeout(),
        measure_latencies: config.measure_latencies,
        cpu_core: config
            .cpu_cores
            .as_deref()
            .and_then(|cores| crate::platform::affinity::core_for_worker(cores, worker_id)),
    }
}

/// Start a simulated target for one worker
pub fn build_simulated_executor(config: &SimulatedTargetConfig, seed: Option<u64>) -> Result<Box<dyn RequestExecutor>> {
    let executor = SimulatedExecutor::new(
        build_sampler(&config.latency, seed),
        config.failure_probability,
        config.max_outstanding,
        seed,
    )?;
    Ok(Box::new(executor))
}
