//! TOML configuration file parsing

use super::*;
use crate::config::cli::Cli;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// Parse TOML configuration file
pub fn parse_toml_file(path: &Path) -> Result<RunConfig> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_toml_string(&contents)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Parse TOML configuration from string
pub fn parse_toml_string(contents: &str) -> Result<RunConfig> {
    let config: RunConfig = ::toml::from_str(contents)
        .context("Failed to parse TOML configuration")?;

    Ok(config)
}

/// Merge CLI arguments with TOML configuration (CLI takes precedence)
///
/// Only options given explicitly on the command line override the file.
pub fn merge_cli_with_config(cli: &Cli, mut config: RunConfig) -> Result<RunConfig> {
    if let Some(rps) = cli.rate {
        config.requests_per_second = Some(rps);
    }
    if let Some(burst) = cli.burst_size {
        config.burst_size = burst;
    }
    if cli.open_loop {
        config.open_loop = true;
    }
    if let Some(concurrency) = cli.concurrency {
        config.concurrency = concurrency;
    }
    if let Some(ref duration) = cli.duration {
        config.duration_secs = Some(super::cli_convert::parse_duration(duration)?);
    }
    if let Some(max) = cli.max_requests {
        config.termination_predicates.insert(ProgressCounter::Completed, max);
    }
    if let Some(max) = cli.max_failures {
        config.failure_predicates.insert(ProgressCounter::Failed, max);
    }
    if let Some(threshold) = cli.failure_ratio {
        config.failure_ratio = Some(FailureRatioConfig {
            threshold,
            window: cli.failure_window,
        });
    }
    if let Some(idle) = cli.idle_strategy {
        config.idle_strategy = idle;
    }
    if let Some(ref timeout) = cli.drain_timeout {
        config.drain_timeout_ms = super::cli_convert::parse_time_ms(timeout)?;
    }
    if cli.measure_latencies {
        config.measure_latencies = true;
    }
    if cli.seed.is_some() {
        config.seed = cli.seed;
    }
    if let Some(ref latency) = cli.target_latency {
        let nanos = super::cli_convert::parse_time_ns(latency)?;
        config.target.latency = SamplerConfig::Constant { value: nanos };
    }
    if let Some(probability) = cli.target_failure_probability {
        config.target.failure_probability = probability;
    }
    if let Some(max) = cli.target_max_outstanding {
        config.target.max_outstanding = max;
    }

    Ok(config)
}
