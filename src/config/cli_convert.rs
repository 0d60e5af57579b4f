//! CLI to RunConfig conversion utilities

use super::RunConfig;
use crate::config::cli::Cli;
use crate::platform::affinity;
use anyhow::{Context, Result};

/// Build the run configuration from CLI arguments, loading `--config` first if given
pub fn build_config_from_cli(cli: &Cli) -> Result<RunConfig> {
    let base = match cli.config {
        Some(ref path) => super::toml::parse_toml_file(path)?,
        None => RunConfig::default(),
    };

    let mut config = super::toml::merge_cli_with_config(cli, base)?;

    if let Some(ref workers) = cli.workers {
        config.workers = parse_workers(workers)?;
    }
    if let Some(ref cores) = cli.cpu_cores {
        let parsed = affinity::parse_cpu_list(cores)?;
        if cli.workers.is_none() {
            config.workers = parsed.len();
        }
        config.cpu_cores = Some(parsed);
    }

    Ok(config)
}

/// Parse a worker count; `"auto"` means one per available CPU
pub fn parse_workers(s: &str) -> Result<usize> {
    let s = s.trim();
    if s.eq_ignore_ascii_case("auto") {
        return Ok(affinity::available_cpus());
    }
    s.parse().with_context(|| format!("Invalid worker count: {}", s))
}

/// Parse a duration string (e.g., "60s", "5m", "1h") to seconds
pub fn parse_duration(s: &str) -> Result<u64> {
    let s = s.trim().to_lowercase();

    let (num_str, multiplier) = if let Some(n) = s.strip_suffix("min") {
        (n, 60u64)
    } else if let Some(n) = s.strip_suffix("sec") {
        (n, 1)
    } else if let Some(n) = s.strip_suffix("hr") {
        (n, 3600)
    } else if let Some(n) = s.strip_suffix('s') {
        (n, 1)
    } else if let Some(n) = s.strip_suffix('m') {
        (n, 60)
    } else if let Some(n) = s.strip_suffix('h') {
        (n, 3600)
    } else {
        (s.as_str(), 1)
    };

    let num: u64 = num_str
        .trim()
        .parse()
        .with_context(|| format!("Invalid duration format: {}", s))?;

    Ok(num * multiplier)
}

/// Parse a time string (e.g., "250ns", "100us", "2ms", "1s") to nanoseconds
///
/// A bare number is taken as nanoseconds.
pub fn parse_time_ns(s: &str) -> Result<u64> {
    let s = s.trim().to_lowercase();

    let (num_str, multiplier) = if let Some(n) = s.strip_suffix("ns") {
        (n, 1u64)
    } else if let Some(n) = s.strip_suffix("us") {
        (n, 1_000)
    } else if let Some(n) = s.strip_suffix("ms") {
        (n, 1_000_000)
    } else if let Some(n) = s.strip_suffix('s') {
        (n, 1_000_000_000)
    } else {
        (s.as_str(), 1)
    };

    let num: u64 = num_str
        .trim()
        .parse()
        .with_context(|| format!("Invalid time format: {}", s))?;

    num.checked_mul(multiplier)
        .with_context(|| format!("Time value out of range: {}", s))
}

/// Parse a time string to whole milliseconds, rounding up
///
/// A bare number is taken as milliseconds.
pub fn parse_time_ms(s: &str) -> Result<u64> {
    let trimmed = s.trim();
    if trimmed.chars().all(|c| c.is_ascii_digit()) && !trimmed.is_empty() {
        return trimmed
            .parse()
            .with_context(|| format!("Invalid time format: {}", s));
    }
    let nanos = parse_time_ns(trimmed)?;
    Ok(nanos.div_ceil(1_000_000))
}
