//! Configuration validation

use super::*;
use anyhow::{Context, Result};

/// Validate complete configuration
pub fn validate_config(config: &RunConfig) -> Result<()> {
    validate_pacing(config)?;
    validate_termination(config)?;
    validate_workers(config)?;
    validate_target(&config.target).context("Invalid simulated target")?;

    if !config.has_stop_condition() {
        tracing::warn!("no stop condition configured; the run ends only when cancelled");
    }

    Ok(())
}

/// Validate rate, bursting, jitter and loop settings
pub fn validate_pacing(config: &RunConfig) -> Result<()> {
    if config.requests_per_second == Some(0) {
        anyhow::bail!("requests_per_second must be at least 1 when set");
    }

    if config.burst_size > 1 && config.requests_per_second.is_none() {
        anyhow::bail!(
            "burst_size ({}) requires requests_per_second; an unpaced run has nothing to burst",
            config.burst_size
        );
    }

    if config.concurrency == 0 {
        anyhow::bail!("concurrency must be at least 1");
    }

    if let Some(ref jitter) = config.jitter {
        validate_sampler(jitter).context("Invalid jitter")?;
    }

    Ok(())
}

/// Validate stop conditions
pub fn validate_termination(config: &RunConfig) -> Result<()> {
    if config.duration_secs == Some(0) {
        anyhow::bail!("duration_secs must be at least 1 when set");
    }

    if let Some(ref ratio) = config.failure_ratio {
        if ratio.threshold.is_nan() || ratio.threshold <= 0.0 || ratio.threshold > 1.0 {
            anyhow::bail!("failure_ratio threshold must be in (0, 1], got {}", ratio.threshold);
        }
        if ratio.window == 0 {
            anyhow::bail!("failure_ratio window must be at least 1");
        }
    }

    Ok(())
}

/// Validate worker count and CPU list
pub fn validate_workers(config: &RunConfig) -> Result<()> {
    if config.workers == 0 {
        anyhow::bail!("workers must be at least 1");
    }

    if let Some(ref cores) = config.cpu_cores {
        if cores.is_empty() {
            anyhow::bail!("cpu_cores cannot be empty when set");
        }
        let cpus = crate::platform::affinity::available_cpus();
        if let Some(&core) = cores.iter().find(|&&core| core >= cpus) {
            anyhow::bail!("cpu core {} does not exist (system has {} CPUs)", core, cpus);
        }
    }

    Ok(())
}

/// Validate the simulated target
pub fn validate_target(target: &SimulatedTargetConfig) -> Result<()> {
    validate_sampler(&target.latency).context("Invalid latency")?;

    let p = target.failure_probability;
    if p.is_nan() || !(0.0..=1.0).contains(&p) {
        anyhow::bail!("failure_probability must be in [0, 1], got {}", p);
    }

    if target.max_outstanding == 0 {
        anyhow::bail!("max_outstanding must be at least 1");
    }

    Ok(())
}

/// Validate sampler parameters
pub fn validate_sampler(sampler: &SamplerConfig) -> Result<()> {
    match sampler {
        SamplerConfig::Constant { .. } => {}
        SamplerConfig::Uniform { min, max } => {
            if min > max {
                anyhow::bail!("uniform min ({}) must not exceed max ({})", min, max);
            }
        }
        SamplerConfig::Exponential { mean, cap } => {
            if mean > cap {
                anyhow::bail!("exponential mean ({}) must not exceed cap ({})", mean, cap);
            }
        }
        SamplerConfig::Gaussian { mean, stddev, .. } => {
            if !mean.is_finite() || *mean < 0.0 {
                anyhow::bail!("gaussian mean must be finite and non-negative, got {}", mean);
            }
            if !stddev.is_finite() || *stddev < 0.0 {
                anyhow::bail!("gaussian stddev must be finite and non-negative, got {}", stddev);
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&RunConfig::default()).is_ok());
    }

    #[test]
    fn test_validate_rate_and_burst() {
        let mut config = RunConfig {
            requests_per_second: Some(0),
            ..Default::default()
        };
        assert!(validate_pacing(&config).is_err());

        config.requests_per_second = None;
        config.burst_size = 4;
        assert!(validate_pacing(&config).is_err());

        config.requests_per_second = Some(100);
        assert!(validate_pacing(&config).is_ok());

        // Burst size 1 is the same as no bursting
        config.requests_per_second = None;
        config.burst_size = 1;
        assert!(validate_pacing(&config).is_ok());
    }

    #[test]
    fn test_validate_concurrency() {
        let config = RunConfig {
            concurrency: 0,
            ..Default::default()
        };
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("concurrency"));
    }

    #[test]
    fn test_validate_workers() {
        let mut config = RunConfig {
            workers: 0,
            ..Default::default()
        };
        assert!(validate_workers(&config).is_err());

        config.workers = 1;
        config.cpu_cores = Some(vec![]);
        assert!(validate_workers(&config).is_err());

        config.cpu_cores = Some(vec![0]);
        assert!(validate_workers(&config).is_ok());

        config.cpu_cores = Some(vec![crate::platform::affinity::available_cpus()]);
        assert!(validate_workers(&config).is_err());
    }

    #[test]
    fn test_validate_failure_ratio() {
        let mut config = RunConfig::default();
        for threshold in [0.0, -0.5, 1.01, f64::NAN] {
            config.failure_ratio = Some(FailureRatioConfig { threshold, window: 10 });
            assert!(validate_termination(&config).is_err(), "threshold {} accepted", threshold);
        }

        config.failure_ratio = Some(FailureRatioConfig {
            threshold: 1.0,
            window: 0,
        });
        assert!(validate_termination(&config).is_err());

        config.failure_ratio = Some(FailureRatioConfig {
            threshold: 1.0,
            window: 1,
        });
        assert!(validate_termination(&config).is_ok());
    }

    #[test]
    fn test_validate_duration() {
        let config = RunConfig {
            duration_secs: Some(0),
            ..Default::default()
        };
        assert!(validate_termination(&config).is_err());
    }

    #[test]
    fn test_validate_sampler_params() {
        assert!(validate_sampler(&SamplerConfig::Uniform { min: 5, max: 5 }).is_ok());
        assert!(validate_sampler(&SamplerConfig::Uniform { min: 6, max: 5 }).is_err());
        assert!(validate_sampler(&SamplerConfig::Exponential { mean: 10, cap: 100 }).is_ok());
        assert!(validate_sampler(&SamplerConfig::Exponential { mean: 101, cap: 100 }).is_err());
        assert!(validate_sampler(&SamplerConfig::Gaussian {
            mean: 100.0,
            stddev: 0.0,
            cap: 1000
        })
        .is_ok());
        assert!(validate_sampler(&SamplerConfig::Gaussian {
            mean: 100.0,
            stddev: -1.0,
            cap: 1000
        })
        .is_err());
        assert!(validate_sampler(&SamplerConfig::Gaussian {
            mean: f64::NAN,
            stddev: 1.0,
            cap: 1000
        })
        .is_err());
    }

    #[test]
    fn test_validate_target() {
        let mut target = SimulatedTargetConfig::default();
        assert!(validate_target(&target).is_ok());

        target.failure_probability = 1.5;
        assert!(validate_target(&target).is_err());

        target.failure_probability = 0.5;
        target.max_outstanding = 0;
        assert!(validate_target(&target).is_err());

        target.max_outstanding = 1;
        target.latency = SamplerConfig::Uniform { min: 10, max: 1 };
        let err = validate_target(&target).unwrap_err();
        assert!(format!("{:#}", err).contains("latency"));
    }
}
