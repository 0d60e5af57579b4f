//! CLI argument parsing using clap

use crate::platform::IdleStrategy;
use clap::Parser;
use std::path::PathBuf;

/// reqpulse - Precise request pacing engine
///
/// Drives a simulated request target at a configured rate and reports
/// throughput and latency statistics.
#[derive(Parser, Debug)]
#[command(name = "reqpulse")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// TOML configuration file (command line options take precedence)
    #[arg(short = 'c', long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    // === Pacing Options ===
    /// Target requests per second, per worker (unpaced if omitted)
    #[arg(short = 'r', long)]
    pub rate: Option<u32>,

    /// Release requests in bursts of this size
    #[arg(long)]
    pub burst_size: Option<u32>,

    /// Pace by rate only, ignoring in-flight requests
    #[arg(long)]
    pub open_loop: bool,

    /// Closed-loop ceiling on in-flight requests, per worker
    #[arg(long)]
    pub concurrency: Option<u32>,

    /// Back-off while pacing denies a request
    #[arg(long, value_enum)]
    pub idle_strategy: Option<IdleStrategy>,

    /// Number of workers, or "auto" for one per CPU
    #[arg(short = 'w', long)]
    pub workers: Option<String>,

    /// CPU cores to pin worker loops to (e.g., "0-3,6")
    #[arg(long)]
    pub cpu_cores: Option<String>,

    // === Termination Options ===
    /// Run duration (e.g., 30s, 5m, 1h)
    #[arg(short = 'd', long)]
    pub duration: Option<String>,

    /// Stop after this many completed requests, per worker
    #[arg(short = 'n', long)]
    pub max_requests: Option<u64>,

    /// Fail the run after this many failed requests, per worker
    #[arg(long)]
    pub max_failures: Option<u64>,

    /// Fail the run once the recent failure ratio reaches this value (0-1]
    #[arg(long)]
    pub failure_ratio: Option<f64>,

    /// Number of recent completions the failure ratio considers
    #[arg(long, default_value = "100")]
    pub failure_window: usize,

    /// Maximum time to wait for in-flight requests after stopping (e.g., 500ms, 5s)
    #[arg(long)]
    pub drain_timeout: Option<String>,

    // === Target Options ===
    /// Simulated per-request latency (e.g., 500us, 2ms)
    #[arg(long)]
    pub target_latency: Option<String>,

    /// Probability that a simulated request fails
    #[arg(long)]
    pub target_failure_probability: Option<f64>,

    /// Maximum outstanding requests the simulated target accepts
    #[arg(long)]
    pub target_max_outstanding: Option<u64>,

    // === Output Options ===
    /// Record per-request latencies
    #[arg(long)]
    pub measure_latencies: bool,

    /// Seed for reproducible runs
    #[arg(long)]
    pub seed: Option<u64>,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,

    /// Also write the JSON report to this file
    #[arg(long, value_name = "FILE")]
    pub json_output: Option<PathBuf>,

    /// Validate and print the configuration without running
    #[arg(long)]
    pub dry_run: bool,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate CLI arguments
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.rate == Some(0) {
            anyhow::bail!("rate must be at least 1 request per second");
        }

        if self.concurrency == Some(0) {
            anyhow::bail!("concurrency must be at least 1");
        }

        if let Some(ratio) = self.failure_ratio {
            if !(ratio > 0.0 && ratio <= 1.0) {
                anyhow::bail!("failure_ratio must be in (0, 1], got {}", ratio);
            }
            if self.failure_window == 0 {
                anyhow::bail!("failure_window must be at least 1");
            }
        }

        if let Some(p) = self.target_failure_probability {
            if !(0.0..=1.0).contains(&p) {
                anyhow::bail!("target_failure_probability must be in [0, 1], got {}", p);
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal() {
        let cli = Cli::parse_from(["reqpulse"]);
        assert!(cli.config.is_none());
        assert!(cli.rate.is_none());
        assert!(!cli.open_loop);
        assert_eq!(cli.failure_window, 100);
        assert_eq!(cli.verbose, 0);
        assert!(cli.validate().is_ok());
    }

    #[test]
    fn test_parse_full() {
        let cli = Cli::parse_from([
            "reqpulse",
            "-r",
            "100",
            "--open-loop",
            "--idle-strategy",
            "sleep",
            "-w",
            "auto",
            "-n",
            "500",
            "--failure-ratio",
            "0.25",
            "--json",
            "-vv",
        ]);

        assert_eq!(cli.rate, Some(100));
        assert!(cli.open_loop);
        assert_eq!(cli.idle_strategy, Some(IdleStrategy::Sleep));
        assert_eq!(cli.workers.as_deref(), Some("auto"));
        assert_eq!(cli.max_requests, Some(500));
        assert_eq!(cli.failure_ratio, Some(0.25));
        assert!(cli.json);
        assert_eq!(cli.verbose, 2);
        assert!(cli.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(Cli::parse_from(["reqpulse", "--rate", "0"]).validate().is_err());
        assert!(Cli::parse_from(["reqpulse", "--concurrency", "0"]).validate().is_err());
        assert!(Cli::parse_from(["reqpulse", "--failure-ratio", "1.5"]).validate().is_err());
        assert!(Cli::parse_from(["reqpulse", "--failure-ratio", "0"]).validate().is_err());
        assert!(Cli::parse_from(["reqpulse", "--target-failure-probability", "1.5"])
            .validate()
            .is_err());
    }
}
