//! ReqPulse CLI entry point

use anyhow::{Context, Result};
use reqpulse::config::cli::Cli;
use reqpulse::config::{cli_convert, validator};
use reqpulse::output::{json, text};
use reqpulse::{Coordinator, TerminationReason};
use tracing_subscriber::EnvFilter;

/// Exit status when a failure predicate ended the run
const EXIT_RUN_FAILED: i32 = 2;

fn main() -> Result<()> {
    let cli = Cli::parse_args();
    init_logging(cli.verbose);
    cli.validate()?;

    let config = cli_convert::build_config_from_cli(&cli)?;
    validator::validate_config(&config).context("Configuration validation failed")?;

    if !cli.json {
        println!("ReqPulse v{}", env!("CARGO_PKG_VERSION"));
        println!();
        println!("{}", config);
    }

    if cli.dry_run {
        if !cli.json {
            println!();
            println!("Dry run mode - configuration validated successfully");
        }
        return Ok(());
    }

    if !cli.json {
        println!();
        println!("Starting run...");
        println!();
    }

    let coordinator = Coordinator::new(config);
    let report = coordinator.run()?;

    if cli.json {
        println!("{}", json::report_to_string(&report)?);
    } else {
        text::print_report(&report);
    }

    if let Some(ref path) = cli.json_output {
        json::write_report(&report, path)?;
        tracing::info!(path = %path.display(), "wrote JSON report");
    }

    if report.reason == TerminationReason::Failed {
        std::process::exit(EXIT_RUN_FAILED);
    }
    Ok(())
}

/// Log to stderr at the level chosen by `-v`, plus any `RUST_LOG` directives
fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => tracing::Level::INFO,
        1 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .with_writer(std::io::stderr)
        .init();
}
