//! Human-readable text output

use crate::coordinator::RunReport;
use crate::stats::histogram::StatisticSummary;
use crate::util::time::{format_duration, format_rate};
use std::fmt::Write;
use std::time::Duration;

/// Render run results for the console
///
/// Shows the outcome, counters, rates, per-worker lines when more than one
/// worker ran, and a latency table per recorded statistic.
pub fn render_report(report: &RunReport) -> String {
    let mut out = String::new();
    // Writing to a String cannot fail
    let _ = write_report(&mut out, report);
    out
}

/// Print run results to stdout
pub fn print_report(report: &RunReport) {
    print!("{}", render_report(report));
}

fn write_report(out: &mut String, report: &RunReport) -> std::fmt::Result {
    writeln!(out, "═══════════════════════════════════════════════════════════")?;
    writeln!(out, "                    RUN RESULTS")?;
    writeln!(out, "═══════════════════════════════════════════════════════════")?;
    writeln!(out)?;

    writeln!(out, "Outcome: {}", report.reason)?;
    writeln!(out, "Execution Time: {:.3}s", report.execution_duration.as_secs_f64())?;
    writeln!(out)?;

    let totals = &report.totals;
    writeln!(out, "Requests:")?;
    writeln!(out, "  Started:   {}", format_number(totals.started))?;
    writeln!(out, "  Completed: {}", format_number(totals.completed))?;
    writeln!(out, "  Succeeded: {}", format_number(totals.succeeded))?;
    writeln!(out, "  Failed:    {}", format_number(totals.failed))?;
    if totals.rejected > 0 {
        writeln!(out, "  Rejected:  {}", format_number(totals.rejected))?;
    }
    writeln!(out, "  Rate:      {} completions/s", format_rate(report.completions_per_second))?;
    writeln!(out)?;

    if report.workers.len() > 1 {
        writeln!(out, "Workers:")?;
        for worker in &report.workers {
            writeln!(
                out,
                "  [{}] {:<9} completed={} failed={} rate={}/s",
                worker.worker_id,
                worker.reason,
                format_number(worker.progress.completed),
                format_number(worker.progress.failed),
                format_rate(worker.completions_per_second)
            )?;
        }
        writeln!(out)?;
    }

    if report.statistics.is_empty() {
        writeln!(out, "No statistics collected")?;
    } else {
        writeln!(out, "Statistics:")?;
        for (name, summary) in &report.statistics {
            write_summary(out, name, summary)?;
        }
    }
    writeln!(out)
}

fn write_summary(out: &mut String, name: &str, summary: &StatisticSummary) -> std::fmt::Result {
    writeln!(out, "  {} ({} samples)", name, format_number(summary.count))?;
    if summary.count == 0 {
        return Ok(());
    }
    writeln!(
        out,
        "    min={} mean={} max={} stdev={}",
        nanos(summary.min),
        nanos(summary.mean as u64),
        nanos(summary.max),
        nanos(summary.pstdev as u64)
    )?;
    writeln!(
        out,
        "    p50={} p90={} p99={} p99.9={}",
        nanos(summary.p50),
        nanos(summary.p90),
        nanos(summary.p99),
        nanos(summary.p999)
    )
}

fn nanos(value: u64) -> String {
    format_duration(Duration::from_nanos(value))
}

/// Format a count with thousands separators
pub fn format_number(n: u64) -> String {
    let digits = n.to_string();
    let mut result = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result
}
