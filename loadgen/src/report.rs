//! Human-readable rendering of a [`Report`].

use yansi::Paint;

use crate::population::RunResult;
use crate::stats::{LabelReport, LatencySummary, Report};

/// Prints the final statistics of a run to stdout.
pub fn print_run(result: &RunResult) {
    print_report(&result.report);

    println!();
    print!(
        "{} {} users stopped",
        "## SHUTDOWN".bold(),
        result.stopped.bold()
    );
    if result.abandoned > 0 {
        print!(
            ", {}",
            format!("{} ABANDONED", result.abandoned).bold().red()
        );
    }
    println!();
}

/// Prints per-label and total statistics to stdout.
pub fn print_report(report: &Report) {
    for (label, stats) in &report.labels {
        println!();
        println!("{} {}", "##".bold(), label.bold().blue());
        print_label(stats);
    }

    println!();
    println!("{} (elapsed: {:.2?})", "## TOTALS".bold(), report.elapsed);
    print_label(&report.total);
}

fn print_label(stats: &LabelReport) {
    print!("{} ({} ops", "REQUESTS:".bold().green(), stats.executions.bold());
    if stats.failures > 0 {
        print!(
            ", {}",
            format!("{} FAILURES", stats.failures).bold().red()
        );
    }
    println!(")");
    println!("  {:.2} operations/s", stats.ops_per_sec.bold());

    if let Some(latency) = &stats.latency {
        print_latency(latency);
    }

    for error in &stats.errors {
        println!("  {} {error}", "error:".red());
    }
}

fn print_latency(latency: &LatencySummary) {
    println!(
        "  avg: {:.2?}; p50: {:.2?}; p90: {:.2?}; p99: {:.2?}; max: {:.2?}",
        latency.avg.bold(),
        latency.p50,
        latency.p90,
        latency.p99,
        latency.max,
    );
}
