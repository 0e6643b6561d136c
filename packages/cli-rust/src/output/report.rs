//! Run report rendering
//!
//! Summary table for humans, JSON for scripts.

use std::time::Duration;

use anyhow::Result;
use comfy_table::{Cell, Color, Table};
use fleetrun_core::{RunReport, TaskOutcome};

/// Build the per-host summary table
pub fn report_table(report: &RunReport) -> Table {
    let mut table = Table::new();
    table.set_header(vec!["Host", "Status", "Exit", "Elapsed", "Cause"]);

    for entry in report.entries() {
        let outcome = &entry.outcome;
        table.add_row(vec![
            Cell::new(outcome.host()),
            Cell::new(outcome.label()).fg(status_color(outcome)),
            Cell::new(format_exit_code(outcome.exit_code())),
            Cell::new(format_elapsed(entry.elapsed)),
            Cell::new(outcome.cause()),
        ]);
    }

    table
}

/// Serialize the report as pretty JSON
pub fn report_json(report: &RunReport) -> Result<String> {
    Ok(serde_json::to_string_pretty(report)?)
}

/// One-line summary, e.g. "4 of 5 hosts succeeded in 12s 40ms"
pub fn summary_line(report: &RunReport) -> String {
    format!(
        "{} of {} hosts succeeded in {}",
        report.succeeded_count(),
        report.len(),
        format_elapsed(report.elapsed())
    )
}

fn status_color(outcome: &TaskOutcome) -> Color {
    match outcome {
        TaskOutcome::Succeeded { .. } => Color::Green,
        TaskOutcome::ExecutionFailed { .. } => Color::Red,
        TaskOutcome::TransferFailed { .. } => Color::Yellow,
    }
}

fn format_exit_code(code: Option<i32>) -> String {
    code.map(|c| c.to_string()).unwrap_or_else(|| "-".to_string())
}

/// Millisecond precision is plenty for a human reading the table
fn format_elapsed(elapsed: Duration) -> String {
    let millis = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
    humantime::format_duration(Duration::from_millis(millis)).to_string()
}
