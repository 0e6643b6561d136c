//! Color utilities for CLI output
//!
//! Consistent styling for host outcomes and progress lines.

use console::{Style, StyledObject};
use fleetrun_core::{ProgressEvent, TaskOutcome};

/// Style an outcome's status label
///
/// - succeeded -> green bold
/// - execution failed -> red
/// - transfer failed -> yellow
pub fn outcome_style(outcome: &TaskOutcome) -> StyledObject<&'static str> {
    let style = match outcome {
        TaskOutcome::Succeeded { .. } => Style::new().green().bold(),
        TaskOutcome::ExecutionFailed { .. } => Style::new().red(),
        TaskOutcome::TransferFailed { .. } => Style::new().yellow(),
    };
    style.apply_to(outcome.label())
}

/// Style a progress line
///
/// Failures are red, success is green, intermediate steps are dim.
pub fn progress_style(event: &ProgressEvent) -> StyledObject<String> {
    let style = match event {
        ProgressEvent::Finished { outcome } if outcome.is_success() => Style::new().green(),
        ProgressEvent::Finished { .. } => Style::new().red(),
        ProgressEvent::Processing { .. } => Style::new().bold(),
        _ => Style::new().dim(),
    };
    style.apply_to(event.to_string())
}
