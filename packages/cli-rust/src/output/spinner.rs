//! Run spinner with host progress and elapsed time
//!
//! Shows how many hosts have finished while the deployment is pending and
//! keeps progress lines printed above the animated line.

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// A spinner for a running deployment
///
/// It respects quiet mode by becoming a no-op when quiet is enabled.
///
/// # Example
///
/// ```ignore
/// let spinner = CommandSpinner::new_maybe("Deploying...", quiet);
/// spinner.set_progress(2, 5);
/// spinner.println("Script executed successfully on db-1");
/// spinner.success("5/5 hosts finished");
/// ```
pub struct CommandSpinner {
    bar: Option<ProgressBar>,
}

impl CommandSpinner {
    /// Create a new spinner with the given message
    ///
    /// Ticks every 100ms and shows: `spinner message (HH:MM:SS)`
    pub fn new(message: &str) -> Self {
        let style = ProgressStyle::with_template("{spinner:.green} {msg} ({elapsed_precise:.dim})")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("\u{28CB}\u{2819}\u{2839}\u{2838}\u{283C}\u{2834}\u{2826}\u{2827}\u{2807}\u{280F}");

        let bar = ProgressBar::new_spinner();
        bar.set_style(style);
        bar.set_message(message.to_string());
        bar.enable_steady_tick(Duration::from_millis(100));
        Self { bar: Some(bar) }
    }

    /// Create a spinner that respects quiet mode
    pub fn new_maybe(message: &str, quiet: bool) -> Self {
        if quiet {
            Self { bar: None }
        } else {
            Self::new(message)
        }
    }

    /// Update the spinner message
    pub fn update(&self, message: &str) {
        if let Some(ref bar) = self.bar {
            bar.set_message(message.to_string());
        }
    }

    /// Show "N/M hosts finished"
    pub fn set_progress(&self, finished: usize, total: usize) {
        self.update(&progress_message(finished, total));
    }

    /// Print a line to stdout above the spinner
    pub fn println(&self, line: &str) {
        match self.bar {
            Some(ref bar) => bar.suspend(|| println!("{line}")),
            None => println!("{line}"),
        }
    }

    /// Finish the spinner with a success message (green checkmark)
    pub fn success(self, message: &str) {
        if let Some(bar) = self.bar {
            bar.finish_with_message(format!(
                "{} {}",
                console::style("\u{2713}").green(),
                message
            ));
        }
    }

    /// Finish the spinner with a failure message (red X)
    pub fn fail(self, message: &str) {
        if let Some(bar) = self.bar {
            bar.finish_with_message(format!("{} {}", console::style("\u{2717}").red(), message));
        }
    }
}

/// Text shown while waiting on the remaining hosts
pub fn progress_message(finished: usize, total: usize) -> String {
    format!("{finished}/{total} hosts finished")
}
