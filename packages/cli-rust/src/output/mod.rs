//! Output utilities for CLI commands
//!
//! Terminal output helpers: a spinner that tracks finished hosts, color
//! styling for outcomes and progress lines, and run report rendering.

pub mod colors;
pub mod report;
pub mod spinner;

pub use colors::{outcome_style, progress_style};
pub use report::{report_json, report_table, summary_line};
pub use spinner::CommandSpinner;
