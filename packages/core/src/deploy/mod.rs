//! Deploy-and-execute module
//!
//! Copies one artifact to every host and runs it there, all hosts at once:
//! - Deployment plan and per-host pipeline
//! - Fan-out orchestrator with a join over every host
//! - Per-host outcomes, run report and progress events

mod error;
mod orchestrator;
mod outcome;
mod progress;
mod task;

// Public exports
pub use error::DeployError;
pub use orchestrator::{Deployment, Orchestrator, validate_artifact, validate_identity_file};
pub use outcome::{ReportEntry, RunReport, TaskOutcome, TransferStep};
pub use progress::{ProgressEvent, ProgressReceiver, ProgressReporter};
pub use task::{DEFAULT_INTERPRETER, DeploymentPlan, DeploymentTask};
