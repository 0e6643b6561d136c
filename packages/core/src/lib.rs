//! fleetrun-core - Core library for fleetrun
//!
//! Copies one script to a set of hosts and runs it on all of them at once:
//! host inventory, SSH transport, and the fan-out/fan-in orchestrator that
//! produces a per-host run report.

pub mod config;
pub mod deploy;
pub mod host;
pub mod transport;
pub mod version;

// Re-export commonly used items for Rust consumers
pub use config::{DeployConfig, load_config, save_config};
pub use deploy::{
    DeployError, Deployment, DeploymentPlan, Orchestrator, ProgressEvent, ProgressReporter,
    RunReport, TaskOutcome,
};
pub use host::{Credential, Host, TransportError};
pub use transport::{OpenSshTransport, Transport};
pub use version::{get_version, get_version_long};
