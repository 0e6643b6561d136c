//! CLI command implementations

mod config;
mod hosts;
mod run;

pub use config::{ConfigArgs, cmd_config};
pub use hosts::{HostsArgs, cmd_hosts};
pub use run::{RunArgs, cmd_run};
