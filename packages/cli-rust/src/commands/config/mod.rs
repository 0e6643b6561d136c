//! Config subcommand implementations
//!
//! Provides `fleetrun config` subcommands for viewing and creating the
//! configuration file.

mod init;
mod path;
mod show;

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Args, Subcommand};
use fleetrun_core::DeployConfig;
use fleetrun_core::config::get_config_path;

pub use init::cmd_config_init;
pub use path::cmd_config_path;
pub use show::cmd_config_show;

/// Configuration command arguments
#[derive(Args)]
pub struct ConfigArgs {
    /// Output as JSON instead of table format
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Option<ConfigSubcommands>,
}

/// Configuration management subcommands
#[derive(Subcommand)]
pub enum ConfigSubcommands {
    /// Show current configuration
    Show {
        /// Output as JSON instead of table format
        #[arg(long)]
        json: bool,
    },
    /// Print the config file location
    Path,
    /// Write a default config file
    Init {
        /// Overwrite an existing file (a .bak copy is kept)
        #[arg(long, short)]
        force: bool,
    },
}

/// Handle config command
///
/// Routes to the appropriate handler based on the subcommand.
/// If no subcommand is given, defaults to Show.
pub fn cmd_config(
    args: ConfigArgs,
    config: &DeployConfig,
    explicit_path: Option<&Path>,
    quiet: bool,
) -> Result<()> {
    let path = resolve_config_path(explicit_path)?;
    match args.command {
        Some(ConfigSubcommands::Show { json }) => cmd_config_show(config, &path, json, quiet),
        Some(ConfigSubcommands::Path) => cmd_config_path(&path),
        Some(ConfigSubcommands::Init { force }) => cmd_config_init(&path, force, quiet),
        None => cmd_config_show(config, &path, args.json, quiet),
    }
}

/// The `--config` path, else the default location
pub fn resolve_config_path(explicit_path: Option<&Path>) -> Result<PathBuf> {
    match explicit_path {
        Some(path) => Ok(path.to_path_buf()),
        None => get_config_path().ok_or_else(|| anyhow::anyhow!("Could not determine config path")),
    }
}
