//! Config init subcommand
//!
//! Writes a config file holding the defaults so it can be edited by hand.

use std::path::Path;

use anyhow::{Result, bail};
use console::style;
use fleetrun_core::{DeployConfig, save_config};

pub fn cmd_config_init(path: &Path, force: bool, quiet: bool) -> Result<()> {
    if path.exists() && !force {
        bail!(
            "Config file already exists: {} (use --force to overwrite)",
            path.display()
        );
    }

    save_config(&DeployConfig::default(), path)?;

    if !quiet {
        println!(
            "{} Wrote default config to {}",
            style("\u{2713}").green(),
            style(path.display()).yellow()
        );
        println!();
        println!(
            "  {} Set {} and {} before running {}",
            style("Next:").cyan(),
            style("hosts").bold(),
            style("artifact").bold(),
            style("fleetrun run").green()
        );
    }

    Ok(())
}
