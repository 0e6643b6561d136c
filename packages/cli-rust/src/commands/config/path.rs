//! Config path subcommand

use std::path::Path;

use anyhow::Result;

/// Print the config file location, whether or not it exists yet
pub fn cmd_config_path(path: &Path) -> Result<()> {
    println!("{}", path.display());
    Ok(())
}
