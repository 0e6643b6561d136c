//! Configuration management for fleetrun
//!
//! Handles loading, saving, and validating the JSONC configuration file.

pub mod paths;
pub mod schema;

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use jsonc_parser::parse_to_serde_value;

pub use paths::{get_config_dir, get_config_path, get_hosts_path};
pub use schema::{DeployConfig, expand_home};

/// Ensure the config directory exists
///
/// Creates `~/.config/fleetrun/` if it doesn't exist.
/// Returns the path to the config directory.
pub fn ensure_config_dir() -> Result<PathBuf> {
    let config_dir =
        get_config_dir().ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;

    if !config_dir.exists() {
        fs::create_dir_all(&config_dir).with_context(|| {
            format!(
                "Failed to create config directory: {}",
                config_dir.display()
            )
        })?;
        tracing::info!("Created config directory: {}", config_dir.display());
    }

    Ok(config_dir)
}

/// Load configuration
///
/// With an explicit `path` the file must exist. Without one, the default
/// location is used and a missing file yields the default config.
/// Supports JSONC (JSON with comments), so a host can be disabled by
/// commenting out its line. Rejects unknown fields for strict validation.
pub fn load_config(path: Option<&Path>) -> Result<DeployConfig> {
    let config_path = match path {
        Some(path) => path.to_path_buf(),
        None => {
            let default_path = get_config_path()
                .ok_or_else(|| anyhow::anyhow!("Could not determine config file path"))?;
            if !default_path.exists() {
                tracing::debug!(
                    "Config file not found, using defaults: {}",
                    default_path.display()
                );
                return Ok(DeployConfig::default());
            }
            default_path
        }
    };

    let mut file = File::open(&config_path)
        .with_context(|| format!("Failed to open config file: {}", config_path.display()))?;

    let mut contents = String::new();
    file.read_to_string(&mut contents)
        .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

    let config = parse_config(&contents).with_context(|| {
        format!(
            "Invalid configuration in {}. Check for unknown fields or invalid values.",
            config_path.display()
        )
    })?;

    tracing::debug!("Loaded config from: {}", config_path.display());
    Ok(config)
}

/// Parse JSONC config text
pub fn parse_config(contents: &str) -> Result<DeployConfig> {
    let parsed_value = parse_to_serde_value(contents, &Default::default())
        .map_err(|e| anyhow::anyhow!("Invalid JSONC in config file: {}", e))?
        .ok_or_else(|| anyhow::anyhow!("Config file is empty"))?;

    // deny_unknown_fields rejects unknown keys here
    let config: DeployConfig = serde_json::from_value(parsed_value)?;
    Ok(config)
}

/// Save configuration to `path`
///
/// Creates a backup of an existing file (config.json.bak) before overwriting
/// and creates the parent directory if needed.
pub fn save_config(config: &DeployConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
    }

    if path.exists() {
        let backup_path = path.with_extension("json.bak");
        fs::copy(path, &backup_path)
            .with_context(|| format!("Failed to create backup at: {}", backup_path.display()))?;
        tracing::debug!("Created config backup: {}", backup_path.display());
    }

    let json = serde_json::to_string_pretty(config).context("Failed to serialize configuration")?;

    let mut file = File::create(path)
        .with_context(|| format!("Failed to create config file: {}", path.display()))?;

    file.write_all(json.as_bytes())
        .with_context(|| format!("Failed to write config file: {}", path.display()))?;

    tracing::debug!("Saved config to: {}", path.display());

    Ok(())
}
