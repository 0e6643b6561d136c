//! XDG-compliant path resolution for fleetrun
//!
//! Provides consistent path resolution across platforms:
//! - Linux/macOS: ~/.config/fleetrun/
//! - Windows: %APPDATA%\fleetrun\

use std::path::PathBuf;

/// Get the configuration directory path
///
/// Returns the directory where config.json should be stored:
/// - Linux: `~/.config/fleetrun/`
/// - macOS: `~/.config/fleetrun/` (XDG-style, not ~/Library)
/// - Windows: `%APPDATA%\fleetrun\`
pub fn get_config_dir() -> Option<PathBuf> {
    #[cfg(any(target_os = "linux", target_os = "macos"))]
    {
        directories::BaseDirs::new().map(|dirs| dirs.home_dir().join(".config").join("fleetrun"))
    }
    #[cfg(target_os = "windows")]
    {
        directories::BaseDirs::new()
            .map(|dirs| dirs.config_dir().to_path_buf())
            .map(|d| d.join("fleetrun"))
    }
    #[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
    {
        None
    }
}

/// Get the full path to the config file
///
/// Returns: `{config_dir}/config.json`
pub fn get_config_path() -> Option<PathBuf> {
    get_config_dir().map(|d| d.join("config.json"))
}

/// Get the full path to the default host list
///
/// Returns: `{config_dir}/hosts`
pub fn get_hosts_path() -> Option<PathBuf> {
    get_config_dir().map(|d| d.join("hosts"))
}
