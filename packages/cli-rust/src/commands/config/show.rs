//! Config show subcommand
//!
//! Displays current configuration in table or JSON format.

use std::path::{Path, PathBuf};

use anyhow::Result;
use comfy_table::{Cell, Color, Table};
use fleetrun_core::DeployConfig;

/// Show current configuration
///
/// Unset optional values show as "(not set)" and defaults that will be
/// resolved per host (user, port) say where they come from.
pub fn cmd_config_show(config: &DeployConfig, path: &Path, json: bool, _quiet: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(config)?);
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["Key", "Value"]);

    table.add_row(vec![
        Cell::new("version"),
        Cell::new(config.version.to_string()),
    ]);
    table.add_row(vec![Cell::new("hosts"), Cell::new(format_list(&config.hosts))]);
    table.add_row(vec![
        Cell::new("hosts_file"),
        Cell::new(format_path(config.hosts_file.as_ref())),
    ]);
    table.add_row(vec![
        Cell::new("artifact"),
        match &config.artifact {
            Some(path) if path.is_file() => Cell::new(path.display()).fg(Color::Green),
            Some(path) => Cell::new(path.display()).fg(Color::Red),
            None => Cell::new("(not set)").fg(Color::Yellow),
        },
    ]);
    table.add_row(vec![Cell::new("remote_dir"), Cell::new(&config.remote_dir)]);
    table.add_row(vec![Cell::new("interpreter"), Cell::new(&config.interpreter)]);
    table.add_row(vec![
        Cell::new("script_args"),
        Cell::new(format_list(&config.script_args)),
    ]);
    table.add_row(vec![
        Cell::new("user"),
        Cell::new(format_or(config.user.as_deref(), "(from ssh config)")),
    ]);
    table.add_row(vec![
        Cell::new("port"),
        Cell::new(
            config
                .port
                .map(|p| p.to_string())
                .unwrap_or_else(|| "(from ssh config)".to_string()),
        ),
    ]);
    table.add_row(vec![
        Cell::new("identity_file"),
        Cell::new(format_or(config.identity_file.as_deref(), "(not set)")),
    ]);
    table.add_row(vec![
        Cell::new("jump_host"),
        Cell::new(format_or(config.jump_host.as_deref(), "(not set)")),
    ]);
    table.add_row(vec![
        Cell::new("max_parallel"),
        Cell::new(
            config
                .max_parallel
                .map(|n| n.to_string())
                .unwrap_or_else(|| "(all hosts)".to_string()),
        ),
    ]);
    table.add_row(vec![
        Cell::new("host_timeout"),
        Cell::new(format_or(config.host_timeout.as_deref(), "(none)")),
    ]);
    table.add_row(vec![
        Cell::new("connect_timeout"),
        Cell::new(format!("{}s", config.connect_timeout)),
    ]);
    table.add_row(vec![
        Cell::new("log_dir"),
        Cell::new(format_or(config.log_dir.as_deref(), "(terminal only)")),
    ]);

    println!("{table}");

    println!();
    if path.exists() {
        println!("Config file: {}", path.display());
    } else {
        println!("Config file: {} (not created, showing defaults)", path.display());
    }

    if let Err(e) = config.validate() {
        println!();
        println!("{} {}", console::style("Not ready to run:").yellow(), e);
    }

    Ok(())
}

fn format_or(value: Option<&str>, fallback: &str) -> String {
    match value {
        Some(s) if !s.is_empty() => s.to_string(),
        _ => fallback.to_string(),
    }
}

fn format_path(value: Option<&PathBuf>) -> String {
    value
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "(not set)".to_string())
}

fn format_list(values: &[String]) -> String {
    if values.is_empty() {
        "(none)".to_string()
    } else {
        values.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_or() {
        assert_eq!(format_or(Some("cloud"), "(not set)"), "cloud");
        assert_eq!(format_or(Some(""), "(not set)"), "(not set)");
        assert_eq!(format_or(None, "(none)"), "(none)");
    }

    #[test]
    fn test_format_list() {
        let hosts = vec!["10.0.0.1".to_string(), "10.0.0.2".to_string()];
        assert_eq!(format_list(&hosts), "10.0.0.1, 10.0.0.2");
        assert_eq!(format_list(&[]), "(none)");
    }

    #[test]
    fn test_format_path() {
        assert_eq!(format_path(None), "(not set)");
        assert_eq!(
            format_path(Some(&PathBuf::from("/etc/fleet/hosts"))),
            "/etc/fleet/hosts"
        );
    }

    #[test]
    fn test_show_defaults_does_not_fail() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        assert!(cmd_config_show(&DeployConfig::default(), &path, false, false).is_ok());
        assert!(cmd_config_show(&DeployConfig::default(), &path, true, false).is_ok());
    }
}
