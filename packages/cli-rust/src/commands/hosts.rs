//! fleetrun hosts - List the hosts a run would target

use anyhow::Result;
use clap::Args;
use comfy_table::{Cell, Color, Table};
use console::style;
use fleetrun_core::DeployConfig;
use fleetrun_core::config::get_hosts_path;
use fleetrun_core::host::{
    EffectiveLogin, SettingSource, SshConfigMatch, effective_login, find_duplicate,
    get_ssh_config_path, query_ssh_config,
};

/// Arguments for the hosts command
#[derive(Args, Debug, Default)]
pub struct HostsArgs {
    /// Show only host names (for scripting)
    #[arg(long)]
    pub names_only: bool,
}

pub fn cmd_hosts(args: &HostsArgs, config: &DeployConfig, quiet: bool) -> Result<()> {
    let hosts = config.active_hosts()?;

    if hosts.is_empty() {
        if !quiet && !args.names_only {
            println!("No hosts configured.");
            println!();
            println!(
                "  {} {}",
                style("Add hosts to:").dim(),
                style(
                    get_hosts_path()
                        .map(|p| p.display().to_string())
                        .unwrap_or_else(|| "~/.config/fleetrun/hosts".to_string())
                )
                .yellow()
            );
        }
        return Ok(());
    }

    // Names only mode (for scripting)
    if args.names_only || quiet {
        for host in &hosts {
            println!("{host}");
        }
        return Ok(());
    }

    let credential = config.credential();
    let mut table = Table::new();
    table.set_header(vec!["Host", "HostName", "User", "Port", "Identity", "Jump"]);

    for host in &hosts {
        let found = query_ssh_config(host.as_str()).unwrap_or_else(|e| {
            tracing::warn!("{e}");
            SshConfigMatch::default()
        });
        table.add_row(login_row(&effective_login(host, &credential, &found)));
    }

    println!("{table}");

    if let Some(dup) = find_duplicate(&hosts) {
        println!();
        println!(
            "  {} {} is listed more than once; runs will be rejected",
            style("Warning:").yellow().bold(),
            style(dup).yellow()
        );
    }

    println!();
    println!(
        "  {} {} hosts",
        style("Total:").dim(),
        style(hosts.len()).cyan()
    );
    if let Some(path) = get_ssh_config_path().filter(|p| p.exists()) {
        println!(
            "  {} {}",
            style("SSH config:").dim(),
            style(path.display()).dim()
        );
    }

    Ok(())
}

/// Table row for one resolved login
///
/// Users coming from ~/.ssh/config are cyan, client defaults are dim.
fn login_row(login: &EffectiveLogin) -> Vec<Cell> {
    let user = match login.user_source {
        SettingSource::Explicit => Cell::new(&login.user),
        SettingSource::SshConfig => Cell::new(&login.user).fg(Color::Cyan),
        SettingSource::Default => Cell::new(&login.user).fg(Color::DarkGrey),
    };

    vec![
        Cell::new(&login.host),
        Cell::new(&login.host_name),
        user,
        Cell::new(login.port),
        Cell::new(format_optional(login.identity_file.as_deref())),
        Cell::new(format_optional(login.jump_host.as_deref())),
    ]
}

fn format_optional(value: Option<&str>) -> String {
    match value {
        Some(s) if !s.is_empty() => s.to_string(),
        _ => "-".to_string(),
    }
}
