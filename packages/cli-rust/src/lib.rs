//! fleetrun CLI - Run one script on a fleet of hosts at once
//!
//! This module contains the shared CLI implementation used by the binary.

mod commands;
mod output;

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};
use console::style;
use fleetrun_core::{get_version, get_version_long, load_config};
use tracing_subscriber::EnvFilter;

/// Copy a script to many hosts over SSH and run it everywhere at once
#[derive(Parser)]
#[command(name = "fleetrun")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Copy a script to many hosts over SSH and run it everywhere at once", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Config file (default: ~/.config/fleetrun/config.json)
    #[arg(short, long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Increase verbosity level (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Copy the script to every host and run it
    Run(commands::RunArgs),
    /// List the hosts a run would target
    Hosts(commands::HostsArgs),
    /// Manage configuration
    Config(commands::ConfigArgs),
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose, cli.quiet);

    // Configure color output
    if cli.no_color {
        console::set_colors_enabled(false);
        console::set_colors_enabled_stderr(false);
    }

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            display_config_error(&e, cli.config.as_deref());
            std::process::exit(1);
        }
    };

    match cli.command {
        Some(Commands::Run(args)) => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(commands::cmd_run(&args, config, cli.quiet))
        }
        Some(Commands::Hosts(args)) => commands::cmd_hosts(&args, &config, cli.quiet),
        Some(Commands::Config(args)) => {
            commands::cmd_config(args, &config, cli.config.as_deref(), cli.quiet)
        }
        None => {
            // No command - show a welcome message and hint to use --help
            if !cli.quiet {
                let version = if cli.verbose > 0 {
                    get_version_long()
                } else {
                    get_version()
                };
                println!("{} {}", style("fleetrun").cyan().bold(), style(version).dim());
                println!();
                println!("Run {} for available commands.", style("--help").green());
            }
            Ok(())
        }
    }
}

/// Default log filter for a verbosity count
///
/// Quiet wins over verbose.
fn default_filter(verbose: u8, quiet: bool) -> &'static str {
    if quiet {
        return "error";
    }
    match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Send logs to stderr; RUST_LOG overrides the verbosity flags
fn init_tracing(verbose: u8, quiet: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(verbose, quiet)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Display a rich error message for a config file that failed to load
fn display_config_error(err: &anyhow::Error, explicit_path: Option<&Path>) {
    eprintln!("{} Configuration error", style("Error:").red().bold());
    eprintln!();
    eprintln!("  {:#}", err);
    eprintln!();
    let path = explicit_path
        .map(Path::to_path_buf)
        .or_else(fleetrun_core::config::get_config_path);
    if let Some(path) = path {
        eprintln!("  Config file: {}", style(path.display()).yellow());
        eprintln!();
    }
    eprintln!(
        "  {} Check the config file for syntax errors or unknown fields.",
        style("Tip:").cyan()
    );
    eprintln!(
        "  {} Run {} to write a config with every default filled in.",
        style("Tip:").cyan(),
        style("fleetrun config init --config <path>").green()
    );
}
