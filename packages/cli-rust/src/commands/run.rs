//! Run command implementation
//!
//! Copies the configured script to every host and runs it on all of them
//! at once, streaming per-host progress and ending with a run report.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Result, bail};
use clap::Args;
use console::style;
use fleetrun_core::{DeployConfig, OpenSshTransport, Orchestrator, ProgressEvent, ProgressReporter};

use crate::output::spinner::progress_message;
use crate::output::{CommandSpinner, outcome_style, progress_style, report_json, report_table, summary_line};

/// Arguments for the run command
///
/// Every flag overrides the matching config file value.
#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Host to deploy to (repeatable; replaces configured hosts)
    #[arg(long = "host", value_name = "HOST")]
    pub hosts: Vec<String>,

    /// Host list file, one host per line, '#' comments a host out
    #[arg(long, value_name = "PATH")]
    pub hosts_file: Option<PathBuf>,

    /// Local script to copy and run
    #[arg(short, long, value_name = "PATH")]
    pub artifact: Option<PathBuf>,

    /// Remote directory the script is copied into
    #[arg(long, value_name = "DIR")]
    pub remote_dir: Option<String>,

    /// SSH user for every host
    #[arg(short, long)]
    pub user: Option<String>,

    /// Private key for every host
    #[arg(short, long, value_name = "PATH")]
    pub identity_file: Option<String>,

    /// SSH port for every host
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Jump host (user@host:port)
    #[arg(short = 'J', long, value_name = "HOST")]
    pub jump_host: Option<String>,

    /// Interpreter the script is run with
    #[arg(long)]
    pub interpreter: Option<String>,

    /// Argument passed to the script (repeatable)
    #[arg(long = "arg", value_name = "ARG", allow_hyphen_values = true)]
    pub script_args: Vec<String>,

    /// Maximum hosts worked on at once
    #[arg(long, value_name = "N")]
    pub max_parallel: Option<usize>,

    /// Per-host time budget, e.g. "10m"
    #[arg(long, value_name = "DURATION")]
    pub timeout: Option<String>,

    /// SSH connect timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub connect_timeout: Option<u32>,

    /// Write each host's remote output to DIR/<host>.log
    #[arg(long, value_name = "DIR")]
    pub log_dir: Option<String>,

    /// Print the run report as JSON
    #[arg(long)]
    pub json: bool,
}

/// Layer command line flags over the loaded config
///
/// Either host flag replaces both configured host sources.
pub fn apply_overrides(args: &RunArgs, mut config: DeployConfig) -> DeployConfig {
    if !args.hosts.is_empty() || args.hosts_file.is_some() {
        config.hosts = args.hosts.clone();
        config.hosts_file = args.hosts_file.clone();
    }
    if let Some(artifact) = &args.artifact {
        config.artifact = Some(artifact.clone());
    }
    if let Some(dir) = &args.remote_dir {
        config.remote_dir = dir.clone();
    }
    if let Some(user) = &args.user {
        config.user = Some(user.clone());
    }
    if let Some(key) = &args.identity_file {
        config.identity_file = Some(key.clone());
    }
    if let Some(port) = args.port {
        config.port = Some(port);
    }
    if let Some(jump) = &args.jump_host {
        config.jump_host = Some(jump.clone());
    }
    if let Some(interpreter) = &args.interpreter {
        config.interpreter = interpreter.clone();
    }
    if !args.script_args.is_empty() {
        config.script_args = args.script_args.clone();
    }
    if args.max_parallel.is_some() {
        config.max_parallel = args.max_parallel;
    }
    if let Some(timeout) = &args.timeout {
        config.host_timeout = Some(timeout.clone());
    }
    if let Some(secs) = args.connect_timeout {
        config.connect_timeout = secs;
    }
    if let Some(dir) = &args.log_dir {
        config.log_dir = Some(dir.clone());
    }
    config
}

/// Where progress lines go
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProgressOutput {
    /// Styled lines on stdout above the spinner
    Terminal,
    /// Plain lines on stderr, stdout is reserved for JSON
    Stderr,
    /// Failures only, on stderr
    FailuresOnly,
}

/// Prints progress events as they arrive and counts finished hosts
struct ProgressPrinter {
    spinner: CommandSpinner,
    output: ProgressOutput,
    total: usize,
    finished: usize,
}

impl ProgressPrinter {
    fn new(total: usize, quiet: bool, json: bool) -> Self {
        let output = match (quiet, json) {
            (true, _) => ProgressOutput::FailuresOnly,
            (false, true) => ProgressOutput::Stderr,
            (false, false) => ProgressOutput::Terminal,
        };
        let spinner = CommandSpinner::new_maybe(
            &progress_message(0, total),
            output != ProgressOutput::Terminal,
        );
        Self {
            spinner,
            output,
            total,
            finished: 0,
        }
    }

    fn handle(&mut self, event: &ProgressEvent) {
        if matches!(event, ProgressEvent::Finished { .. }) {
            self.finished += 1;
            self.spinner.set_progress(self.finished, self.total);
        }

        match self.output {
            ProgressOutput::Terminal => self.spinner.println(&progress_style(event).to_string()),
            ProgressOutput::Stderr => eprintln!("{event}"),
            ProgressOutput::FailuresOnly if event.is_failure() => eprintln!("{event}"),
            ProgressOutput::FailuresOnly => {}
        }
    }
}

/// Printed once every host has finished
const COMPLETION_NOTICE: &str = "Deployment and parallel execution completed on all hosts.";

/// How the finished run is reported
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CompletionOutput {
    /// Notice on stderr, report JSON on stdout
    Json,
    /// Report JSON on stdout, nothing else
    JsonOnly,
    /// Notice, table and summary on stdout
    Table,
    Silent,
}

fn completion_output(quiet: bool, json: bool) -> CompletionOutput {
    match (quiet, json) {
        (false, true) => CompletionOutput::Json,
        (true, true) => CompletionOutput::JsonOnly,
        (false, false) => CompletionOutput::Table,
        (true, false) => CompletionOutput::Silent,
    }
}

/// Run the deployment
pub async fn cmd_run(args: &RunArgs, config: DeployConfig, quiet: bool) -> Result<()> {
    let config = apply_overrides(args, config);
    let deployment = config.to_deployment()?;
    let total = deployment.hosts().len();

    tracing::debug!(
        hosts = total,
        artifact = %deployment.plan().artifact().display(),
        remote_path = deployment.plan().remote_path(),
        "Starting deployment"
    );

    let transport = Arc::new(OpenSshTransport::new().with_connect_timeout(config.connect_timeout));
    let (reporter, mut rx) = ProgressReporter::channel();
    let orchestrator = Orchestrator::new(deployment, transport).with_progress(reporter);

    let mut printer = ProgressPrinter::new(total, quiet, args.json);

    let run = orchestrator.run();
    tokio::pin!(run);
    let result = loop {
        tokio::select! {
            result = &mut run => break result,
            Some(event) = rx.recv() => printer.handle(&event),
        }
    };
    while let Ok(event) = rx.try_recv() {
        printer.handle(&event);
    }

    let report = match result {
        Ok(report) => report,
        Err(err) => {
            printer.spinner.fail("Deployment aborted");
            return Err(err.into());
        }
    };
    printer.spinner.success(&progress_message(total, total));

    match completion_output(quiet, args.json) {
        CompletionOutput::Json => {
            eprintln!("{COMPLETION_NOTICE}");
            println!("{}", report_json(&report)?);
        }
        CompletionOutput::Table => {
            println!("{COMPLETION_NOTICE}");
            println!();
            println!("{}", report_table(&report));
            println!();
            println!("{}", summary_line(&report));
        }
        CompletionOutput::JsonOnly => println!("{}", report_json(&report)?),
        CompletionOutput::Silent => {}
    }

    if !report.all_succeeded() {
        if !quiet && !args.json {
            eprintln!();
            for entry in report.entries().iter().filter(|e| !e.outcome.is_success()) {
                let outcome = &entry.outcome;
                eprintln!(
                    "  {} {}: {}",
                    outcome_style(outcome),
                    style(outcome.host()).bold(),
                    outcome.cause()
                );
                if let Some(log) = &entry.log_file {
                    eprintln!("      output: {}", style(log.display()).dim());
                }
            }
        }
        bail!("{} of {} hosts failed", report.failed_count(), report.len());
    }

    Ok(())
}
