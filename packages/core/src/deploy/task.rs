//! Per-host deployment pipeline
//!
//! Each host runs: ensure remote directory → copy artifact → run it. A step
//! that fails ends that host's task with a recorded outcome; it never
//! returns an error to the orchestrator and never touches other hosts.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use super::error::DeployError;
use super::outcome::{TaskOutcome, TransferStep};
use super::progress::{ProgressEvent, ProgressReporter};
use crate::host::{Credential, Host, TransportError};
use crate::transport::{Transport, shell_quote};

/// Interpreter used when none is configured
pub const DEFAULT_INTERPRETER: &str = "bash";

/// What gets deployed, where it goes and how it runs
///
/// Shared read-only by every host task of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentPlan {
    artifact: PathBuf,
    remote_dir: String,
    remote_path: String,
    command: String,
    credential: Credential,
    host_timeout: Option<Duration>,
    log_dir: Option<PathBuf>,
}

impl DeploymentPlan {
    /// Plan copying `artifact` into `remote_dir` and running it with the
    /// default interpreter
    ///
    /// The remote file keeps the artifact's file name. A leading `~/` in
    /// `remote_dir` is taken as the login's home directory, which is where
    /// ssh starts remote commands, so it becomes a relative path.
    pub fn new(
        artifact: impl Into<PathBuf>,
        remote_dir: impl Into<String>,
        credential: Credential,
    ) -> Result<Self, DeployError> {
        let artifact = artifact.into();
        let remote_dir = remote_dir.into();

        if remote_dir.trim().is_empty() {
            return Err(DeployError::InvalidConfig(
                "remote directory must not be empty".to_string(),
            ));
        }
        let remote_dir = relative_to_home(&remote_dir);

        let file_name = artifact
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .ok_or_else(|| {
                DeployError::InvalidConfig(format!(
                    "artifact path has no file name: {}",
                    artifact.display()
                ))
            })?;

        let remote_path = if remote_dir.ends_with('/') {
            format!("{remote_dir}{file_name}")
        } else {
            format!("{remote_dir}/{file_name}")
        };

        let command = interpreter_command(DEFAULT_INTERPRETER, &remote_path, &[]);

        Ok(Self {
            artifact,
            remote_dir,
            remote_path,
            command,
            credential,
            host_timeout: None,
            log_dir: None,
        })
    }

    /// Builder pattern: run the artifact as `<interpreter> <remote_path> <args>`
    pub fn with_interpreter(mut self, interpreter: &str, args: &[String]) -> Self {
        self.command = interpreter_command(interpreter, &self.remote_path, args);
        self
    }

    /// Builder pattern: per-host time budget (none by default)
    pub fn with_host_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.host_timeout = timeout;
        self
    }

    /// Builder pattern: write each host's remote output to `<dir>/<host>.log`
    pub fn with_log_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.log_dir = dir;
        self
    }

    pub fn artifact(&self) -> &Path {
        &self.artifact
    }

    pub fn remote_dir(&self) -> &str {
        &self.remote_dir
    }

    pub fn remote_path(&self) -> &str {
        &self.remote_path
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    pub fn host_timeout(&self) -> Option<Duration> {
        self.host_timeout
    }

    pub fn log_dir(&self) -> Option<&Path> {
        self.log_dir.as_deref()
    }

    /// Output log for `host`, when a log directory is set
    pub fn log_file(&self, host: &Host) -> Option<PathBuf> {
        let name: String = host
            .as_str()
            .chars()
            .map(|c| match c {
                '/' | '\\' | ':' => '_',
                c => c,
            })
            .collect();
        self.log_dir
            .as_ref()
            .map(|dir| dir.join(format!("{name}.log")))
    }
}

/// Rewrite `~` and `~/dir` relative to the remote login directory
///
/// Quoting would otherwise stop the remote shell from expanding the tilde.
fn relative_to_home(remote_dir: &str) -> String {
    let rest = match remote_dir.strip_prefix('~') {
        Some("") => "",
        Some(rest) if rest.starts_with('/') => rest.trim_start_matches('/'),
        _ => return remote_dir.to_string(),
    };
    if rest.is_empty() {
        ".".to_string()
    } else {
        rest.to_string()
    }
}

fn interpreter_command(interpreter: &str, remote_path: &str, args: &[String]) -> String {
    // The interpreter may carry its own flags ("sudo bash -e"), so it is not quoted
    let mut command = format!("{} {}", interpreter.trim(), shell_quote(remote_path));
    for arg in args {
        command.push(' ');
        command.push_str(&shell_quote(arg));
    }
    command
}

/// One host's share of a run
#[derive(Debug, Clone)]
pub struct DeploymentTask {
    host: Host,
    plan: Arc<DeploymentPlan>,
}

impl DeploymentTask {
    pub fn new(host: Host, plan: Arc<DeploymentPlan>) -> Self {
        Self { host, plan }
    }

    pub fn host(&self) -> &Host {
        &self.host
    }

    /// Run the pipeline to completion and report the outcome
    pub async fn run(self, transport: &dyn Transport, progress: &ProgressReporter) -> TaskOutcome {
        let outcome = self.pipeline(transport, progress).await;

        if outcome.is_success() {
            tracing::info!(host = %self.host, "Deployment succeeded");
        }
        progress.emit(ProgressEvent::Finished {
            outcome: outcome.clone(),
        });
        outcome
    }

    async fn pipeline(&self, transport: &dyn Transport, progress: &ProgressReporter) -> TaskOutcome {
        let host = &self.host;
        let plan = &self.plan;
        let credential = plan.credential();
        let deadline = plan
            .host_timeout()
            .map(|budget| (Instant::now() + budget, budget));

        progress.emit(ProgressEvent::Processing { host: host.clone() });

        let ensured = bounded(
            deadline,
            transport.ensure_remote_directory(host, credential, plan.remote_dir()),
        )
        .await;
        if let Err(err) = ensured {
            tracing::error!(host = %host, "Failed to create {}: {}", plan.remote_dir(), err);
            return TaskOutcome::TransferFailed {
                host: host.clone(),
                step: TransferStep::Directory,
                cause: err.to_string(),
            };
        }

        progress.emit(ProgressEvent::Copying { host: host.clone() });
        let copied = bounded(
            deadline,
            transport.copy_artifact(host, credential, plan.artifact(), plan.remote_path()),
        )
        .await;
        if let Err(err) = copied {
            tracing::error!(host = %host, "Failed to copy script: {}", err);
            return TaskOutcome::TransferFailed {
                host: host.clone(),
                step: TransferStep::Copy,
                cause: err.to_string(),
            };
        }
        progress.emit(ProgressEvent::Copied { host: host.clone() });

        progress.emit(ProgressEvent::Executing { host: host.clone() });
        let log_file = plan.log_file(host);
        let executed = bounded(
            deadline,
            transport.run_remote_command(host, credential, plan.command(), log_file.as_deref()),
        )
        .await;
        match executed {
            Ok(()) => TaskOutcome::Succeeded { host: host.clone() },
            Err(err) => {
                tracing::error!(host = %host, "Script execution failed: {}", err);
                TaskOutcome::ExecutionFailed {
                    host: host.clone(),
                    exit_code: err.exit_code(),
                    cause: err.to_string(),
                }
            }
        }
    }
}

/// Await a transport step, bounded by the host's deadline when one is set
async fn bounded<F>(deadline: Option<(Instant, Duration)>, step: F) -> Result<(), TransportError>
where
    F: Future<Output = Result<(), TransportError>>,
{
    match deadline {
        None => step.await,
        Some((at, budget)) => tokio::time::timeout_at(at, step)
            .await
            .unwrap_or(Err(TransportError::TimedOut(budget))),
    }
}
