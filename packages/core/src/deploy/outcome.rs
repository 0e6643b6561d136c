//! Per-host outcomes and the run report

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::host::Host;
use crate::version::get_version;

/// Transfer step that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferStep {
    /// Creating the remote directory
    Directory,
    /// Copying the artifact
    Copy,
}

impl fmt::Display for TransferStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferStep::Directory => write!(f, "remote directory"),
            TransferStep::Copy => write!(f, "copy"),
        }
    }
}

/// Result of one host's deployment task
///
/// Produced exactly once per host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TaskOutcome {
    /// Directory creation or artifact copy failed; nothing was executed
    TransferFailed {
        host: Host,
        step: TransferStep,
        cause: String,
    },
    /// The artifact was copied but running it failed
    ExecutionFailed {
        host: Host,
        exit_code: Option<i32>,
        cause: String,
    },
    /// The artifact was copied and exited zero
    Succeeded { host: Host },
}

impl TaskOutcome {
    pub fn host(&self) -> &Host {
        match self {
            TaskOutcome::TransferFailed { host, .. }
            | TaskOutcome::ExecutionFailed { host, .. }
            | TaskOutcome::Succeeded { host } => host,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, TaskOutcome::Succeeded { .. })
    }

    pub fn exit_code(&self) -> Option<i32> {
        match self {
            TaskOutcome::ExecutionFailed { exit_code, .. } => *exit_code,
            TaskOutcome::Succeeded { .. } => Some(0),
            TaskOutcome::TransferFailed { .. } => None,
        }
    }

    /// Short status label ("succeeded", "transfer failed", ...)
    pub fn label(&self) -> &'static str {
        match self {
            TaskOutcome::TransferFailed { .. } => "transfer failed",
            TaskOutcome::ExecutionFailed { .. } => "execution failed",
            TaskOutcome::Succeeded { .. } => "succeeded",
        }
    }

    /// Failure cause, empty on success
    pub fn cause(&self) -> &str {
        match self {
            TaskOutcome::TransferFailed { cause, .. }
            | TaskOutcome::ExecutionFailed { cause, .. } => cause,
            TaskOutcome::Succeeded { .. } => "",
        }
    }
}

/// One row of the run report
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportEntry {
    #[serde(flatten)]
    pub outcome: TaskOutcome,
    /// Wall-clock time the host task took
    #[serde(rename = "elapsed_ms", serialize_with = "serialize_millis")]
    pub elapsed: Duration,
    /// Remote output log, when one was written
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_file: Option<PathBuf>,
}

impl ReportEntry {
    pub fn new(outcome: TaskOutcome, elapsed: Duration) -> Self {
        Self {
            outcome,
            elapsed,
            log_file: None,
        }
    }

    /// Builder pattern: record where the host's output was logged
    pub fn with_log_file(mut self, log_file: Option<PathBuf>) -> Self {
        self.log_file = log_file;
        self
    }
}

fn serialize_millis<S: serde::Serializer>(value: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
}

/// Outcome of every host in a run, in configured host order
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// fleetrun version that ran the deployment
    pub version: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    entries: Vec<ReportEntry>,
}

impl RunReport {
    /// Build the report from collected results
    ///
    /// Entries follow `hosts` order. A host with no collected result gets an
    /// `ExecutionFailed` entry so the report always covers every host.
    pub fn assemble(
        hosts: &[Host],
        mut results: HashMap<Host, ReportEntry>,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
    ) -> Self {
        let entries = hosts
            .iter()
            .map(|host| {
                results.remove(host).unwrap_or_else(|| {
                    ReportEntry::new(
                        TaskOutcome::ExecutionFailed {
                            host: host.clone(),
                            exit_code: None,
                            cause: "deployment task did not report an outcome".to_string(),
                        },
                        Duration::ZERO,
                    )
                })
            })
            .collect();

        Self {
            version: get_version(),
            started_at,
            finished_at,
            entries,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[ReportEntry] {
        &self.entries
    }

    pub fn outcomes(&self) -> impl Iterator<Item = &TaskOutcome> {
        self.entries.iter().map(|entry| &entry.outcome)
    }

    /// Outcome recorded for `host`
    pub fn get(&self, host: &Host) -> Option<&TaskOutcome> {
        self.outcomes().find(|outcome| outcome.host() == host)
    }

    pub fn succeeded_count(&self) -> usize {
        self.outcomes().filter(|o| o.is_success()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.len() - self.succeeded_count()
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed_count() == 0
    }

    pub fn failed_hosts(&self) -> Vec<&Host> {
        self.outcomes()
            .filter(|o| !o.is_success())
            .map(TaskOutcome::host)
            .collect()
    }

    /// Wall-clock duration of the whole run
    pub fn elapsed(&self) -> Duration {
        (self.finished_at - self.started_at)
            .to_std()
            .unwrap_or_default()
    }
}
