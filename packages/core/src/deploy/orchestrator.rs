//! Parallel fan-out orchestrator
//!
//! Spawns one task per host on a `JoinSet`, then joins every one of them.
//! The report is assembled only after the last task has finished.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use super::error::DeployError;
use super::outcome::{ReportEntry, RunReport, TaskOutcome};
use super::progress::{ProgressEvent, ProgressReporter};
use super::task::{DeploymentPlan, DeploymentTask};
use crate::host::{Credential, Host, find_duplicate};
use crate::transport::Transport;

/// A validated deployment: which hosts, and what to do on each
#[derive(Debug, Clone)]
pub struct Deployment {
    hosts: Arc<[Host]>,
    plan: Arc<DeploymentPlan>,
    max_parallel: Option<usize>,
}

impl Deployment {
    /// Pair a host set with a plan
    ///
    /// Rejects an empty host set and hosts listed more than once, since the
    /// report keys outcomes by host.
    pub fn new(hosts: Vec<Host>, plan: DeploymentPlan) -> Result<Self, DeployError> {
        if hosts.is_empty() {
            return Err(DeployError::InvalidConfig("no hosts configured".to_string()));
        }
        if let Some(dup) = find_duplicate(&hosts) {
            return Err(DeployError::InvalidConfig(format!(
                "host listed more than once: {dup}"
            )));
        }

        Ok(Self {
            hosts: hosts.into(),
            plan: Arc::new(plan),
            max_parallel: None,
        })
    }

    /// Builder pattern: cap how many hosts are worked on at once
    pub fn with_max_parallel(mut self, limit: Option<usize>) -> Result<Self, DeployError> {
        if limit == Some(0) {
            return Err(DeployError::InvalidConfig(
                "max_parallel must be at least 1".to_string(),
            ));
        }
        self.max_parallel = limit;
        Ok(self)
    }

    pub fn hosts(&self) -> &[Host] {
        &self.hosts
    }

    pub fn plan(&self) -> &DeploymentPlan {
        &self.plan
    }

    pub fn max_parallel(&self) -> Option<usize> {
        self.max_parallel
    }
}

/// Runs a deployment on every host concurrently
pub struct Orchestrator {
    deployment: Deployment,
    transport: Arc<dyn Transport>,
    progress: ProgressReporter,
}

impl Orchestrator {
    pub fn new(deployment: Deployment, transport: Arc<dyn Transport>) -> Self {
        Self {
            deployment,
            transport,
            progress: ProgressReporter::disabled(),
        }
    }

    /// Builder pattern: publish per-host progress to `progress`
    pub fn with_progress(mut self, progress: ProgressReporter) -> Self {
        self.progress = progress;
        self
    }

    pub fn deployment(&self) -> &Deployment {
        &self.deployment
    }

    /// Deploy to every host and wait for all of them
    ///
    /// Fails only when a local input is unusable (the artifact, the identity
    /// file or the log directory), and then before any host is contacted.
    /// Every other failure is recorded per host in the report.
    pub async fn run(&self) -> Result<RunReport, DeployError> {
        let hosts = &self.deployment.hosts;
        let plan = &self.deployment.plan;

        validate_artifact(plan.artifact())?;
        validate_identity_file(plan.credential())?;
        if let Some(dir) = plan.log_dir() {
            prepare_log_dir(dir)?;
        }

        tracing::info!(
            "Deploying {} to {} host(s)",
            plan.artifact().display(),
            hosts.len()
        );

        let started_at = Utc::now();
        let limiter = self
            .deployment
            .max_parallel
            .map(|limit| Arc::new(Semaphore::new(limit)));

        let mut units = JoinSet::new();
        let mut host_by_task = HashMap::with_capacity(hosts.len());

        for host in hosts.iter() {
            let task = DeploymentTask::new(host.clone(), Arc::clone(plan));
            let transport = Arc::clone(&self.transport);
            let progress = self.progress.clone();
            let limiter = limiter.clone();

            let handle = units.spawn(async move {
                // The semaphore is never closed, so a failed acquire only
                // means the limit no longer applies
                let _permit = match limiter {
                    Some(limiter) => limiter.acquire_owned().await.ok(),
                    None => None,
                };
                let started = Instant::now();
                let outcome = task.run(transport.as_ref(), &progress).await;
                (outcome, started.elapsed())
            });
            host_by_task.insert(handle.id(), host.clone());
        }

        let mut results = HashMap::with_capacity(hosts.len());
        while let Some(joined) = units.join_next_with_id().await {
            let entry = match joined {
                Ok((id, (outcome, elapsed))) => {
                    host_by_task.remove(&id);
                    // Output is only logged once the script was started
                    let log_file = match outcome {
                        TaskOutcome::TransferFailed { .. } => None,
                        _ => plan.log_file(outcome.host()),
                    };
                    ReportEntry::new(outcome, elapsed).with_log_file(log_file)
                }
                Err(err) => {
                    let Some(host) = host_by_task.remove(&err.id()) else {
                        tracing::error!("Deployment task for an unknown host failed: {}", err);
                        continue;
                    };
                    tracing::error!(host = %host, "Deployment task panicked: {}", err);

                    let outcome = TaskOutcome::ExecutionFailed {
                        host,
                        exit_code: None,
                        cause: format!("deployment task panicked: {err}"),
                    };
                    self.progress.emit(ProgressEvent::Finished {
                        outcome: outcome.clone(),
                    });
                    ReportEntry::new(outcome, Default::default())
                }
            };
            results.insert(entry.outcome.host().clone(), entry);
        }

        let report = RunReport::assemble(hosts, results, started_at, Utc::now());
        tracing::info!(
            "Deployment and parallel execution completed on all hosts ({} succeeded, {} failed)",
            report.succeeded_count(),
            report.failed_count()
        );
        Ok(report)
    }
}

/// Check that the artifact exists and is a regular file
pub fn validate_artifact(path: &Path) -> Result<(), DeployError> {
    let metadata = fs::metadata(path).map_err(|e| DeployError::ArtifactNotFound {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    if metadata.is_file() {
        Ok(())
    } else {
        Err(DeployError::ArtifactNotFound {
            path: path.to_path_buf(),
            reason: "not a regular file".to_string(),
        })
    }
}

/// Check that a configured private key can be opened
///
/// ssh in BatchMode would otherwise fail every host with the same error.
pub fn validate_identity_file(credential: &Credential) -> Result<(), DeployError> {
    let Some(path) = credential.identity_file() else {
        return Ok(());
    };

    let unreadable = |reason: String| DeployError::IdentityFileUnreadable {
        path: path.to_path_buf(),
        reason,
    };
    let metadata = fs::metadata(path).map_err(|e| unreadable(e.to_string()))?;
    if !metadata.is_file() {
        return Err(unreadable("not a regular file".to_string()));
    }
    fs::File::open(path).map_err(|e| unreadable(e.to_string()))?;
    Ok(())
}

fn prepare_log_dir(dir: &Path) -> Result<(), DeployError> {
    fs::create_dir_all(dir).map_err(|e| DeployError::LogDirUnusable {
        path: dir.to_path_buf(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::TransportError;
    use crate::transport::testing::ScriptedTransport;
    use std::io::Write;
    use tokio::sync::Notify;

    fn artifact() -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".sh").tempfile().unwrap();
        writeln!(file, "#!/bin/bash\necho hello").unwrap();
        file
    }

    fn deployment(artifact: &Path, hosts: &[&str]) -> Deployment {
        let plan = DeploymentPlan::new(artifact, "/home/cloud/run", Credential::new()).unwrap();
        Deployment::new(hosts.iter().map(|h| Host::new(*h)).collect(), plan).unwrap()
    }

    #[test]
    fn test_deployment_rejects_empty_and_duplicate_hosts() {
        let plan = DeploymentPlan::new("/tmp/x.sh", "/srv", Credential::new()).unwrap();
        assert!(Deployment::new(Vec::new(), plan.clone()).is_err());

        let err = Deployment::new(vec![Host::new("a"), Host::new("a")], plan.clone()).unwrap_err();
        assert!(err.to_string().contains("more than once"));

        let deployment = Deployment::new(vec![Host::new("a")], plan).unwrap();
        assert!(deployment.with_max_parallel(Some(0)).is_err());
    }

    #[test]
    fn test_validate_artifact() {
        let file = artifact();
        assert!(validate_artifact(file.path()).is_ok());

        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            validate_artifact(dir.path()),
            Err(DeployError::ArtifactNotFound { .. })
        ));
        assert!(validate_artifact(&dir.path().join("missing.sh")).is_err());
    }

    #[tokio::test]
    async fn test_example_scenario() {
        let file = artifact();
        let transport = Arc::new(ScriptedTransport::new().exit_with("B", 1));
        let orchestrator = Orchestrator::new(deployment(file.path(), &["A", "B"]), transport);

        let report = orchestrator.run().await.unwrap();

        assert_eq!(report.len(), 2);
        assert_eq!(
            report.get(&Host::new("A")),
            Some(&TaskOutcome::Succeeded { host: Host::new("A") })
        );
        assert_eq!(report.get(&Host::new("B")).unwrap().exit_code(), Some(1));
    }

    #[tokio::test]
    async fn test_missing_artifact_contacts_no_host() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("load.sh");
        let transport = Arc::new(ScriptedTransport::new());
        let orchestrator =
            Orchestrator::new(deployment(&missing, &["A", "B"]), transport.clone());

        let err = orchestrator.run().await.unwrap_err();

        assert!(matches!(err, DeployError::ArtifactNotFound { .. }));
        assert!(transport.calls().is_empty());
    }

    #[tokio::test]
    async fn test_unreadable_identity_file_contacts_no_host() {
        let file = artifact();
        let dir = tempfile::tempdir().unwrap();
        let credential = Credential::new().with_identity_file(dir.path().join("fleet_key"));
        let plan = DeploymentPlan::new(file.path(), "/home/cloud/run", credential).unwrap();
        let deployment =
            Deployment::new(vec![Host::new("A"), Host::new("B")], plan).unwrap();
        let transport = Arc::new(ScriptedTransport::new());
        let orchestrator = Orchestrator::new(deployment, transport.clone());

        let err = orchestrator.run().await.unwrap_err();

        assert!(matches!(err, DeployError::IdentityFileUnreadable { .. }));
        assert!(transport.calls().is_empty());
    }

    #[test]
    fn test_validate_identity_file() {
        assert!(validate_identity_file(&Credential::new()).is_ok());

        let key = artifact();
        assert!(validate_identity_file(&Credential::new().with_identity_file(key.path())).is_ok());

        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            validate_identity_file(&Credential::new().with_identity_file(dir.path())),
            Err(DeployError::IdentityFileUnreadable { .. })
        ));
    }

    #[tokio::test]
    async fn test_log_dir_created_and_recorded() {
        let file = artifact();
        let dir = tempfile::tempdir().unwrap();
        let log_dir = dir.path().join("logs");
        let plan = DeploymentPlan::new(file.path(), "/home/cloud/run", Credential::new())
            .unwrap()
            .with_log_dir(Some(log_dir.clone()));
        let deployment =
            Deployment::new(vec![Host::new("A"), Host::new("B")], plan).unwrap();
        let transport = Arc::new(
            ScriptedTransport::new()
                .fail_copy("B", TransportError::TransferFailed("disk full".to_string())),
        );

        let report = Orchestrator::new(deployment, transport).run().await.unwrap();

        assert!(log_dir.is_dir());
        let entries = report.entries();
        assert_eq!(entries[0].log_file, Some(log_dir.join("A.log")));
        assert_eq!(entries[1].log_file, None);
    }

    #[tokio::test]
    async fn test_every_host_reported_when_all_fail() {
        let file = artifact();
        let transport = Arc::new(
            ScriptedTransport::new()
                .fail_directory("A", TransportError::ConnectionFailed("refused".to_string()))
                .fail_copy("B", TransportError::AuthFailed { key_hint: None })
                .exit_with("C", 2),
        );
        let orchestrator =
            Orchestrator::new(deployment(file.path(), &["A", "B", "C"]), transport);

        let report = orchestrator.run().await.unwrap();

        assert_eq!(report.len(), 3);
        assert_eq!(report.failed_count(), 3);
    }

    #[tokio::test]
    async fn test_panicking_task_is_recorded() {
        let file = artifact();
        let transport = Arc::new(ScriptedTransport::new().panic_on_run("B"));
        let orchestrator = Orchestrator::new(deployment(file.path(), &["A", "B"]), transport);

        let report = orchestrator.run().await.unwrap();

        assert_eq!(report.len(), 2);
        assert!(report.get(&Host::new("A")).unwrap().is_success());
        match report.get(&Host::new("B")).unwrap() {
            TaskOutcome::ExecutionFailed { exit_code, cause, .. } => {
                assert_eq!(*exit_code, None);
                assert!(cause.contains("panicked"));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_progress_visible_before_join() {
        let file = artifact();
        let gate = Arc::new(Notify::new());
        let transport = Arc::new(ScriptedTransport::new().block_run("C", gate.clone()));
        let (reporter, mut rx) = ProgressReporter::channel();
        let orchestrator =
            Orchestrator::new(deployment(file.path(), &["A", "B", "C"]), transport)
                .with_progress(reporter);

        let run = tokio::spawn(async move { orchestrator.run().await });

        let mut finished = Vec::new();
        while finished.len() < 2 {
            let event = rx.recv().await.unwrap();
            if let ProgressEvent::Finished { outcome } = event {
                finished.push(outcome.host().clone());
            }
        }
        finished.sort();
        assert_eq!(finished, vec![Host::new("A"), Host::new("B")]);
        assert!(!run.is_finished());

        gate.notify_one();
        let report = run.await.unwrap().unwrap();
        assert!(report.all_succeeded());
    }

    #[tokio::test]
    async fn test_max_parallel_still_reports_every_host() {
        let file = artifact();
        let transport = Arc::new(ScriptedTransport::new());
        let deployment = deployment(file.path(), &["A", "B", "C", "D"])
            .with_max_parallel(Some(1))
            .unwrap();
        let orchestrator = Orchestrator::new(deployment, transport.clone());

        let report = orchestrator.run().await.unwrap();

        assert_eq!(report.len(), 4);
        assert!(report.all_succeeded());
        assert_eq!(transport.calls().len(), 12);
    }
}
