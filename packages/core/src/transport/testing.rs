//! Scripted transport for tests
//!
//! Built for this crate's own tests and behind the `testing` feature for
//! integration tests. `ScriptedTransport` never touches the network. Each host follows a script
//! (succeed, fail a step, exit nonzero, block until released, panic) and
//! every call is recorded so tests can assert which steps ran.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::sync::Notify;

use super::{Operation, Transport};
use crate::host::{Credential, Host, TransportError};

/// A recorded transport call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    EnsureDirectory { host: Host, path: String },
    Copy { host: Host, local_path: PathBuf, remote_path: String },
    Run { host: Host, command: String },
}

impl Call {
    pub fn host(&self) -> &Host {
        match self {
            Call::EnsureDirectory { host, .. } | Call::Copy { host, .. } | Call::Run { host, .. } => {
                host
            }
        }
    }
}

/// What one step does when called
#[derive(Debug, Clone, Default)]
enum Step {
    #[default]
    Succeed,
    Fail(TransportError),
    Block(Arc<Notify>),
    Panic,
}

#[derive(Debug, Clone, Default)]
struct HostScript {
    directory: Step,
    copy: Step,
    run: Step,
}

/// Test double that follows a per-host script
///
/// Hosts without a script succeed at every step.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    scripts: HashMap<Host, HostScript>,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn script(&mut self, host: impl Into<Host>) -> &mut HostScript {
        self.scripts.entry(host.into()).or_default()
    }

    /// Make directory creation fail on `host`
    pub fn fail_directory(mut self, host: impl Into<Host>, err: TransportError) -> Self {
        self.script(host).directory = Step::Fail(err);
        self
    }

    /// Make the artifact copy fail on `host`
    pub fn fail_copy(mut self, host: impl Into<Host>, err: TransportError) -> Self {
        self.script(host).copy = Step::Fail(err);
        self
    }

    /// Make the remote command fail on `host`
    pub fn fail_run(mut self, host: impl Into<Host>, err: TransportError) -> Self {
        self.script(host).run = Step::Fail(err);
        self
    }

    /// Make the remote command exit with `exit_code` on `host`
    pub fn exit_with(self, host: impl Into<Host>, exit_code: i32) -> Self {
        self.fail_run(
            host,
            TransportError::CommandFailed {
                exit_code,
                detail: String::new(),
            },
        )
    }

    /// Hold the remote command on `host` until `gate` is notified
    pub fn block_run(mut self, host: impl Into<Host>, gate: Arc<Notify>) -> Self {
        self.script(host).run = Step::Block(gate);
        self
    }

    /// Hold the artifact copy on `host` until `gate` is notified
    pub fn block_copy(mut self, host: impl Into<Host>, gate: Arc<Notify>) -> Self {
        self.script(host).copy = Step::Block(gate);
        self
    }

    /// Panic inside the remote command step on `host`
    pub fn panic_on_run(mut self, host: impl Into<Host>) -> Self {
        self.script(host).run = Step::Panic;
        self
    }

    /// Every call made so far, in call order
    pub fn calls(&self) -> Vec<Call> {
        self.lock_calls().clone()
    }

    /// Calls made against one host, in call order
    pub fn calls_for(&self, host: &Host) -> Vec<Call> {
        self.lock_calls()
            .iter()
            .filter(|call| call.host() == host)
            .cloned()
            .collect()
    }

    fn lock_calls(&self) -> MutexGuard<'_, Vec<Call>> {
        // A panicking scripted step never holds the lock
        self.calls.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn record(&self, call: Call) {
        self.lock_calls().push(call);
    }

    fn step(&self, host: &Host, op: Operation) -> Step {
        let Some(script) = self.scripts.get(host) else {
            return Step::Succeed;
        };
        match op {
            Operation::EnsureDirectory => script.directory.clone(),
            Operation::Copy => script.copy.clone(),
            Operation::Execute => script.run.clone(),
        }
    }
}

async fn play(step: Step, host: &Host) -> Result<(), TransportError> {
    match step {
        Step::Succeed => Ok(()),
        Step::Fail(err) => Err(err),
        Step::Block(gate) => {
            gate.notified().await;
            Ok(())
        }
        Step::Panic => panic!("scripted panic on {host}"),
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn ensure_remote_directory(
        &self,
        host: &Host,
        _credential: &Credential,
        path: &str,
    ) -> Result<(), TransportError> {
        self.record(Call::EnsureDirectory {
            host: host.clone(),
            path: path.to_string(),
        });
        play(self.step(host, Operation::EnsureDirectory), host).await
    }

    async fn copy_artifact(
        &self,
        host: &Host,
        _credential: &Credential,
        local_path: &Path,
        remote_path: &str,
    ) -> Result<(), TransportError> {
        self.record(Call::Copy {
            host: host.clone(),
            local_path: local_path.to_path_buf(),
            remote_path: remote_path.to_string(),
        });
        play(self.step(host, Operation::Copy), host).await
    }

    async fn run_remote_command(
        &self,
        host: &Host,
        _credential: &Credential,
        command: &str,
        _log_file: Option<&Path>,
    ) -> Result<(), TransportError> {
        self.record(Call::Run {
            host: host.clone(),
            command: command.to_string(),
        });
        play(self.step(host, Operation::Execute), host).await
    }
}
