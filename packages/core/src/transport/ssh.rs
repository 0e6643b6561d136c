//! OpenSSH transport
//!
//! Drives the system `ssh` and `scp` clients. BatchMode keeps both from ever
//! prompting, so an unusable key fails fast instead of hanging a host task.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader, BufWriter};
use tokio::process::Command;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};

use super::{Operation, Transport, shell_quote};
use crate::host::{Credential, Host, TransportError};

/// Exit status the OpenSSH clients use for their own (connection) errors
const SSH_CONNECTION_ERROR: i32 = 255;

/// How many trailing stderr lines are kept for error messages
const STDERR_TAIL_LINES: usize = 5;

/// Transport backed by the system OpenSSH client
#[derive(Debug, Clone)]
pub struct OpenSshTransport {
    connect_timeout_secs: u32,
    ssh_program: PathBuf,
    scp_program: PathBuf,
}

impl Default for OpenSshTransport {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 30,
            ssh_program: PathBuf::from("ssh"),
            scp_program: PathBuf::from("scp"),
        }
    }
}

impl OpenSshTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder pattern: set the SSH ConnectTimeout in seconds
    pub fn with_connect_timeout(mut self, secs: u32) -> Self {
        self.connect_timeout_secs = secs;
        self
    }

    /// Builder pattern: use these client binaries instead of `ssh` and `scp`
    /// from PATH
    pub fn with_programs(mut self, ssh: impl Into<PathBuf>, scp: impl Into<PathBuf>) -> Self {
        self.ssh_program = ssh.into();
        self.scp_program = scp.into();
        self
    }

    fn ssh(&self, host: &Host, credential: &Credential) -> Command {
        let mut cmd = Command::new(&self.ssh_program);
        cmd.args(ssh_args(host, credential, self.connect_timeout_secs));
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    async fn run_checked(
        &self,
        mut cmd: Command,
        op: Operation,
        credential: &Credential,
    ) -> Result<(), TransportError> {
        let output = cmd.output().await.map_err(spawn_error)?;

        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(classify_failure(op, output.status.code(), &stderr, credential))
        }
    }
}

#[async_trait]
impl Transport for OpenSshTransport {
    async fn ensure_remote_directory(
        &self,
        host: &Host,
        credential: &Credential,
        path: &str,
    ) -> Result<(), TransportError> {
        let mut cmd = self.ssh(host, credential);
        cmd.arg(format!("mkdir -p -- {}", shell_quote(path)));

        tracing::debug!("Ensuring {} exists on {}", path, host);
        self.run_checked(cmd, Operation::EnsureDirectory, credential)
            .await
    }

    async fn copy_artifact(
        &self,
        host: &Host,
        credential: &Credential,
        local_path: &Path,
        remote_path: &str,
    ) -> Result<(), TransportError> {
        let mut cmd = Command::new(&self.scp_program);
        cmd.args(scp_args(
            host,
            credential,
            self.connect_timeout_secs,
            local_path,
            remote_path,
        ));
        cmd.stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        tracing::debug!(
            "Spawning scp {} {}:{}",
            local_path.display(),
            credential.destination(host),
            remote_path
        );
        self.run_checked(cmd, Operation::Copy, credential).await
    }

    async fn run_remote_command(
        &self,
        host: &Host,
        credential: &Credential,
        command: &str,
        log_file: Option<&Path>,
    ) -> Result<(), TransportError> {
        let mut cmd = self.ssh(host, credential);
        cmd.arg(command);

        tracing::debug!("Running on {}: {}", host, command);
        let mut child = cmd.spawn().map_err(spawn_error)?;

        let (log_tx, log_rx) = match log_file {
            Some(_) => {
                let (tx, rx) = unbounded_channel();
                (Some(tx), Some(rx))
            }
            None => (None, None),
        };

        // Both pipes are drained to EOF while the command runs
        let forward_stdout = forward_output(child.stdout.take(), host, Stream::Stdout, log_tx.clone());
        let forward_stderr = forward_output(child.stderr.take(), host, Stream::Stderr, log_tx);
        let log_writer = async {
            if let (Some(path), Some(rx)) = (log_file, log_rx) {
                if let Err(e) = write_log(path, rx).await {
                    tracing::warn!(host = %host, "Failed to write {}: {}", path.display(), e);
                }
            }
        };

        let (_, tail, ()) = tokio::join!(forward_stdout, forward_stderr, log_writer);

        let status = child
            .wait()
            .await
            .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;

        if status.success() {
            Ok(())
        } else {
            let stderr = Vec::from(tail).join("\n");
            Err(classify_failure(
                Operation::Execute,
                status.code(),
                &stderr,
                credential,
            ))
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stream {
    Stdout,
    Stderr,
}

/// Log every line of remote output until the pipe closes
///
/// Lines are read as bytes, so output that is not UTF-8 is logged lossily
/// instead of ending the read. Returns the last stderr lines.
async fn forward_output<R>(
    reader: Option<R>,
    host: &Host,
    stream: Stream,
    log: Option<UnboundedSender<String>>,
) -> VecDeque<String>
where
    R: AsyncRead + Unpin,
{
    let mut tail = VecDeque::with_capacity(STDERR_TAIL_LINES);
    let Some(reader) = reader else {
        return tail;
    };

    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(host = %host, "Stopped reading remote output: {}", e);
                break;
            }
        }

        let line = String::from_utf8_lossy(&buf)
            .trim_end_matches(['\n', '\r'])
            .to_string();
        if let Some(tx) = &log {
            // The writer only goes away after a failed write, which is already logged
            let _ = tx.send(line.clone());
        }

        match stream {
            Stream::Stdout => tracing::info!(host = %host, "{}", line),
            Stream::Stderr => {
                tracing::warn!(host = %host, "{}", line);
                if tail.len() == STDERR_TAIL_LINES {
                    tail.pop_front();
                }
                tail.push_back(line);
            }
        }
    }
    tail
}

/// Write forwarded lines to `path` until every sender is gone
async fn write_log(path: &Path, mut lines: UnboundedReceiver<String>) -> std::io::Result<()> {
    let mut writer = BufWriter::new(File::create(path).await?);
    while let Some(line) = lines.recv().await {
        writer.write_all(line.as_bytes()).await?;
        writer.write_all(b"\n").await?;
    }
    writer.flush().await
}

/// Options shared by ssh and scp
fn common_options(connect_timeout_secs: u32) -> Vec<String> {
    vec![
        "-o".to_string(),
        "BatchMode=yes".to_string(),
        "-o".to_string(),
        format!("ConnectTimeout={connect_timeout_secs}"),
        "-o".to_string(),
        "StrictHostKeyChecking=accept-new".to_string(),
    ]
}

/// Arguments for `ssh`, ending with the destination
///
/// The remote command is appended by the caller.
pub fn ssh_args(host: &Host, credential: &Credential, connect_timeout_secs: u32) -> Vec<String> {
    let mut args = common_options(connect_timeout_secs);

    if let Some(port) = credential.port() {
        args.push("-p".to_string());
        args.push(port.to_string());
    }
    if let Some(key) = credential.identity_file() {
        args.push("-i".to_string());
        args.push(key.display().to_string());
    }
    if let Some(jump) = credential.jump_host() {
        args.push("-J".to_string());
        args.push(jump.to_string());
    }

    args.push(credential.destination(host));
    args
}

/// Arguments for `scp` copying `local_path` to `remote_path` on the host
pub fn scp_args(
    host: &Host,
    credential: &Credential,
    connect_timeout_secs: u32,
    local_path: &Path,
    remote_path: &str,
) -> Vec<String> {
    let mut args = vec!["-q".to_string()];
    args.extend(common_options(connect_timeout_secs));

    // scp spells the port flag with a capital P
    if let Some(port) = credential.port() {
        args.push("-P".to_string());
        args.push(port.to_string());
    }
    if let Some(key) = credential.identity_file() {
        args.push("-i".to_string());
        args.push(key.display().to_string());
    }
    if let Some(jump) = credential.jump_host() {
        args.push("-J".to_string());
        args.push(jump.to_string());
    }

    args.push(local_path.display().to_string());
    args.push(format!("{}:{}", credential.destination(host), remote_path));
    args
}

/// Turn a failed ssh/scp exit into a transport error
///
/// Status 255 is the client's own failure (unreachable host, rejected key).
/// Any other nonzero status came from the remote side.
pub fn classify_failure(
    op: Operation,
    exit_code: Option<i32>,
    stderr: &str,
    credential: &Credential,
) -> TransportError {
    let detail = stderr.trim().to_string();

    match exit_code {
        None => TransportError::ConnectionFailed(
            "SSH client terminated by a signal".to_string(),
        ),
        Some(SSH_CONNECTION_ERROR) => {
            if detail.contains("Permission denied") || detail.contains("Host key verification failed")
            {
                TransportError::AuthFailed {
                    key_hint: credential.key_hint(),
                }
            } else if detail.is_empty() {
                TransportError::ConnectionFailed(format!(
                    "ssh exited with status {SSH_CONNECTION_ERROR}"
                ))
            } else {
                TransportError::ConnectionFailed(detail)
            }
        }
        Some(code) => match op {
            Operation::EnsureDirectory | Operation::Copy => {
                if detail.is_empty() {
                    TransportError::TransferFailed(format!("exited with status {code}"))
                } else {
                    TransportError::TransferFailed(detail)
                }
            }
            Operation::Execute => TransportError::CommandFailed {
                exit_code: code,
                detail,
            },
        },
    }
}

fn spawn_error(e: std::io::Error) -> TransportError {
    if e.kind() == std::io::ErrorKind::NotFound {
        TransportError::SshSpawn("SSH not found. Install OpenSSH client.".to_string())
    } else {
        TransportError::SshSpawn(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credential() -> Credential {
        Credential::new()
            .with_user("cloud")
            .with_port(2222)
            .with_identity_file("/home/cloud/.ssh/key")
    }

    #[test]
    fn test_ssh_args_include_batch_mode_and_destination() {
        let args = ssh_args(&Host::new("192.168.0.62"), &credential(), 30);

        assert!(args.contains(&"BatchMode=yes".to_string()));
        assert!(args.contains(&"ConnectTimeout=30".to_string()));
        let port = args.iter().position(|a| a == "-p").unwrap();
        assert_eq!(args[port + 1], "2222");
        let key = args.iter().position(|a| a == "-i").unwrap();
        assert_eq!(args[key + 1], "/home/cloud/.ssh/key");
        assert_eq!(args.last().unwrap(), "cloud@192.168.0.62");
    }

    #[test]
    fn test_ssh_args_minimal_credential() {
        let args = ssh_args(&Host::new("db-1"), &Credential::new(), 10);
        assert!(!args.contains(&"-p".to_string()));
        assert!(!args.contains(&"-i".to_string()));
        assert!(!args.contains(&"-J".to_string()));
        assert_eq!(args.last().unwrap(), "db-1");
    }

    #[test]
    fn test_scp_args_use_capital_port_flag() {
        let args = scp_args(
            &Host::new("192.168.0.62"),
            &credential().with_jump_host("bastion"),
            30,
            Path::new("/tmp/load_tpch.sh"),
            "/home/cloud/tpch/load_tpch.sh",
        );

        assert_eq!(args[0], "-q");
        assert!(args.contains(&"-P".to_string()));
        assert!(!args.contains(&"-p".to_string()));
        let jump = args.iter().position(|a| a == "-J").unwrap();
        assert_eq!(args[jump + 1], "bastion");
        assert_eq!(args[args.len() - 2], "/tmp/load_tpch.sh");
        assert_eq!(
            args[args.len() - 1],
            "cloud@192.168.0.62:/home/cloud/tpch/load_tpch.sh"
        );
    }

    #[test]
    fn test_classify_auth_failure() {
        let err = classify_failure(
            Operation::Copy,
            Some(255),
            "cloud@192.168.0.62: Permission denied (publickey).",
            &credential(),
        );
        assert_eq!(
            err,
            TransportError::AuthFailed {
                key_hint: Some("/home/cloud/.ssh/key".to_string())
            }
        );
    }

    #[test]
    fn test_classify_unreachable_host() {
        let err = classify_failure(
            Operation::EnsureDirectory,
            Some(255),
            "ssh: connect to host 192.168.0.62 port 22: No route to host\n",
            &Credential::new(),
        );
        assert!(err.is_connection_error());
        assert!(err.to_string().contains("No route to host"));
    }

    #[test]
    fn test_classify_remote_permission_denied_is_not_auth() {
        let err = classify_failure(
            Operation::EnsureDirectory,
            Some(1),
            "mkdir: cannot create directory '/opt/x': Permission denied",
            &Credential::new(),
        );
        assert!(matches!(err, TransportError::TransferFailed(_)));
    }

    #[test]
    fn test_classify_command_exit_code() {
        let err = classify_failure(Operation::Execute, Some(1), "", &Credential::new());
        assert_eq!(err.exit_code(), Some(1));
    }

    #[test]
    fn test_classify_signal() {
        let err = classify_failure(Operation::Execute, None, "", &Credential::new());
        assert!(matches!(err, TransportError::ConnectionFailed(_)));
    }

    /// Write an executable shell script standing in for ssh or scp
    #[cfg(unix)]
    fn fake_client(dir: &Path, name: &str, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    fn transport_with_ssh(dir: &Path, body: &str) -> OpenSshTransport {
        let ssh = fake_client(dir, "ssh", body);
        let scp = fake_client(dir, "scp", "exit 0");
        OpenSshTransport::new().with_programs(ssh, scp)
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_remote_command_success() {
        let dir = tempfile::tempdir().unwrap();
        let transport = transport_with_ssh(dir.path(), "echo loaded\nexit 0");

        transport
            .run_remote_command(&Host::new("db-1"), &Credential::new(), "bash load.sh", None)
            .await
            .unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_remote_command_nonzero_exit_keeps_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let transport = transport_with_ssh(dir.path(), "echo 'table lineitem missing' >&2\nexit 1");

        let err = transport
            .run_remote_command(&Host::new("db-1"), &Credential::new(), "bash load.sh", None)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            TransportError::CommandFailed {
                exit_code: 1,
                detail: "table lineitem missing".to_string(),
            }
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_remote_command_rejected_key() {
        let dir = tempfile::tempdir().unwrap();
        let transport = transport_with_ssh(
            dir.path(),
            "echo 'cloud@db-1: Permission denied (publickey).' >&2\nexit 255",
        );

        let err = transport
            .run_remote_command(&Host::new("db-1"), &credential(), "bash load.sh", None)
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::AuthFailed { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_remote_command_survives_non_utf8_output() {
        let dir = tempfile::tempdir().unwrap();
        // The pause lets the reader reach the bad line before the rest is written
        let transport = transport_with_ssh(
            dir.path(),
            "printf 'caf\\351\\n'\n\
             sleep 1\n\
             i=0\n\
             while [ $i -lt 3000 ]; do echo \"row $i\"; i=$((i + 1)); done\n\
             exit 0",
        );

        transport
            .run_remote_command(&Host::new("db-1"), &Credential::new(), "bash load.sh", None)
            .await
            .unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_remote_output_written_to_log_file() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("db-1.log");
        let transport = transport_with_ssh(
            dir.path(),
            "echo 'loading lineitem'\nprintf 'caf\\351\\n'\necho 'slow disk' >&2\nexit 3",
        );

        let err = transport
            .run_remote_command(&Host::new("db-1"), &Credential::new(), "bash load.sh", Some(&log))
            .await
            .unwrap_err();
        assert_eq!(err.exit_code(), Some(3));

        let written = std::fs::read_to_string(&log).unwrap();
        assert!(written.contains("loading lineitem\n"));
        assert!(written.contains("caf\u{FFFD}\n"));
        assert!(written.contains("slow disk\n"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failed_copy_is_transfer_failure() {
        let dir = tempfile::tempdir().unwrap();
        let ssh = fake_client(dir.path(), "ssh", "exit 0");
        let scp = fake_client(
            dir.path(),
            "scp",
            "echo 'scp: /opt/tpch/load.sh: Permission denied' >&2\nexit 1",
        );
        let transport = OpenSshTransport::new().with_programs(ssh, scp);

        let err = transport
            .copy_artifact(
                &Host::new("db-1"),
                &Credential::new(),
                Path::new("/tmp/load.sh"),
                "/opt/tpch/load.sh",
            )
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::TransferFailed(ref msg) if msg.contains("Permission denied")));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_ensure_directory_runs_mkdir() {
        let dir = tempfile::tempdir().unwrap();
        let transport = transport_with_ssh(dir.path(), "exit 0");

        transport
            .ensure_remote_directory(&Host::new("db-1"), &Credential::new(), "tpch")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_missing_client_is_spawn_error() {
        let dir = tempfile::tempdir().unwrap();
        let transport = OpenSshTransport::new()
            .with_programs(dir.path().join("no-ssh"), dir.path().join("no-scp"));

        let err = transport
            .run_remote_command(&Host::new("db-1"), &Credential::new(), "true", None)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            TransportError::SshSpawn("SSH not found. Install OpenSSH client.".to_string())
        );
    }
}
