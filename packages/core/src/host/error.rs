//! Transport error types
//!
//! Errors that can occur while talking to a single remote host.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur during one transport operation against one host
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Failed to spawn the local ssh/scp process
    #[error("Failed to spawn SSH: {0}")]
    SshSpawn(String),

    /// Host unreachable or the connection dropped
    #[error("SSH connection failed: {0}")]
    ConnectionFailed(String),

    /// SSH authentication failed (key rejected, host key mismatch)
    #[error("SSH authentication failed. Ensure your key is accepted by the host: {}", .key_hint.as_deref().unwrap_or("~/.ssh/id_rsa"))]
    AuthFailed { key_hint: Option<String> },

    /// The copy mechanism or remote mkdir exited nonzero
    #[error("Transfer failed: {0}")]
    TransferFailed(String),

    /// The remote command exited nonzero
    #[error("Remote command exited with status {exit_code}{}", format_detail(.detail))]
    CommandFailed { exit_code: i32, detail: String },

    /// The step did not finish inside the per-host time budget
    #[error("Timed out after {}", format_timeout(.0))]
    TimedOut(Duration),

    /// Failed to read the user's SSH config
    #[error("Failed to read SSH config: {0}")]
    SshConfigRead(String),
}

impl TransportError {
    /// Exit status of the remote command, when the failure carries one
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            TransportError::CommandFailed { exit_code, .. } => Some(*exit_code),
            _ => None,
        }
    }

    /// Whether this error means the host could not be reached or logged into
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            TransportError::ConnectionFailed(_) | TransportError::AuthFailed { .. }
        )
    }
}

fn format_timeout(budget: &Duration) -> String {
    humantime::format_duration(*budget).to_string()
}

fn format_detail(detail: &str) -> String {
    if detail.is_empty() {
        String::new()
    } else {
        format!(": {detail}")
    }
}
