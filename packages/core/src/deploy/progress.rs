//! Progress events
//!
//! Host tasks publish what they are doing as they go, so a caller can show
//! each host's result as soon as it exists rather than after the final join.

use std::fmt;

use tokio::sync::mpsc;

use super::outcome::TaskOutcome;
use crate::host::Host;

/// Something a host task just started or finished
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    /// The host task started
    Processing { host: Host },
    /// Artifact copy is starting
    Copying { host: Host },
    /// Artifact copy finished
    Copied { host: Host },
    /// Remote command is starting
    Executing { host: Host },
    /// The host task ended with this outcome
    Finished { outcome: TaskOutcome },
}

impl ProgressEvent {
    pub fn host(&self) -> &Host {
        match self {
            ProgressEvent::Processing { host }
            | ProgressEvent::Copying { host }
            | ProgressEvent::Copied { host }
            | ProgressEvent::Executing { host } => host,
            ProgressEvent::Finished { outcome } => outcome.host(),
        }
    }

    /// Whether the event reports a failure
    pub fn is_failure(&self) -> bool {
        matches!(self, ProgressEvent::Finished { outcome } if !outcome.is_success())
    }
}

impl fmt::Display for ProgressEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProgressEvent::Processing { host } => write!(f, "Processing host: {host}"),
            ProgressEvent::Copying { host } => write!(f, "Copying script to {host}..."),
            ProgressEvent::Copied { host } => write!(f, "Script copied successfully to {host}."),
            ProgressEvent::Executing { host } => write!(f, "Executing script on {host}..."),
            ProgressEvent::Finished { outcome } => match outcome {
                TaskOutcome::Succeeded { host } => {
                    write!(f, "Script executed successfully on {host}")
                }
                TaskOutcome::ExecutionFailed { host, .. } => {
                    write!(f, "Error: Script execution failed on {host}")
                }
                TaskOutcome::TransferFailed { host, .. } => {
                    write!(f, "Error: Failed to copy script to {host}")
                }
            },
        }
    }
}

/// Receiving end of a progress channel
pub type ProgressReceiver = mpsc::UnboundedReceiver<ProgressEvent>;

/// Sending end handed to every host task
///
/// A reporter without a channel, or whose receiver is gone, drops events.
#[derive(Debug, Clone, Default)]
pub struct ProgressReporter {
    tx: Option<mpsc::UnboundedSender<ProgressEvent>>,
}

impl ProgressReporter {
    /// Reporter that drops every event
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Reporter plus the receiver its events arrive on
    pub fn channel() -> (Self, ProgressReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    pub fn emit(&self, event: ProgressEvent) {
        if let Some(tx) = &self.tx {
            // Receiver may have been dropped; progress is best-effort
            let _ = tx.send(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_lines() {
        let host = Host::new("A");
        assert_eq!(
            ProgressEvent::Processing { host: host.clone() }.to_string(),
            "Processing host: A"
        );
        assert_eq!(
            ProgressEvent::Copying { host: host.clone() }.to_string(),
            "Copying script to A..."
        );
        assert_eq!(
            ProgressEvent::Copied { host: host.clone() }.to_string(),
            "Script copied successfully to A."
        );
        assert_eq!(
            ProgressEvent::Executing { host: host.clone() }.to_string(),
            "Executing script on A..."
        );
    }

    #[test]
    fn test_finished_lines() {
        let ok = ProgressEvent::Finished {
            outcome: TaskOutcome::Succeeded {
                host: Host::new("A"),
            },
        };
        assert_eq!(ok.to_string(), "Script executed successfully on A");
        assert!(!ok.is_failure());

        let failed = ProgressEvent::Finished {
            outcome: TaskOutcome::ExecutionFailed {
                host: Host::new("B"),
                exit_code: Some(1),
                cause: String::new(),
            },
        };
        assert_eq!(failed.to_string(), "Error: Script execution failed on B");
        assert!(failed.is_failure());
    }

    #[tokio::test]
    async fn test_channel_delivers_events() {
        let (reporter, mut rx) = ProgressReporter::channel();
        reporter.emit(ProgressEvent::Processing {
            host: Host::new("A"),
        });
        assert_eq!(rx.recv().await.unwrap().host(), &Host::new("A"));
    }

    #[test]
    fn test_disabled_and_closed_reporters_drop_events() {
        ProgressReporter::disabled().emit(ProgressEvent::Processing {
            host: Host::new("A"),
        });

        let (reporter, rx) = ProgressReporter::channel();
        drop(rx);
        reporter.emit(ProgressEvent::Processing {
            host: Host::new("A"),
        });
    }
}
