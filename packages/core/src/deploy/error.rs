//! Run-level error types
//!
//! These abort a whole run. Per-host failures never become a `DeployError`;
//! they are recorded as a `TaskOutcome` instead.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that stop a run before any host is contacted
#[derive(Error, Debug)]
pub enum DeployError {
    /// The local artifact is missing or not a regular file
    #[error("Artifact not found: {} ({reason})", .path.display())]
    ArtifactNotFound { path: PathBuf, reason: String },

    /// The configured private key cannot be read
    #[error("Identity file not readable: {} ({reason})", .path.display())]
    IdentityFileUnreadable { path: PathBuf, reason: String },

    /// The output log directory cannot be created
    #[error("Cannot create log directory {}: {reason}", .path.display())]
    LogDirUnusable { path: PathBuf, reason: String },

    /// Invalid deployment configuration
    #[error("Invalid deployment configuration: {0}")]
    InvalidConfig(String),

    /// Failed to load a host list or config file
    #[error("Failed to load: {0}")]
    LoadFailed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deploy_error_displays_correctly() {
        let err = DeployError::ArtifactNotFound {
            path: PathBuf::from("/tmp/missing.sh"),
            reason: "No such file or directory".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Artifact not found: /tmp/missing.sh (No such file or directory)"
        );

        let err = DeployError::IdentityFileUnreadable {
            path: PathBuf::from("/home/cloud/.ssh/fleet"),
            reason: "Permission denied (os error 13)".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Identity file not readable: /home/cloud/.ssh/fleet (Permission denied (os error 13))"
        );

        let err = DeployError::InvalidConfig("no hosts configured".to_string());
        assert!(err.to_string().contains("no hosts configured"));
    }
}
