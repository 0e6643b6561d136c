//! Host and credential types
//!
//! A `Host` names one remote machine. A `Credential` is the shared SSH
//! login used for every host in a run.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Address of one remote machine (IP or DNS name, or an SSH config alias)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Host(String);

impl Host {
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Host {
    fn from(address: &str) -> Self {
        Self::new(address)
    }
}

impl From<String> for Host {
    fn from(address: String) -> Self {
        Self(address)
    }
}

/// SSH login shared by every host in a run
///
/// Transports treat this as an opaque capability: they read the pieces they
/// understand and ignore the rest. Unset fields defer to `~/.ssh/config`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credential {
    user: Option<String>,
    port: Option<u16>,
    identity_file: Option<PathBuf>,
    jump_host: Option<String>,
}

impl Credential {
    /// Credential that relies entirely on the SSH client's defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder pattern: set user
    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    /// Builder pattern: set port
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Builder pattern: set identity file (private key)
    pub fn with_identity_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.identity_file = Some(path.into());
        self
    }

    /// Builder pattern: set jump host
    pub fn with_jump_host(mut self, jump: impl Into<String>) -> Self {
        self.jump_host = Some(jump.into());
        self
    }

    pub fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    pub fn port(&self) -> Option<u16> {
        self.port
    }

    pub fn identity_file(&self) -> Option<&Path> {
        self.identity_file.as_deref()
    }

    pub fn jump_host(&self) -> Option<&str> {
        self.jump_host.as_deref()
    }

    /// Key path for error hints
    pub fn key_hint(&self) -> Option<String> {
        self.identity_file
            .as_ref()
            .map(|p| p.display().to_string())
    }

    /// SSH destination for `host`: `user@host`, or the bare host when no
    /// user is set
    pub fn destination(&self, host: &Host) -> String {
        match &self.user {
            Some(user) => format!("{user}@{host}"),
            None => host.to_string(),
        }
    }
}
