//! Remote transport
//!
//! A `Transport` performs exactly one network operation against exactly one
//! host and reports the result as a value. The deploy pipeline only talks to
//! hosts through this trait, so the OpenSSH implementation can be swapped
//! for the scripted double in tests.

mod ssh;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

use std::path::Path;

use async_trait::async_trait;

use crate::host::{Credential, Host, TransportError};

pub use ssh::{OpenSshTransport, classify_failure, scp_args, ssh_args};

/// Which transport operation a failure came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    EnsureDirectory,
    Copy,
    Execute,
}

/// One remote host operation at a time
#[async_trait]
pub trait Transport: Send + Sync {
    /// Create `path` on the host if it does not exist yet
    async fn ensure_remote_directory(
        &self,
        host: &Host,
        credential: &Credential,
        path: &str,
    ) -> Result<(), TransportError>;

    /// Copy one local file to `remote_path`, overwriting what is there
    async fn copy_artifact(
        &self,
        host: &Host,
        credential: &Credential,
        local_path: &Path,
        remote_path: &str,
    ) -> Result<(), TransportError>;

    /// Run `command` on the host; a nonzero exit is an error
    ///
    /// With `log_file` set, the command's output is also written there.
    async fn run_remote_command(
        &self,
        host: &Host,
        credential: &Credential,
        command: &str,
        log_file: Option<&Path>,
    ) -> Result<(), TransportError>;
}

/// Quote a value for a POSIX shell
///
/// Plain words pass through untouched; anything else is single-quoted.
pub fn shell_quote(value: &str) -> String {
    let plain = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '/' | '.' | '_' | '-' | '+' | ':' | '=' | ','));
    if plain {
        value.to_string()
    } else {
        format!("'{}'", value.replace('\'', r#"'\''"#))
    }
}
