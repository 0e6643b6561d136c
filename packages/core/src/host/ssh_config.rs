//! SSH config lookup
//!
//! Reads ~/.ssh/config to show which login settings a host will actually
//! use when the run's credential leaves them unset.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use ssh2_config::{ParseRule, SshConfig};

use super::error::TransportError;
use super::schema::{Credential, Host};

/// Settings found in the user's SSH config for a host
#[derive(Debug, Clone, Default)]
pub struct SshConfigMatch {
    /// Real hostname behind an alias
    pub host_name: Option<String>,
    /// User from SSH config
    pub user: Option<String>,
    /// Port from SSH config
    pub port: Option<u16>,
    /// Identity file path from SSH config
    pub identity_file: Option<String>,
    /// ProxyJump (jump host) from SSH config
    pub proxy_jump: Option<String>,
}

impl SshConfigMatch {
    /// Check if any useful settings were found
    pub fn has_settings(&self) -> bool {
        self.host_name.is_some()
            || self.user.is_some()
            || self.port.is_some()
            || self.identity_file.is_some()
            || self.proxy_jump.is_some()
    }
}

/// Where an effective setting came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingSource {
    /// Set in the fleetrun config or on the command line
    Explicit,
    /// Found in ~/.ssh/config
    SshConfig,
    /// SSH client default
    Default,
}

/// Login settings a host resolves to once explicit settings, SSH config and
/// client defaults are layered
#[derive(Debug, Clone)]
pub struct EffectiveLogin {
    pub host: Host,
    pub host_name: String,
    pub user: String,
    pub user_source: SettingSource,
    pub port: u16,
    pub identity_file: Option<String>,
    pub jump_host: Option<String>,
}

/// Get the path to the user's SSH config file
pub fn get_ssh_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".ssh").join("config"))
}

/// Parse user's SSH config and query for a hostname
///
/// Returns settings found for the given hostname, applying SSH config
/// precedence rules (first match wins). A missing file is not an error.
pub fn query_ssh_config(hostname: &str) -> Result<SshConfigMatch, TransportError> {
    match get_ssh_config_path() {
        Some(path) if path.exists() => query_ssh_config_file(&path, hostname),
        _ => {
            tracing::debug!("No SSH config file found");
            Ok(SshConfigMatch::default())
        }
    }
}

/// Query a specific SSH config file for a hostname
pub fn query_ssh_config_file(path: &Path, hostname: &str) -> Result<SshConfigMatch, TransportError> {
    let file = File::open(path).map_err(|e| {
        TransportError::SshConfigRead(format!("Failed to open {}: {}", path.display(), e))
    })?;

    let mut reader = BufReader::new(file);

    // Be lenient with SSH config options we don't know about
    let config = SshConfig::default()
        .parse(&mut reader, ParseRule::ALLOW_UNKNOWN_FIELDS)
        .map_err(|e| TransportError::SshConfigRead(format!("Failed to parse SSH config: {e}")))?;

    let params = config.query(hostname);

    let identity_file = params
        .identity_file
        .and_then(|files| files.first().map(|f| f.to_string_lossy().to_string()));

    // Chained jump hosts are joined the way -J expects them
    let proxy_jump = params
        .proxy_jump
        .filter(|jumps| !jumps.is_empty())
        .map(|jumps| jumps.join(","));

    Ok(SshConfigMatch {
        host_name: params.host_name,
        user: params.user,
        port: params.port,
        identity_file,
        proxy_jump,
    })
}

/// Resolve the login a host will use for this credential
pub fn effective_login(host: &Host, credential: &Credential, found: &SshConfigMatch) -> EffectiveLogin {
    let (user, user_source) = match (credential.user(), &found.user) {
        (Some(user), _) => (user.to_string(), SettingSource::Explicit),
        (None, Some(user)) => (user.clone(), SettingSource::SshConfig),
        (None, None) => (whoami::username(), SettingSource::Default),
    };

    EffectiveLogin {
        host: host.clone(),
        host_name: found
            .host_name
            .clone()
            .unwrap_or_else(|| host.to_string()),
        user,
        user_source,
        port: credential.port().or(found.port).unwrap_or(22),
        identity_file: credential
            .key_hint()
            .or_else(|| found.identity_file.clone()),
        jump_host: credential
            .jump_host()
            .map(str::to_string)
            .or_else(|| found.proxy_jump.clone()),
    }
}
