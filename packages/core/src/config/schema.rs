//! Configuration schema for fleetrun
//!
//! Defines the structure and defaults for the config.json file and turns a
//! loaded config into a validated `Deployment`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::paths::get_hosts_path;
use crate::deploy::{DEFAULT_INTERPRETER, DeployError, Deployment, DeploymentPlan};
use crate::host::{Credential, Host, load_host_list};

/// Main configuration structure for fleetrun
///
/// Serialized to/from `~/.config/fleetrun/config.json`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct DeployConfig {
    /// Config file version for migrations
    #[serde(default = "default_version")]
    pub version: u32,

    /// Hosts to deploy to (IP, DNS name or SSH config alias)
    #[serde(default)]
    pub hosts: Vec<String>,

    /// Plain-text host list, one host per line, `#` comments out a host
    #[serde(default)]
    pub hosts_file: Option<PathBuf>,

    /// SSH user (default: from ~/.ssh/config, else the current user)
    #[serde(default)]
    pub user: Option<String>,

    /// SSH port (default: from ~/.ssh/config, else 22)
    #[serde(default)]
    pub port: Option<u16>,

    /// Private key used for every host
    #[serde(default)]
    pub identity_file: Option<String>,

    /// Jump host for ProxyJump (user@host:port format)
    #[serde(default)]
    pub jump_host: Option<String>,

    /// Local script copied to every host
    #[serde(default)]
    pub artifact: Option<PathBuf>,

    /// Remote directory the script is copied into (default: "/tmp/fleetrun")
    #[serde(default = "default_remote_dir")]
    pub remote_dir: String,

    /// Interpreter the remote script is run with (default: "bash")
    #[serde(default = "default_interpreter")]
    pub interpreter: String,

    /// Arguments passed to the remote script
    #[serde(default)]
    pub script_args: Vec<String>,

    /// Maximum hosts worked on at once (default: all of them)
    #[serde(default)]
    pub max_parallel: Option<usize>,

    /// Per-host time budget, e.g. "30m" (default: wait indefinitely)
    #[serde(default)]
    pub host_timeout: Option<String>,

    /// SSH ConnectTimeout in seconds (default: 30)
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: u32,

    /// Directory that receives one `<host>.log` of remote output per host
    /// (default: output is only logged to the terminal)
    #[serde(default)]
    pub log_dir: Option<String>,
}

fn default_version() -> u32 {
    1
}

fn default_remote_dir() -> String {
    "/tmp/fleetrun".to_string()
}

fn default_interpreter() -> String {
    DEFAULT_INTERPRETER.to_string()
}

fn default_connect_timeout() -> u32 {
    30
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            hosts: Vec::new(),
            hosts_file: None,
            user: None,
            port: None,
            identity_file: None,
            jump_host: None,
            artifact: None,
            remote_dir: default_remote_dir(),
            interpreter: default_interpreter(),
            script_args: Vec::new(),
            max_parallel: None,
            host_timeout: None,
            connect_timeout: default_connect_timeout(),
            log_dir: None,
        }
    }
}

impl DeployConfig {
    /// The shared SSH credential described by this config
    pub fn credential(&self) -> Credential {
        let mut credential = Credential::new();
        if let Some(user) = &self.user {
            credential = credential.with_user(user);
        }
        if let Some(port) = self.port {
            credential = credential.with_port(port);
        }
        if let Some(key) = &self.identity_file {
            credential = credential.with_identity_file(expand_home(key));
        }
        if let Some(jump) = &self.jump_host {
            credential = credential.with_jump_host(jump);
        }
        credential
    }

    /// Active hosts: inline hosts followed by the hosts file
    ///
    /// With neither configured, the default host list
    /// (`~/.config/fleetrun/hosts`) is used when it exists.
    pub fn active_hosts(&self) -> Result<Vec<Host>, DeployError> {
        let mut hosts: Vec<Host> = self
            .hosts
            .iter()
            .map(|h| h.trim())
            .filter(|h| !h.is_empty())
            .map(Host::from)
            .collect();

        match &self.hosts_file {
            Some(path) => hosts.extend(load_host_list(path)?),
            None if hosts.is_empty() => {
                if let Some(path) = get_hosts_path().filter(|p| p.exists()) {
                    hosts.extend(load_host_list(&path)?);
                }
            }
            None => {}
        }

        Ok(hosts)
    }

    /// Parsed per-host timeout
    pub fn host_timeout(&self) -> Result<Option<Duration>, DeployError> {
        self.host_timeout
            .as_deref()
            .map(|raw| {
                humantime::parse_duration(raw).map_err(|e| {
                    DeployError::InvalidConfig(format!("invalid host_timeout '{raw}': {e}"))
                })
            })
            .transpose()
    }

    /// Build the validated deployment this config describes
    pub fn to_deployment(&self) -> Result<Deployment, DeployError> {
        let artifact = self.artifact.as_ref().ok_or_else(|| {
            DeployError::InvalidConfig("no artifact configured (set \"artifact\" or pass --artifact)".to_string())
        })?;

        if self.interpreter.trim().is_empty() {
            return Err(DeployError::InvalidConfig(
                "interpreter must not be empty".to_string(),
            ));
        }

        let plan = DeploymentPlan::new(artifact, &self.remote_dir, self.credential())?
            .with_interpreter(&self.interpreter, &self.script_args)
            .with_host_timeout(self.host_timeout()?)
            .with_log_dir(self.log_dir.as_deref().map(expand_home));

        Deployment::new(self.active_hosts()?, plan)?.with_max_parallel(self.max_parallel)
    }

    /// Check the config without keeping the result
    pub fn validate(&self) -> Result<(), DeployError> {
        self.to_deployment().map(|_| ())
    }
}

/// Expand a leading `~/` to the home directory
pub fn expand_home(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => Path::new(path).to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn config_with_artifact() -> DeployConfig {
        DeployConfig {
            hosts: vec!["192.168.0.62".to_string(), "192.168.0.63".to_string()],
            artifact: Some(PathBuf::from("/tmp/load_tpch.sh")),
            remote_dir: "/home/cloud/tpch".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_default_config() {
        let config = DeployConfig::default();
        assert_eq!(config.version, 1);
        assert!(config.hosts.is_empty());
        assert_eq!(config.remote_dir, "/tmp/fleetrun");
        assert_eq!(config.interpreter, "bash");
        assert_eq!(config.connect_timeout, 30);
        assert!(config.max_parallel.is_none());
        assert!(config.host_timeout.is_none());
        assert!(config.log_dir.is_none());
    }

    #[test]
    fn test_deserialize_minimal() {
        let json = r#"{"version": 1}"#;
        let config: DeployConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config, DeployConfig::default());
    }

    #[test]
    fn test_deserialize_rejects_unknown_fields() {
        let json = r#"{"version": 1, "retries": 3}"#;
        assert!(serde_json::from_str::<DeployConfig>(json).is_err());
    }

    #[test]
    fn test_to_deployment() {
        let deployment = config_with_artifact().to_deployment().unwrap();
        assert_eq!(deployment.hosts().len(), 2);
        assert_eq!(
            deployment.plan().remote_path(),
            "/home/cloud/tpch/load_tpch.sh"
        );
        assert_eq!(
            deployment.plan().command(),
            "bash /home/cloud/tpch/load_tpch.sh"
        );
        assert!(deployment.plan().host_timeout().is_none());
    }

    #[test]
    fn test_log_dir_reaches_plan() {
        let json = r#"{"hosts": ["db-1"], "artifact": "/tmp/load.sh", "log_dir": "/var/log/fleetrun"}"#;
        let config: DeployConfig = serde_json::from_str(json).unwrap();

        let deployment = config.to_deployment().unwrap();
        assert_eq!(
            deployment.plan().log_file(&Host::new("db-1")),
            Some(PathBuf::from("/var/log/fleetrun/db-1.log"))
        );
    }

    #[test]
    fn test_to_deployment_requires_artifact_and_hosts() {
        let config = DeployConfig {
            artifact: None,
            ..config_with_artifact()
        };
        assert!(config.to_deployment().is_err());

        let config = DeployConfig {
            hosts: vec!["a".to_string(), "a".to_string()],
            ..config_with_artifact()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("more than once"));
    }

    #[test]
    fn test_host_timeout_parsing() {
        let config = DeployConfig {
            host_timeout: Some("30m".to_string()),
            ..config_with_artifact()
        };
        assert_eq!(
            config.host_timeout().unwrap(),
            Some(Duration::from_secs(30 * 60))
        );

        let config = DeployConfig {
            host_timeout: Some("soon".to_string()),
            ..config_with_artifact()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_hosts_file_is_appended() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "10.0.0.1\n# 10.0.0.2\n10.0.0.3").unwrap();

        let config = DeployConfig {
            hosts: vec!["db-1".to_string()],
            hosts_file: Some(file.path().to_path_buf()),
            ..Default::default()
        };
        let hosts = config.active_hosts().unwrap();
        assert_eq!(
            hosts,
            vec![Host::new("db-1"), Host::new("10.0.0.1"), Host::new("10.0.0.3")]
        );
    }

    #[test]
    fn test_credential_from_config() {
        let config = DeployConfig {
            user: Some("cloud".to_string()),
            port: Some(2222),
            identity_file: Some("/home/cloud/.ssh/key".to_string()),
            ..Default::default()
        };
        let cred = config.credential();
        assert_eq!(cred.user(), Some("cloud"));
        assert_eq!(cred.port(), Some(2222));
        assert_eq!(cred.identity_file(), Some(Path::new("/home/cloud/.ssh/key")));
    }

    #[test]
    fn test_expand_home() {
        let expanded = expand_home("~/.ssh/key");
        assert!(expanded.ends_with(".ssh/key"));
        assert!(!expanded.starts_with("~"));
        assert_eq!(expand_home("/etc/key"), PathBuf::from("/etc/key"));
    }
}
