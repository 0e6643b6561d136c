//! Host list parsing
//!
//! Host lists are plain text: one or more hosts per line, `#` starts a
//! comment. A commented-out host is simply not part of the active set.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use crate::deploy::DeployError;

use super::schema::Host;

/// Parse a host list, dropping comments and blank lines
///
/// Order is preserved. Duplicates are kept so callers can report them.
pub fn parse_host_list(content: &str) -> Vec<Host> {
    content
        .lines()
        .map(|line| line.split_once('#').map_or(line, |(active, _)| active))
        .flat_map(|line| line.split(|c: char| c.is_whitespace() || c == ','))
        .filter(|entry| !entry.is_empty())
        .map(Host::from)
        .collect()
}

/// Load a host list from a file
pub fn load_host_list(path: &Path) -> Result<Vec<Host>, DeployError> {
    let contents = fs::read_to_string(path).map_err(|e| {
        DeployError::LoadFailed(format!("Failed to read {}: {}", path.display(), e))
    })?;

    let hosts = parse_host_list(&contents);
    tracing::debug!("Loaded {} hosts from {}", hosts.len(), path.display());
    Ok(hosts)
}

/// First host that appears more than once, if any
pub fn find_duplicate(hosts: &[Host]) -> Option<&Host> {
    let mut seen = HashSet::with_capacity(hosts.len());
    hosts.iter().find(|host| !seen.insert(host.as_str()))
}
