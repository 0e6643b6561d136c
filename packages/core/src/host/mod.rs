//! Host management module
//!
//! Provides the types that describe which machines a run targets:
//! - Host and credential types
//! - Host list parsing (commented-out hosts are disabled)
//! - SSH config lookup for effective login settings

mod error;
mod inventory;
mod schema;
mod ssh_config;

// Public exports
pub use error::TransportError;
pub use inventory::{find_duplicate, load_host_list, parse_host_list};
pub use schema::{Credential, Host};
pub use ssh_config::{
    EffectiveLogin, SettingSource, SshConfigMatch, effective_login, get_ssh_config_path,
    query_ssh_config, query_ssh_config_file,
};
