//! TOML configuration with built-in defaults
//!
//! ```toml
//! [target]
//! name = "cluster01.example.com"
//! level = 12
//! version = 32774
//!
//! [ssh]
//! user = "CORP\\admin"
//! port = 22
//! identity_file = "~/.ssh/id_ed25519"
//! connect_timeout_secs = 30
//! shell = "powershell"
//! known_hosts = "~/.ssh/known_hosts"
//! host_key_fingerprint = "SHA256:..."
//! accept_unknown_host_keys = false
//! ```
//!
//! Every key is optional. Command-line flags and environment variables
//! override the file.

use crate::cli::TargetArgs;
use crate::paths;
use crate::ssh::SshSettings;
use anyhow::{Context, Result};
use reconcile::ClusterLevel;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_TARGET: &str = "cluster01.example.com";
pub const DEFAULT_LEVEL: i64 = 12;
pub const DEFAULT_VERSION: i64 = 32774;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub target: TargetConfig,
    pub ssh: SshConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetConfig {
    pub name: String,
    pub level: i64,
    pub version: i64,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_TARGET.to_string(),
            level: DEFAULT_LEVEL,
            version: DEFAULT_VERSION,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SshConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    pub port: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity_file: Option<String>,
    pub connect_timeout_secs: u64,
    pub shell: String,
    pub known_hosts: String,
    /// Pin the server key instead of consulting `known_hosts`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host_key_fingerprint: Option<String>,
    pub accept_unknown_host_keys: bool,
}

impl Default for SshConfig {
    fn default() -> Self {
        Self {
            user: None,
            port: 22,
            identity_file: None,
            connect_timeout_secs: 30,
            shell: "powershell".to_string(),
            known_hosts: "~/.ssh/known_hosts".to_string(),
            host_key_fingerprint: None,
            accept_unknown_host_keys: false,
        }
    }
}

impl Config {
    /// Load the config file, or defaults if it does not exist
    pub fn load() -> Result<Self> {
        Self::load_from(&paths::config_file()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Invalid config in {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Invalid TOML format in clusterlevel config")
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("Could not create {}", dir.display()))?;
        }
        fs::write(path, self.to_toml()?)
            .with_context(|| format!("Could not write {}", path.display()))
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize config")
    }

    /// Apply command-line (and environment) overrides on top of the file
    pub fn with_overrides(mut self, args: &TargetArgs) -> Self {
        if let Some(name) = &args.target {
            self.target.name.clone_from(name);
        }
        if let Some(level) = args.level {
            self.target.level = level;
        }
        if let Some(version) = args.upgrade_version {
            self.target.version = version;
        }
        if let Some(user) = &args.user {
            self.ssh.user = Some(user.clone());
        }
        if let Some(identity) = &args.identity_file {
            self.ssh.identity_file = Some(identity.to_string_lossy().into_owned());
        }
        if let Some(port) = args.port {
            self.ssh.port = port;
        }
        self
    }

    pub fn desired(&self) -> ClusterLevel {
        ClusterLevel::new(self.target.level, self.target.version)
    }

    pub fn ssh_settings(&self) -> SshSettings {
        let known_hosts = Some(self.ssh.known_hosts.as_str())
            .filter(|p| !p.is_empty())
            .map(paths::expand);
        SshSettings {
            port: self.ssh.port,
            identity_file: self.ssh.identity_file.as_deref().map(paths::expand),
            connect_timeout: Duration::from_secs(self.ssh.connect_timeout_secs),
            shell: self.ssh.shell.clone(),
            known_hosts,
            host_key_fingerprint: self.ssh.host_key_fingerprint.clone(),
            accept_unknown_host_keys: self.ssh.accept_unknown_host_keys,
        }
    }
}
