//! Configuration loading and types

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use fleetsh_exec::ConnectionInfo;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::CoreError;
use crate::host::ShellContext;

/// Environment variable naming an explicit config file
pub const CONFIG_ENV: &str = "FLEETSH_CONFIG";

/// Top-level configuration: the ordered host list plus timeouts
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// Per-command timeout applied by every host
    #[serde(default)]
    pub command_timeout_secs: Option<u64>,
    /// Cluster-wide deadline after which unsettled hosts are reported incomplete
    #[serde(default)]
    pub deadline_secs: Option<u64>,
    /// Hosts in dispatch order
    #[serde(default, rename = "host")]
    pub hosts: Vec<HostConfig>,
}

/// Configuration for a single host
#[derive(Clone, Serialize, Deserialize)]
pub struct HostConfig {
    /// Unique name, used to tag outcomes
    pub name: String,
    /// IP address or hostname for SSH connection
    pub addr: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// SSH user (defaults to root)
    #[serde(default = "default_user")]
    pub user: String,
    /// Private key files, `~` expanded
    #[serde(default)]
    pub keys: Vec<String>,
    #[serde(default, skip_serializing)]
    pub password: Option<String>,
    /// Elevation context applied by shell operations
    #[serde(default)]
    pub remote_user: Option<String>,
    #[serde(default)]
    pub remote_shell: Option<String>,
    #[serde(default)]
    pub remote_path: Option<String>,
    #[serde(default)]
    pub remote_env: Option<String>,
}

fn default_port() -> u16 {
    22
}

fn default_user() -> String {
    "root".to_string()
}

impl HostConfig {
    /// Minimal config for `addr`, named after it
    pub fn new(addr: impl Into<String>) -> Self {
        let addr = addr.into();
        Self {
            name: addr.clone(),
            addr,
            port: default_port(),
            user: default_user(),
            keys: Vec::new(),
            password: None,
            remote_user: None,
            remote_shell: None,
            remote_path: None,
            remote_env: None,
        }
    }

    /// Whether the host is this machine
    #[must_use]
    pub fn is_local(&self) -> bool {
        self.addr == "localhost" || self.addr == "127.0.0.1"
    }

    /// Transport descriptor for this host
    #[must_use]
    pub fn connection_info(&self) -> ConnectionInfo {
        let mut info = ConnectionInfo::new(&self.addr, &self.user).with_port(self.port);
        for key in &self.keys {
            info = info.with_key(expand_home(key));
        }
        if let Some(password) = &self.password {
            info = info.with_password(password.clone());
        }
        info
    }

    #[must_use]
    pub fn shell_context(&self) -> ShellContext {
        ShellContext {
            user: self.remote_user.clone(),
            shell: self.remote_shell.clone(),
            path: self.remote_path.clone(),
            env: self.remote_env.clone(),
        }
    }
}

impl fmt::Debug for HostConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostConfig")
            .field("name", &self.name)
            .field("addr", &self.addr)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("keys", &self.keys)
            .field("remote_user", &self.remote_user)
            .field("remote_shell", &self.remote_shell)
            .field("remote_path", &self.remote_path)
            .field("remote_env", &self.remote_env)
            .finish_non_exhaustive()
    }
}

/// Expand a leading `~/` to the home directory
fn expand_home(path: &str) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| PathBuf::from(path)),
        None => PathBuf::from(path),
    }
}

impl ClusterConfig {
    /// Parse and validate TOML text
    ///
    /// # Errors
    /// Returns `CoreError::ConfigError` for malformed TOML and
    /// `CoreError::DuplicateHost` when two hosts share a name
    pub fn from_toml_str(content: &str) -> Result<Self, CoreError> {
        let config: ClusterConfig =
            toml::from_str(content).map_err(|e| CoreError::ConfigError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from file
    ///
    /// # Errors
    /// Returns error if file cannot be read, parsed or validated
    pub fn load(path: &Path) -> Result<Self, CoreError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| CoreError::ConfigError(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&content)
    }

    /// Load from `FLEETSH_CONFIG` or the default paths, falling back to an
    /// empty configuration
    ///
    /// # Errors
    /// Returns error if a config file exists but cannot be loaded
    pub fn load_default() -> Result<Self, CoreError> {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            return Self::load(Path::new(&path));
        }

        let mut paths = vec![
            PathBuf::from("fleetsh.toml"),
            PathBuf::from("/etc/fleetsh/fleetsh.toml"),
        ];
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join("fleetsh/fleetsh.toml"));
        }

        for path in paths {
            if path.exists() {
                return Self::load(&path);
            }
        }

        warn!("no config file found, using defaults");
        Ok(Self::default())
    }

    /// Check host names are non-empty and unique
    ///
    /// # Errors
    /// Returns the first problem found
    pub fn validate(&self) -> Result<(), CoreError> {
        let mut seen = HashSet::new();
        for host in &self.hosts {
            if host.name.trim().is_empty() {
                return Err(CoreError::ConfigError(format!(
                    "host with address {} has an empty name",
                    host.addr
                )));
            }
            if !seen.insert(host.name.as_str()) {
                return Err(CoreError::DuplicateHost(host.name.clone()));
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn command_timeout(&self) -> Option<Duration> {
        self.command_timeout_secs.map(Duration::from_secs)
    }

    #[must_use]
    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_secs.map(Duration::from_secs)
    }
}
