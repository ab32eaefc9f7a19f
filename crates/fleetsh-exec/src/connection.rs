//! Connection descriptors

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Connection information for SSH
#[derive(Clone, Serialize, Deserialize)]
pub struct ConnectionInfo {
    /// Host address
    pub host: String,
    /// Port (default 22)
    #[serde(default = "default_port")]
    pub port: u16,
    /// Username
    pub user: String,
    /// Private key files, tried in order
    #[serde(default)]
    pub keys: Vec<PathBuf>,
    /// Password, tried after all keys
    #[serde(default, skip_serializing)]
    pub password: Option<String>,
}

fn default_port() -> u16 {
    22
}

impl ConnectionInfo {
    /// Create new connection info
    pub fn new(host: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: default_port(),
            user: user.into(),
            keys: Vec::new(),
            password: None,
        }
    }

    /// Add a private key file
    #[must_use]
    pub fn with_key(mut self, path: impl Into<PathBuf>) -> Self {
        self.keys.push(path.into());
        self
    }

    /// Set password
    #[must_use]
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Set custom port
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }
}

impl fmt::Debug for ConnectionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionInfo")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("keys", &self.keys)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_password() {
        let info = ConnectionInfo::new("10.0.0.1", "ubuntu").with_password("hunter2");
        let debug = format!("{info:?}");

        assert!(debug.contains("<redacted>"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn test_defaults() {
        let info = ConnectionInfo::new("db-1", "root")
            .with_key("/keys/a")
            .with_key("/keys/b");

        assert_eq!(info.port, 22);
        assert_eq!(info.keys.len(), 2);
        assert!(info.password.is_none());
    }
}
