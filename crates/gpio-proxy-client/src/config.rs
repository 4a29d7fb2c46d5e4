//! Connection configuration.
//!
//! Settings can be written as YAML:
//!
//! ```yaml
//! host: 10.0.0.13
//! port: 5122
//! timeout_ms: 500
//! ```

use std::net::{SocketAddr, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::time::Duration;

use gpio_proxy_protocol::DEFAULT_PORT;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while loading or resolving a [`ProxyConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        /// File that was read.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The YAML was invalid.
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// The host did not resolve to an address.
    #[error("cannot resolve {host}: {reason}")]
    Resolve {
        /// Host and port that were looked up.
        host: String,
        /// What went wrong.
        reason: String,
    },
}

/// Where the daemon is and how long to wait for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// Daemon host name or address.
    pub host: String,
    /// Daemon UDP port.
    pub port: u16,
    /// Local port to bind. `None` lets the OS pick one, which allows
    /// several clients on the same host.
    pub local_port: Option<u16>,
    /// Per-call reply deadline in milliseconds. `None` or 0 waits forever.
    pub timeout_ms: Option<u64>,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        ProxyConfig {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            local_port: None,
            timeout_ms: None,
        }
    }
}

impl ProxyConfig {
    /// Config for `host` with defaults for everything else.
    pub fn new(host: impl Into<String>) -> Self {
        ProxyConfig {
            host: host.into(),
            ..Default::default()
        }
    }

    /// Load a config from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&text)
    }

    /// Parse a config from YAML text.
    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// The reply deadline.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms
            .filter(|&ms| ms > 0)
            .map(Duration::from_millis)
    }

    /// Set the reply deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    /// Resolve the daemon's socket address.
    pub fn remote_addr(&self) -> Result<SocketAddr, ConfigError> {
        let target = format!("{}:{}", self.host, self.port);
        let mut addrs = (self.host.as_str(), self.port)
            .to_socket_addrs()
            .map_err(|e| ConfigError::Resolve {
                host: target.clone(),
                reason: e.to_string(),
            })?;
        addrs.next().ok_or_else(|| ConfigError::Resolve {
            host: target,
            reason: "no addresses returned".to_string(),
        })
    }
}
