use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, io};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DaemonConfig {
    pub listen_addr: SocketAddr,
    #[serde(default)]
    pub bluetooth: BluetoothConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub http: HttpConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BluetoothConfig {
    /// Reply timeout for each D-Bus call.
    pub call_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    pub path: PathBuf,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HttpConfig {
    pub cors: bool,
    /// Page served at `/`, if any.
    pub static_index: Option<PathBuf>,
}

impl Default for BluetoothConfig {
    fn default() -> Self {
        // libdbus' default reply timeout
        Self {
            call_timeout_secs: 25,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("/var/lib/btbroker/tokens"),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            cors: true,
            static_index: None,
        }
    }
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            bluetooth: BluetoothConfig::default(),
            storage: StorageConfig::default(),
            http: HttpConfig::default(),
        }
    }
}

impl BluetoothConfig {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }
}

impl DaemonConfig {
    pub fn load(path: &str) -> Result<Self> {
        match fs::read_to_string(path) {
            Ok(content) => {
                toml::from_str(&content).with_context(|| format!("invalid config file {}", path))
            }
            Err(e) if e.kind() != io::ErrorKind::NotFound => {
                Err(e).with_context(|| format!("cannot read config file {}", path))
            }
            Err(_) => {
                // Create default config if not found
                let config = Self::default();
                if let Err(e) = fs::write(path, toml::to_string_pretty(&config)?) {
                    tracing::debug!("Not writing default config to {}: {}", path, e);
                }
                Ok(config)
            }
        }
    }

    /// Replaces the port of `listen_addr`, e.g. from `$PORT`.
    pub fn with_port(mut self, port: Option<u16>) -> Self {
        if let Some(port) = port {
            self.listen_addr.set_port(port);
        }
        self
    }
}
