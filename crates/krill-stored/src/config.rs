//! TOML configuration for the storage node daemon.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Top-level configuration, parsed from TOML. CLI flags override these.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct StoredConfig {
    /// Node addresses and data location.
    pub node: NodeSection,
    /// Chunk storage backend.
    pub storage: StorageSection,
    /// Coordinator endpoint.
    pub coordinator: CoordinatorSection,
    /// Logging configuration.
    pub log: LogSection,
}

/// `[node]` section.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct NodeSection {
    /// Address to bind the chunk listener on. Port `0` picks a free port.
    pub listen_addr: String,
    /// IPv4 address advertised to the coordinator for chunk transfers.
    pub advertise_ip: String,
    /// Directory for chunk files (file backend).
    pub data_dir: PathBuf,
}

impl Default for NodeSection {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:9000".to_string(),
            advertise_ip: "127.0.0.1".to_string(),
            data_dir: PathBuf::from("./krill-chunks"),
        }
    }
}

/// `[storage]` section.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct StorageSection {
    /// Backend type: `"file"` (default) or `"memory"`.
    pub backend: String,
    /// Byte budget for stored chunks.
    pub capacity_bytes: u64,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            backend: "file".to_string(),
            capacity_bytes: 10 * 1024 * 1024 * 1024,
        }
    }
}

/// `[coordinator]` section.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct CoordinatorSection {
    /// `host:port` of the metadata coordinator.
    pub addr: String,
}

impl Default for CoordinatorSection {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:8080".to_string(),
        }
    }
}

/// `[log]` section.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LogSection {
    /// Log level filter.
    pub level: String,
}

impl Default for LogSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl StoredConfig {
    /// Load config from a TOML file, or defaults if no path is given.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(p) => {
                let content = std::fs::read_to_string(p)?;
                Ok(toml::from_str(&content)?)
            }
            None => Ok(Self::default()),
        }
    }

    /// Parse config from a TOML string (used in tests).
    #[cfg(test)]
    pub fn from_toml(s: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(s)?)
    }
}
