//! TOML configuration for the coordinator daemon.

use std::path::Path;

use krill_types::MAX_CLIENTS;
use serde::Deserialize;

/// Top-level configuration, parsed from TOML. CLI flags override these.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CoordConfig {
    /// Listen address.
    pub node: NodeSection,
    /// Connection limits.
    pub limits: LimitsSection,
    /// Logging configuration.
    pub log: LogSection,
}

/// `[node]` section.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct NodeSection {
    /// Address to bind the listener on.
    pub listen_addr: String,
    /// TCP port for the request loop.
    pub port: u16,
}

impl Default for NodeSection {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

/// `[limits]` section.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LimitsSection {
    /// Maximum concurrently serviced connections; the excess connection is
    /// closed without a reply.
    pub max_clients: usize,
}

impl Default for LimitsSection {
    fn default() -> Self {
        Self {
            max_clients: MAX_CLIENTS,
        }
    }
}

/// `[log]` section.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LogSection {
    /// Log level filter (e.g. `"info"`, `"debug"`).
    pub level: String,
}

impl Default for LogSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl CoordConfig {
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

    /// The `addr:port` string to bind.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.node.listen_addr, self.node.port)
    }
}
