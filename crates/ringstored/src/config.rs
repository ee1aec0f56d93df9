//! TOML configuration for the ringstore daemon.
//!
//! Every section is optional; missing keys fall back to defaults, and CLI
//! flags override whatever the file says.

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use ringstore_net::TransportConfig;
use ringstore_types::RingSize;
use serde::Deserialize;

/// Top-level configuration, parsed from TOML.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Listen address of this process.
    pub node: NodeSection,
    /// Ring parameters and initial membership.
    pub ring: RingSection,
    /// Outgoing RPC timeouts.
    pub rpc: RpcSection,
    /// Logging configuration.
    pub log: LogSection,
}

/// `[node]` section.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct NodeSection {
    /// Address the block store or meta store listens on.
    pub listen_addr: String,
}

impl Default for NodeSection {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:4820".to_string(),
        }
    }
}

/// `[ring]` section.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RingSection {
    /// Size of the circular index space. Must match on every node.
    pub size: u64,
    /// Block stores placed on the ring when the meta store starts.
    pub block_stores: Vec<String>,
}

impl Default for RingSection {
    fn default() -> Self {
        Self {
            size: 1024,
            block_stores: Vec::new(),
        }
    }
}

/// `[rpc]` section.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RpcSection {
    /// Budget for one TCP connect attempt, in milliseconds.
    pub connect_timeout_ms: u64,
    /// Budget for one request/response exchange, in milliseconds.
    pub request_timeout_ms: u64,
    /// Connect attempts before a peer is reported unreachable.
    pub connect_attempts: u32,
}

impl Default for RpcSection {
    fn default() -> Self {
        let defaults = TransportConfig::default();
        Self {
            connect_timeout_ms: defaults.connect_timeout.as_millis() as u64,
            request_timeout_ms: defaults.request_timeout.as_millis() as u64,
            connect_attempts: defaults.connect_attempts,
        }
    }
}

/// `[log]` section.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LogSection {
    /// Log level filter (e.g. `"info"`, `"debug"`, `"warn"`).
    pub level: String,
}

impl Default for LogSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl CliConfig {
    /// Load config from a TOML file, or use defaults if no path given.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(p) => {
                let content = std::fs::read_to_string(p)
                    .with_context(|| format!("cannot read {}", p.display()))?;
                let config: CliConfig = toml::from_str(&content)
                    .with_context(|| format!("invalid config in {}", p.display()))?;
                Ok(config)
            }
            None => Ok(Self::default()),
        }
    }

    /// Parse config from a TOML string (used in tests).
    #[cfg(test)]
    pub fn from_toml(s: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(s)?)
    }

    /// The configured ring size. Zero is rejected.
    pub fn ring_size(&self) -> anyhow::Result<RingSize> {
        RingSize::new(self.ring.size).context("[ring] size must be positive")
    }

    /// Timeouts for outgoing RPCs.
    pub fn transport_config(&self) -> TransportConfig {
        TransportConfig {
            connect_timeout: Duration::from_millis(self.rpc.connect_timeout_ms),
            request_timeout: Duration::from_millis(self.rpc.request_timeout_ms),
            connect_attempts: self.rpc.connect_attempts,
        }
    }
}
