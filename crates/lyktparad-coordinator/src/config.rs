// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Coordinator configuration.

use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::Path;
use std::time::Duration;

/// Coordinator configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// Address to bind every listener to (default: 0.0.0.0).
    #[serde(default = "default_bind_address")]
    pub bind_address: IpAddr,

    /// HTTP ingress port (default: 8080).
    #[serde(default = "default_http_port")]
    pub http_port: u16,

    /// Datagram ingress port for register/heartbeat/state/mirror (default: 8081).
    #[serde(default = "default_udp_port")]
    pub udp_port: u16,

    /// Discovery broadcast port, shared with the root's broadcast listener
    /// (default: 5353).
    #[serde(default = "default_broadcast_port")]
    pub broadcast_port: u16,

    /// Fixed well-known port the root's RPC listener is bound to (default:
    /// 8082). RPC requests always target `(session_ip, root_rpc_port)`,
    /// never the ephemeral address a heartbeat or register packet arrived
    /// from, since that's a different socket on the root.
    #[serde(default = "default_root_rpc_port")]
    pub root_rpc_port: u16,

    /// Session heartbeat timeout in seconds; a session idle longer than this
    /// is marked offline (default: 180).
    #[serde(default = "default_heartbeat_timeout")]
    pub heartbeat_timeout_secs: u64,

    /// Consecutive UDP-failure threshold before a session is marked offline
    /// (default: 3).
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    /// Liveness sweep interval in seconds (default: 30).
    #[serde(default = "default_liveness_sweep")]
    pub liveness_sweep_secs: u64,

    /// State snapshot staleness threshold in seconds (default: 10).
    #[serde(default = "default_staleness")]
    pub staleness_secs: u64,

    /// RPC response deadline in seconds (default: 8).
    #[serde(default = "default_rpc_deadline")]
    pub rpc_deadline_secs: u64,

    /// Pending-RPC janitor sweep interval in seconds (default: 60).
    #[serde(default = "default_janitor_sweep")]
    pub janitor_sweep_secs: u64,

    /// Pending-RPC maximum age before forced eviction, in seconds (default: 300).
    #[serde(default = "default_pending_max_age")]
    pub pending_max_age_secs: u64,

    /// Firmware version advertised over mDNS (default: "1.0").
    #[serde(default = "default_version")]
    pub advertised_version: String,

    /// Decode past a checksum mismatch instead of dropping the frame
    /// (default: false — strict drop). The lenient escape hatch exists for
    /// field diagnosis of why a corrupt frame arrived at all.
    #[serde(default)]
    pub checksum_lenient: bool,
}

fn default_bind_address() -> IpAddr {
    "0.0.0.0".parse().unwrap()
}

fn default_http_port() -> u16 {
    8080
}

fn default_udp_port() -> u16 {
    8081
}

fn default_broadcast_port() -> u16 {
    5353
}

fn default_root_rpc_port() -> u16 {
    8082
}

fn default_heartbeat_timeout() -> u64 {
    180
}

fn default_failure_threshold() -> u32 {
    3
}

fn default_liveness_sweep() -> u64 {
    30
}

fn default_staleness() -> u64 {
    10
}

fn default_rpc_deadline() -> u64 {
    8
}

fn default_janitor_sweep() -> u64 {
    60
}

fn default_pending_max_age() -> u64 {
    300
}

fn default_version() -> String {
    "1.0".to_string()
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            http_port: default_http_port(),
            udp_port: default_udp_port(),
            broadcast_port: default_broadcast_port(),
            root_rpc_port: default_root_rpc_port(),
            heartbeat_timeout_secs: default_heartbeat_timeout(),
            failure_threshold: default_failure_threshold(),
            liveness_sweep_secs: default_liveness_sweep(),
            staleness_secs: default_staleness(),
            rpc_deadline_secs: default_rpc_deadline(),
            janitor_sweep_secs: default_janitor_sweep(),
            pending_max_age_secs: default_pending_max_age(),
            advertised_version: default_version(),
            checksum_lenient: false,
        }
    }
}

impl CoordinatorConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;
        serde_json::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Save configuration to a JSON file.
    pub fn to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let content = serde_json::to_string_pretty(self).map_err(|e| ConfigError::SerializeError(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| ConfigError::IoError(e.to_string()))
    }

    /// The address RPC requests should target for a session last seen from
    /// `source`: same IP, fixed `root_rpc_port`.
    pub fn root_rpc_addr(&self, source: std::net::SocketAddr) -> std::net::SocketAddr {
        std::net::SocketAddr::new(source.ip(), self.root_rpc_port)
    }

    /// Heartbeat timeout as a [`Duration`].
    pub fn heartbeat_timeout(&self) -> Duration {
        Duration::from_secs(self.heartbeat_timeout_secs)
    }

    /// Cleanup timeout: `2 * heartbeat_timeout`, per the liveness monitor's
    /// cleanup rule.
    pub fn cleanup_timeout(&self) -> Duration {
        self.heartbeat_timeout() * 2
    }

    /// Liveness sweep interval as a [`Duration`].
    pub fn liveness_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.liveness_sweep_secs)
    }

    /// Staleness threshold as a [`Duration`].
    pub fn staleness(&self) -> Duration {
        Duration::from_secs(self.staleness_secs)
    }

    /// RPC response deadline as a [`Duration`].
    pub fn rpc_deadline(&self) -> Duration {
        Duration::from_secs(self.rpc_deadline_secs)
    }

    /// Pending-RPC janitor sweep interval as a [`Duration`].
    pub fn janitor_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.janitor_sweep_secs)
    }

    /// Pending-RPC maximum age as a [`Duration`].
    pub fn pending_max_age(&self) -> Duration {
        Duration::from_secs(self.pending_max_age_secs)
    }

    /// The decoder checksum policy this config selects.
    pub fn checksum_policy(&self) -> lyktparad_proto::ChecksumPolicy {
        if self.checksum_lenient {
            lyktparad_proto::ChecksumPolicy::LogAndContinue
        } else {
            lyktparad_proto::ChecksumPolicy::Strict
        }
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.http_port == 0 {
            return Err(ConfigError::InvalidValue("http_port cannot be 0".into()));
        }
        if self.udp_port == 0 {
            return Err(ConfigError::InvalidValue("udp_port cannot be 0".into()));
        }
        if self.http_port == self.udp_port {
            return Err(ConfigError::InvalidValue("http_port and udp_port must differ".into()));
        }
        if self.root_rpc_port == 0 {
            return Err(ConfigError::InvalidValue("root_rpc_port cannot be 0".into()));
        }
        if self.heartbeat_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue("heartbeat_timeout_secs cannot be 0".into()));
        }
        if self.failure_threshold == 0 {
            return Err(ConfigError::InvalidValue("failure_threshold cannot be 0".into()));
        }
        Ok(())
    }
}

/// Configuration error types.
#[derive(Debug, Clone)]
pub enum ConfigError {
    /// The file could not be read or written.
    IoError(String),
    /// The file's JSON could not be parsed.
    ParseError(String),
    /// The config could not be serialized to JSON.
    SerializeError(String),
    /// A field's value failed validation.
    InvalidValue(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::IoError(s) => write!(f, "I/O error: {s}"),
            Self::ParseError(s) => write!(f, "parse error: {s}"),
            Self::SerializeError(s) => write!(f, "serialize error: {s}"),
            Self::InvalidValue(s) => write!(f, "invalid value: {s}"),
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = CoordinatorConfig::default();
        assert_eq!(config.http_port, 8080);
        assert_eq!(config.udp_port, 8081);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_matching_ports() {
        let mut config = CoordinatorConfig::default();
        config.udp_port = config.http_port;
        assert!(config.validate().is_err());
    }

    #[test]
    fn file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("coordinator.json");
        let config = CoordinatorConfig::default();
        config.to_file(&path).unwrap();
        let loaded = CoordinatorConfig::from_file(&path).unwrap();
        assert_eq!(loaded.http_port, config.http_port);
    }

    #[test]
    fn missing_keys_fall_back_to_defaults() {
        let config: CoordinatorConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.http_port, default_http_port());
    }
}
