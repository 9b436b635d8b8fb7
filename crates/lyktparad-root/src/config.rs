// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Root bridge configuration.

use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::Path;
use std::time::Duration;

/// Root bridge configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RootConfig {
    /// Address to bind the RPC listener and outbound socket to (default: 0.0.0.0).
    #[serde(default = "default_bind_address")]
    pub bind_address: IpAddr,

    /// Fixed well-known port the RPC listener binds to (default: 8082). RPC
    /// requests always arrive here; the listener replies to the request's
    /// source address, not a separately configured coordinator address.
    #[serde(default = "default_rpc_port")]
    pub rpc_port: u16,

    /// Discovery broadcast port, shared with the coordinator's broadcast
    /// emitter (default: 5353).
    #[serde(default = "default_broadcast_port")]
    pub broadcast_port: u16,

    /// Bridge heartbeat interval in seconds (default: 45). Distinct from any
    /// mesh-internal liveness beacon — this is the bridge's own signal to
    /// the coordinator, never conflated with the mesh fabric's.
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_secs: u64,

    /// State snapshot interval in seconds (default: 3).
    #[serde(default = "default_state_interval")]
    pub state_interval_secs: u64,

    /// Registration ACK timeout in seconds (default: 5).
    #[serde(default = "default_register_ack_timeout")]
    pub register_ack_timeout_secs: u64,

    /// mDNS query timeout in seconds (default: 20).
    #[serde(default = "default_mdns_timeout")]
    pub mdns_timeout_secs: u64,

    /// Lower bound of discovery retry backoff in seconds (default: 5).
    #[serde(default = "default_discovery_backoff_min")]
    pub discovery_backoff_min_secs: u64,

    /// Upper bound of discovery retry backoff in seconds (default: 60).
    #[serde(default = "default_discovery_backoff_max")]
    pub discovery_backoff_max_secs: u64,

    /// Firmware version string this root reports at registration and over
    /// `/api/ota/version` (default: "1.0.0").
    #[serde(default = "default_version")]
    pub firmware_version: String,

    /// Path to the discovered-server / override cache file (default:
    /// "lyktparad-root-cache.json" in the working directory).
    #[serde(default = "default_cache_path")]
    pub cache_path: String,

    /// Decode past a checksum mismatch instead of dropping the frame
    /// (default: false — strict drop).
    #[serde(default)]
    pub checksum_lenient: bool,
}

fn default_bind_address() -> IpAddr {
    "0.0.0.0".parse().unwrap()
}

fn default_rpc_port() -> u16 {
    8082
}

fn default_broadcast_port() -> u16 {
    5353
}

fn default_heartbeat_interval() -> u64 {
    45
}

fn default_state_interval() -> u64 {
    3
}

fn default_register_ack_timeout() -> u64 {
    5
}

fn default_mdns_timeout() -> u64 {
    20
}

fn default_discovery_backoff_min() -> u64 {
    5
}

fn default_discovery_backoff_max() -> u64 {
    60
}

fn default_version() -> String {
    "1.0.0".to_string()
}

fn default_cache_path() -> String {
    "lyktparad-root-cache.json".to_string()
}

impl Default for RootConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            rpc_port: default_rpc_port(),
            broadcast_port: default_broadcast_port(),
            heartbeat_interval_secs: default_heartbeat_interval(),
            state_interval_secs: default_state_interval(),
            register_ack_timeout_secs: default_register_ack_timeout(),
            mdns_timeout_secs: default_mdns_timeout(),
            discovery_backoff_min_secs: default_discovery_backoff_min(),
            discovery_backoff_max_secs: default_discovery_backoff_max(),
            firmware_version: default_version(),
            cache_path: default_cache_path(),
            checksum_lenient: false,
        }
    }
}

impl RootConfig {
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

    /// Registration ACK timeout as a [`Duration`].
    pub fn register_ack_timeout(&self) -> Duration {
        Duration::from_secs(self.register_ack_timeout_secs)
    }

    /// Bridge heartbeat interval as a [`Duration`].
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }

    /// State snapshot interval as a [`Duration`].
    pub fn state_interval(&self) -> Duration {
        Duration::from_secs(self.state_interval_secs)
    }

    /// mDNS query timeout as a [`Duration`].
    pub fn mdns_timeout(&self) -> Duration {
        Duration::from_secs(self.mdns_timeout_secs)
    }

    /// Discovery retry backoff bounds as [`Duration`]s.
    pub fn discovery_backoff_range(&self) -> (Duration, Duration) {
        (
            Duration::from_secs(self.discovery_backoff_min_secs),
            Duration::from_secs(self.discovery_backoff_max_secs),
        )
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
        if self.rpc_port == 0 {
            return Err(ConfigError::InvalidValue("rpc_port cannot be 0".into()));
        }
        if self.broadcast_port == 0 {
            return Err(ConfigError::InvalidValue("broadcast_port cannot be 0".into()));
        }
        if self.heartbeat_interval_secs == 0 {
            return Err(ConfigError::InvalidValue("heartbeat_interval_secs cannot be 0".into()));
        }
        if self.state_interval_secs == 0 {
            return Err(ConfigError::InvalidValue("state_interval_secs cannot be 0".into()));
        }
        if self.discovery_backoff_min_secs > self.discovery_backoff_max_secs {
            return Err(ConfigError::InvalidValue(
                "discovery_backoff_min_secs cannot exceed discovery_backoff_max_secs".into(),
            ));
        }
        if self.firmware_version.as_bytes().len() > 31 {
            return Err(ConfigError::InvalidValue("firmware_version must fit in 31 bytes".into()));
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
        let config = RootConfig::default();
        assert_eq!(config.rpc_port, 8082);
        assert_eq!(config.heartbeat_interval_secs, 45);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_inverted_backoff_range() {
        let mut config = RootConfig::default();
        config.discovery_backoff_min_secs = 100;
        config.discovery_backoff_max_secs = 10;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_oversized_firmware_version() {
        let mut config = RootConfig::default();
        config.firmware_version = "x".repeat(32);
        assert!(config.validate().is_err());
    }

    #[test]
    fn file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("root.json");
        let config = RootConfig::default();
        config.to_file(&path).unwrap();
        let loaded = RootConfig::from_file(&path).unwrap();
        assert_eq!(loaded.rpc_port, config.rpc_port);
    }

    #[test]
    fn missing_keys_fall_back_to_defaults() {
        let config: RootConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.rpc_port, default_rpc_port());
        assert_eq!(config.firmware_version, default_version());
    }
}
