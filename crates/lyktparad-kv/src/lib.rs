// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! A small persistent key/value store.
//!
//! The root node uses this for exactly two things: the discovered-server
//! cache (address + UDP port, written once a discovery succeeds, read at
//! boot) and the manual-override triple (hostname, port, resolved address).
//! No schema migration is needed — a missing key simply means "not
//! configured". The on-disk format and load/save split mirror
//! `ServerConfig::from_file`/`to_file` in the coordinator's own config
//! layer: one JSON document, read whole, written whole.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

/// A value the store can hold. Kept intentionally small — the bridge never
/// needs structured values, only scalars.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// A UTF-8 string value.
    String(String),
    /// A signed integer value.
    Integer(i64),
    /// An opaque byte blob, stored as a JSON array of bytes.
    Blob(Vec<u8>),
}

impl Value {
    /// View this value as a string, if it is one.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// View this value as an integer, if it is one.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// View this value as a byte blob, if it is one.
    pub fn as_blob(&self) -> Option<&[u8]> {
        match self {
            Value::Blob(b) => Some(b),
            _ => None,
        }
    }
}

/// Failure reading or writing the store's backing file.
#[derive(Debug)]
pub enum KvError {
    /// The file could not be read or written.
    Io(String),
    /// The file's contents were not valid JSON, or not the expected shape.
    Parse(String),
}

impl std::fmt::Display for KvError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KvError::Io(s) => write!(f, "I/O error: {s}"),
            KvError::Parse(s) => write!(f, "parse error: {s}"),
        }
    }
}

impl std::error::Error for KvError {}

/// What the bridge needs from a persistent key/value store. Kept as a trait
/// so the discovery cache and manual-override logic can be tested against
/// an in-memory implementation without touching a filesystem.
pub trait KvStore: Send + Sync {
    /// Fetch `key`, if present.
    fn get(&self, key: &str) -> Option<Value>;
    /// Set `key` to `value`, persisting immediately.
    fn set(&self, key: &str, value: Value) -> Result<(), KvError>;
    /// Remove `key`, if present.
    fn remove(&self, key: &str) -> Result<(), KvError>;
}

/// A [`KvStore`] backed by a single JSON file, rewritten whole on every
/// write — adequate for a handful of keys updated at most a few times a
/// minute.
pub struct JsonFileKvStore {
    path: PathBuf,
    data: RwLock<HashMap<String, Value>>,
}

impl JsonFileKvStore {
    /// Open (or create) the store at `path`, loading any existing contents.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, KvError> {
        let path = path.into();
        let data = if path.exists() {
            Self::load(&path)?
        } else {
            HashMap::new()
        };
        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    fn load(path: &Path) -> Result<HashMap<String, Value>, KvError> {
        let content = std::fs::read_to_string(path).map_err(|e| KvError::Io(e.to_string()))?;
        serde_json::from_str(&content).map_err(|e| KvError::Parse(e.to_string()))
    }

    fn persist(&self, data: &HashMap<String, Value>) -> Result<(), KvError> {
        let content = serde_json::to_string_pretty(data).map_err(|e| KvError::Parse(e.to_string()))?;
        std::fs::write(&self.path, content).map_err(|e| KvError::Io(e.to_string()))
    }
}

impl KvStore for JsonFileKvStore {
    fn get(&self, key: &str) -> Option<Value> {
        self.data.read().expect("kv store rwlock poisoned").get(key).cloned()
    }

    fn set(&self, key: &str, value: Value) -> Result<(), KvError> {
        let mut guard = self.data.write().expect("kv store rwlock poisoned");
        guard.insert(key.to_string(), value);
        self.persist(&guard)
    }

    fn remove(&self, key: &str) -> Result<(), KvError> {
        let mut guard = self.data.write().expect("kv store rwlock poisoned");
        guard.remove(key);
        self.persist(&guard)
    }
}

/// Well-known keys the root node reads/writes.
pub mod keys {
    /// Discovered coordinator address, as a dotted-quad string.
    pub const SERVER_IP: &str = "server_ip";
    /// Discovered coordinator UDP port.
    pub const SERVER_PORT: &str = "server_port";
    /// Manually overridden coordinator hostname, if any.
    pub const OVERRIDE_HOSTNAME: &str = "override_hostname";
    /// Manually overridden coordinator port, if any.
    pub const OVERRIDE_PORT: &str = "override_port";
    /// Address the override hostname last resolved to.
    pub const OVERRIDE_RESOLVED_ADDRESS: &str = "override_resolved_address";
}
