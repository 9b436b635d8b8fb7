// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Root bridge error types: the single error boundary `main.rs`'s startup
//! sequence returns through, so `config.rs`/`lyktparad-kv`/socket-bind
//! failures all report through one `Display` rather than three ad hoc
//! `eprintln!` call sites.

/// Top-level root bridge error.
#[derive(Debug)]
pub enum RootError {
    /// Configuration failed validation or failed to load from disk.
    Config(String),
    /// The discovery cache store could not be opened.
    Cache(String),
    /// A listening socket could not be bound.
    Bind(String),
    /// An I/O operation failed.
    Io(String),
}

impl std::fmt::Display for RootError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(s) => write!(f, "configuration error: {s}"),
            Self::Cache(s) => write!(f, "cache store error: {s}"),
            Self::Bind(s) => write!(f, "bind error: {s}"),
            Self::Io(s) => write!(f, "I/O error: {s}"),
        }
    }
}

impl std::error::Error for RootError {}

impl From<std::io::Error> for RootError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

impl From<crate::config::ConfigError> for RootError {
    fn from(e: crate::config::ConfigError) -> Self {
        Self::Config(e.to_string())
    }
}

impl From<lyktparad_kv::KvError> for RootError {
    fn from(e: lyktparad_kv::KvError) -> Self {
        Self::Cache(e.to_string())
    }
}
