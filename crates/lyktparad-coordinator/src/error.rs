// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Coordinator error types.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

/// Top-level coordinator error.
#[derive(Debug)]
pub enum CoordinatorError {
    /// Configuration failed validation.
    Config(String),
    /// A listening socket could not be bound.
    Bind(String),
    /// `run()` was called on an already-running coordinator.
    AlreadyRunning,
    /// An I/O operation failed.
    Io(String),
}

impl std::fmt::Display for CoordinatorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(s) => write!(f, "configuration error: {s}"),
            Self::Bind(s) => write!(f, "bind error: {s}"),
            Self::AlreadyRunning => write!(f, "coordinator already running"),
            Self::Io(s) => write!(f, "I/O error: {s}"),
        }
    }
}

impl std::error::Error for CoordinatorError {}

impl From<std::io::Error> for CoordinatorError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

/// The HTTP-facing error taxonomy: no
/// registered root → 404, session offline/timeout → 503, invalid body → 400,
/// conflict → 409, everything else → 500. Every 503 that can name the
/// session's direct address does so in `suggestion`, since operators rely on
/// it as a fallback path when the bridge itself is unreachable.
#[derive(Debug, Serialize)]
pub struct ApiError {
    /// Machine-readable reason, always present on a non-2xx response.
    pub error: String,
    #[serde(skip)]
    status: u16,
    /// Direct UDP endpoint of the root, when known, so an operator can hit
    /// it without going through the coordinator.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl ApiError {
    /// No session is registered for this bridge at all.
    pub fn no_session() -> Self {
        Self {
            error: "no root registered; try the root's address directly once you know it".to_string(),
            status: 404,
            suggestion: None,
        }
    }

    /// A session exists but is currently marked offline.
    pub fn offline(direct_addr: std::net::SocketAddr) -> Self {
        Self {
            error: "session is offline".to_string(),
            status: 503,
            suggestion: Some(format!("http://{}:{}", direct_addr.ip(), direct_addr.port())),
        }
    }

    /// The RPC timed out waiting for a response (after retries, if any).
    pub fn timeout(direct_addr: std::net::SocketAddr) -> Self {
        Self {
            error: "timeout".to_string(),
            status: 503,
            suggestion: Some(format!("http://{}:{}", direct_addr.ip(), direct_addr.port())),
        }
    }

    /// The request body failed validation.
    pub fn bad_request(reason: impl Into<String>) -> Self {
        Self {
            error: reason.into(),
            status: 400,
            suggestion: None,
        }
    }

    /// The handler reported a conflict (e.g. an OTA version downgrade).
    pub fn conflict(reason: impl Into<String>) -> Self {
        Self {
            error: reason.into(),
            status: 409,
            suggestion: None,
        }
    }

    /// Anything else: decode failure, unexpected I/O error, etc.
    pub fn internal(reason: impl Into<String>) -> Self {
        Self {
            error: reason.into(),
            status: 500,
            suggestion: None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self)).into_response()
    }
}
