// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Route table: the stable public HTTP contract this coordinator exposes.

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::app::AppState;
use crate::handlers;

/// Build the full coordinator router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/nodes", get(handlers::nodes))
        .route("/api/color", get(handlers::get_color).post(handlers::set_color))
        .route("/api/sequence", post(handlers::sequence_upload))
        .route("/api/sequence/pointer", get(handlers::sequence_pointer))
        .route("/api/sequence/start", post(handlers::sequence_start))
        .route("/api/sequence/stop", post(handlers::sequence_stop))
        .route("/api/sequence/reset", post(handlers::sequence_reset))
        .route("/api/sequence/status", get(handlers::sequence_status))
        .route("/api/ota/download", post(handlers::ota_download))
        .route("/api/ota/status", get(handlers::ota_status))
        .route("/api/ota/version", get(handlers::ota_version))
        .route("/api/ota/cancel", post(handlers::ota_cancel))
        .route("/api/ota/distribute", post(handlers::ota_distribute))
        .route("/api/ota/distribution/status", get(handlers::ota_distribution_status))
        .route("/api/ota/distribution/progress", get(handlers::ota_distribution_progress))
        .route("/api/ota/distribution/cancel", post(handlers::ota_distribution_cancel))
        .route("/api/ota/reboot", post(handlers::ota_reboot))
        .route("/api/mesh/state", get(handlers::mesh_state))
        .route("/health", get(handlers::health))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
