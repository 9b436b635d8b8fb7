// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! HTTP request handlers: one per endpoint in the public API table. Every
//! handler that reaches the mesh funnels through [`AppState::perform_rpc`];
//! the only endpoints that don't issue an RPC are `/api/mesh/state` (reads
//! the locally-cached snapshot) and `/health` (self-report).

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use lyktparad_proto::command::ApiOp;
use lyktparad_proto::payload::{
    ColorResponse, NodesResponse, OtaDownloadRequest, OtaRebootRequest, OtaStatusResponse, OtaVersionResponse,
    PayloadError, ProgressResponse, SequencePointerResponse, SequenceStatusResponse, SequenceUploadRequest,
    SetColorRequest, SuccessResponse,
};
use serde::Deserialize;
use serde_json::json;

use crate::app::AppState;
use crate::error::ApiError;

fn decode_failure(e: PayloadError) -> ApiError {
    ApiError::internal(format!("malformed response from root: {e}"))
}

fn ok_json(value: serde_json::Value) -> Response {
    (StatusCode::OK, Json(value)).into_response()
}

/// `GET /api/nodes`
pub async fn nodes(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    let raw = state.perform_rpc(ApiOp::Nodes, Vec::new(), false).await?;
    let resp = NodesResponse::decode(&raw).map_err(decode_failure)?;
    Ok(ok_json(json!({ "nodes": resp.count })))
}

/// `GET /api/color`
pub async fn get_color(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    let raw = state.perform_rpc(ApiOp::GetColor, Vec::new(), false).await?;
    let resp = ColorResponse::decode(&raw).map_err(decode_failure)?;
    Ok(ok_json(json!({ "r": resp.r, "g": resp.g, "b": resp.b, "is_set": resp.is_set })))
}

#[derive(Debug, Deserialize)]
pub struct ColorBody {
    r: u8,
    g: u8,
    b: u8,
}

/// `POST /api/color`
pub async fn set_color(State(state): State<Arc<AppState>>, Json(body): Json<ColorBody>) -> Result<Response, ApiError> {
    let payload = SetColorRequest { r: body.r, g: body.g, b: body.b }.encode();
    let raw = state.perform_rpc(ApiOp::SetColor, payload.to_vec(), true).await?;
    let resp = SuccessResponse::decode(&raw).map_err(decode_failure)?;
    Ok(ok_json(json!({ "success": resp.success })))
}

/// `POST /api/sequence`
pub async fn sequence_upload(State(state): State<Arc<AppState>>, body: axum::body::Bytes) -> Result<Response, ApiError> {
    let payload = SequenceUploadRequest { blob: body.to_vec() }.encode().to_vec();
    let raw = state.perform_rpc(ApiOp::SequenceUpload, payload, true).await?;
    let resp = SuccessResponse::decode(&raw).map_err(decode_failure)?;
    Ok(ok_json(json!({ "success": resp.success })))
}

/// `GET /api/sequence/pointer` — plain text, not JSON; a legacy client
/// depends on the bare numeric body.
pub async fn sequence_pointer(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    let raw = state.perform_rpc(ApiOp::SequencePointer, Vec::new(), false).await?;
    let resp = SequencePointerResponse::decode(&raw).map_err(decode_failure)?;
    Ok((StatusCode::OK, [(header::CONTENT_TYPE, "text/plain")], resp.pointer.to_string()).into_response())
}

async fn sequence_transport(state: Arc<AppState>, op: ApiOp) -> Result<Response, ApiError> {
    let raw = state.perform_rpc(op, Vec::new(), true).await?;
    let resp = SuccessResponse::decode(&raw).map_err(decode_failure)?;
    Ok(ok_json(json!({ "success": resp.success })))
}

/// `POST /api/sequence/start`
pub async fn sequence_start(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    sequence_transport(state, ApiOp::SequenceStart).await
}

/// `POST /api/sequence/stop`
pub async fn sequence_stop(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    sequence_transport(state, ApiOp::SequenceStop).await
}

/// `POST /api/sequence/reset`
pub async fn sequence_reset(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    sequence_transport(state, ApiOp::SequenceReset).await
}

/// `GET /api/sequence/status`
pub async fn sequence_status(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    let raw = state.perform_rpc(ApiOp::SequenceStatus, Vec::new(), false).await?;
    let resp = SequenceStatusResponse::decode(&raw).map_err(decode_failure)?;
    Ok(ok_json(json!({ "active": resp.active })))
}

#[derive(Debug, Deserialize)]
pub struct OtaDownloadBody {
    url: String,
}

/// `POST /api/ota/download`
pub async fn ota_download(
    State(state): State<Arc<AppState>>,
    Json(body): Json<OtaDownloadBody>,
) -> Result<Response, ApiError> {
    if body.url.len() > 255 {
        return Err(ApiError::bad_request("url must be at most 255 characters"));
    }
    let payload = OtaDownloadRequest { url: body.url }.encode();
    let raw = state.perform_rpc(ApiOp::OtaDownload, payload, true).await?;
    let resp = SuccessResponse::decode(&raw).map_err(decode_failure)?;
    Ok(ok_json(json!({ "success": resp.success })))
}

/// `GET /api/ota/status`
pub async fn ota_status(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    let raw = state.perform_rpc(ApiOp::OtaStatus, Vec::new(), false).await?;
    let resp = OtaStatusResponse::decode(&raw).map_err(decode_failure)?;
    Ok(ok_json(json!({ "downloading": resp.downloading, "progress": resp.progress })))
}

/// `GET /api/ota/version`
pub async fn ota_version(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    let raw = state.perform_rpc(ApiOp::OtaVersion, Vec::new(), false).await?;
    let resp = OtaVersionResponse::decode(&raw).map_err(decode_failure)?;
    Ok(ok_json(json!({ "version": resp.version })))
}

/// `POST /api/ota/cancel`
pub async fn ota_cancel(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    sequence_transport(state, ApiOp::OtaCancel).await
}

/// `POST /api/ota/distribute`
pub async fn ota_distribute(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    sequence_transport(state, ApiOp::OtaDistribute).await
}

/// `GET /api/ota/distribution/status` — same single-byte wire shape as
/// `/api/sequence/status`, rendered under the `distributing` JSON key.
pub async fn ota_distribution_status(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    let raw = state.perform_rpc(ApiOp::OtaDistributionStatus, Vec::new(), false).await?;
    let resp = SequenceStatusResponse::decode(&raw).map_err(decode_failure)?;
    Ok(ok_json(json!({ "distributing": resp.active })))
}

/// `GET /api/ota/distribution/progress`
pub async fn ota_distribution_progress(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    let raw = state.perform_rpc(ApiOp::OtaDistributionProgress, Vec::new(), false).await?;
    let resp = ProgressResponse::decode(&raw).map_err(decode_failure)?;
    Ok(ok_json(json!({ "progress": resp.progress })))
}

/// `POST /api/ota/distribution/cancel`
pub async fn ota_distribution_cancel(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    sequence_transport(state, ApiOp::OtaDistributionCancel).await
}

#[derive(Debug, Default, Deserialize)]
pub struct OtaRebootBody {
    timeout: Option<u16>,
    delay: Option<u16>,
}

/// `POST /api/ota/reboot`
pub async fn ota_reboot(
    State(state): State<Arc<AppState>>,
    raw_body: axum::body::Bytes,
) -> Result<Response, ApiError> {
    let body: OtaRebootBody = if raw_body.is_empty() {
        OtaRebootBody::default()
    } else {
        serde_json::from_slice(&raw_body).map_err(|e| ApiError::bad_request(format!("invalid body: {e}")))?
    };
    let payload = OtaRebootRequest {
        timeout: body.timeout.unwrap_or(0),
        delay: body.delay.unwrap_or(0),
    }
    .encode();
    let raw = state.perform_rpc(ApiOp::OtaReboot, payload.to_vec(), true).await?;
    let resp = SuccessResponse::decode(&raw).map_err(decode_failure)?;
    Ok(ok_json(json!({ "success": resp.success })))
}

/// `GET /api/mesh/state` — the coordinator's locally-cached snapshot, not an
/// RPC round-trip, so it answers even while the root is mid-timeout.
pub async fn mesh_state(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    let session = state.current_session().await.ok_or_else(ApiError::no_session)?;
    let store = state.state_store.read().await;
    let snapshot = store.get(&session.mesh_id).ok_or_else(ApiError::no_session)?;
    let stale = snapshot.is_stale(state.config.staleness());
    let nodes: Vec<_> = snapshot
        .nodes
        .iter()
        .map(|n| {
            json!({
                "node_id": format!("{:02x?}", n.node_id),
                "address": n.address,
                "layer": n.layer,
                "parent_id": format!("{:02x?}", n.parent_id),
                "role": format!("{:?}", n.role),
                "status": format!("{:?}", n.status),
            })
        })
        .collect();
    Ok(ok_json(json!({
        "root_ip": snapshot.root_ip,
        "timestamp": snapshot.timestamp,
        "connected": snapshot.connected,
        "nodes": nodes,
        "sequence_active": snapshot.sequence_active,
        "sequence_position": snapshot.sequence_position,
        "sequence_total": snapshot.sequence_total,
        "ota_active": snapshot.ota_active,
        "ota_percent": snapshot.ota_percent,
        "stale": stale,
    })))
}

/// `GET /health` — the one endpoint with no root counterpart: a local
/// self-report of the coordinator's own uptime and listening port.
pub async fn health(State(state): State<Arc<AppState>>) -> Response {
    let uptime = state.started_at.elapsed().as_secs();
    let timestamp = SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0);
    ok_json(json!({
        "status": "ok",
        "server": {
            "port": state.config.http_port,
            "uptime": uptime,
            "timestamp": timestamp,
        }
    }))
}
