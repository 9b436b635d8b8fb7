// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Shared HTTP application state and the RPC call path that every handler
//! in [`crate::handlers`] funnels through.

use std::sync::Arc;
use std::time::{Duration, Instant};

use lyktparad_proto::command::ApiOp;
use tokio::sync::RwLock;
use tracing::warn;

use crate::config::CoordinatorConfig;
use crate::datagram::DatagramService;
use crate::error::ApiError;
use crate::pending::PendingRpcMap;
use crate::session::{Session, SessionRegistry};
use crate::state::StateStore;

/// State shared across every HTTP handler, grounded in `hdds-gateway`'s
/// `AppState` (there, a lazily-reconnected admin client; here, the session
/// registry, state store, and pending-RPC map the datagram service also
/// touches).
pub struct AppState {
    pub registry: Arc<RwLock<SessionRegistry>>,
    pub state_store: Arc<RwLock<StateStore>>,
    pub pending: Arc<PendingRpcMap>,
    pub datagram: Arc<DatagramService>,
    pub config: Arc<CoordinatorConfig>,
    pub started_at: Instant,
}

impl AppState {
    /// The HTTP endpoint table carries no mesh selector, so a coordinator
    /// with more than one registered root serves whichever was active most
    /// recently. In the expected single-root deployment this is simply "the"
    /// session.
    pub async fn current_session(&self) -> Option<Session> {
        self.registry
            .read()
            .await
            .sessions()
            .max_by_key(|s| s.last_activity())
            .cloned()
    }

    /// Issue one RPC call and wait for its response, retrying per the
    /// request's idempotence: GETs (`retryable = false`) are attempted once;
    /// mutating POSTs are retried up to 2 more times with exponential
    /// backoff.
    pub async fn perform_rpc(&self, op: ApiOp, payload: Vec<u8>, retryable: bool) -> Result<Vec<u8>, ApiError> {
        let session = self.current_session().await.ok_or_else(ApiError::no_session)?;
        let dest = self.config.root_rpc_addr(session.root_addr);
        if session.offline {
            return Err(ApiError::offline(dest));
        }

        let max_attempts = if retryable { 3 } else { 1 };
        let mut backoff = Duration::from_millis(500);

        for attempt in 0..max_attempts {
            let seq = self.pending.alloc_seq();
            let rx = self.pending.register(seq).await;

            if let Err(e) = self.datagram.send_rpc(op, seq, &payload, dest).await {
                warn!("rpc send to {dest} failed: {e}");
                self.pending.cancel(seq).await;
                self.registry.write().await.record_failure(&session.mesh_id);
            } else {
                match tokio::time::timeout(self.config.rpc_deadline(), rx).await {
                    Ok(Ok(response)) => return Ok(response),
                    Ok(Err(_)) => {
                        // Responder dropped without sending: treat as a miss and retry/timeout below.
                    }
                    Err(_) => {
                        self.pending.cancel(seq).await;
                        self.registry.write().await.record_failure(&session.mesh_id);
                    }
                }
            }

            if attempt + 1 < max_attempts {
                tokio::time::sleep(backoff).await;
                backoff *= 2;
            }
        }

        Err(ApiError::timeout(dest))
    }
}
