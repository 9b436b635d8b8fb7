// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Liveness monitor: the periodic sweep that marks idle or failing sessions
//! offline and eventually removes them.
//!
//! Grounded in `hdds-discovery-server::server::DiscoveryServer`'s lease
//! checker task (`tokio::select!` over a sleep and a shutdown `Notify`),
//! generalized from one lease-duration check to two independent triggers:
//! idle timeout and consecutive-failure threshold.

use std::sync::Arc;

use tokio::sync::{Notify, RwLock};
use tracing::{info, warn};

use crate::config::CoordinatorConfig;
use crate::session::SessionRegistry;
use crate::state::StateStore;

/// Run the liveness sweep loop until `shutdown` is notified.
///
/// Each tick: sessions idle past `heartbeat_timeout` or at/above
/// `failure_threshold` are marked offline (first detection logged as a
/// warning); sessions offline for `cleanup_timeout` are removed outright,
/// along with their state snapshot.
pub async fn run(
    config: Arc<CoordinatorConfig>,
    registry: Arc<RwLock<SessionRegistry>>,
    state_store: Arc<RwLock<StateStore>>,
    shutdown: Arc<Notify>,
) {
    let mut interval = tokio::time::interval(config.liveness_sweep_interval());
    loop {
        tokio::select! {
            _ = interval.tick() => {
                sweep_once(&config, &registry, &state_store).await;
            }
            _ = shutdown.notified() => {
                tracing::debug!("liveness monitor shutting down");
                break;
            }
        }
    }
}

async fn sweep_once(
    config: &CoordinatorConfig,
    registry: &Arc<RwLock<SessionRegistry>>,
    state_store: &Arc<RwLock<StateStore>>,
) {
    let heartbeat_timeout = config.heartbeat_timeout();
    let failure_threshold = config.failure_threshold;

    let newly_offline: Vec<_> = {
        let reg = registry.read().await;
        reg.sessions()
            .filter(|s| !s.offline && (s.is_timed_out(heartbeat_timeout) || s.failure_count >= failure_threshold))
            .map(|s| s.mesh_id)
            .collect()
    };
    if !newly_offline.is_empty() {
        let mut reg = registry.write().await;
        for mesh_id in &newly_offline {
            reg.mark_offline(mesh_id);
            warn!("session {:02x?} marked offline", mesh_id);
        }
    }

    let expired = registry.write().await.remove_expired(config.cleanup_timeout());
    if !expired.is_empty() {
        let mut store = state_store.write().await;
        for mesh_id in &expired {
            store.remove(mesh_id);
            info!("removed session {:02x?} after {:?} offline", mesh_id, config.cleanup_timeout());
        }
    }
}

/// Administrative force-cleanup: remove every offline session immediately,
/// regardless of how long ago it went offline.
pub async fn force_cleanup(registry: &Arc<RwLock<SessionRegistry>>, state_store: &Arc<RwLock<StateStore>>) -> usize {
    let removed = registry.write().await.force_cleanup();
    if !removed.is_empty() {
        let mut store = state_store.write().await;
        for mesh_id in &removed {
            store.remove(mesh_id);
        }
    }
    removed.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;
    use std::time::Duration;

    fn addr() -> SocketAddr {
        "192.168.1.10:9000".parse().unwrap()
    }

    #[tokio::test]
    async fn sweep_marks_idle_session_offline() {
        let config = Arc::new(CoordinatorConfig {
            heartbeat_timeout_secs: 0,
            ..CoordinatorConfig::default()
        });
        let registry = Arc::new(RwLock::new(SessionRegistry::new()));
        let state_store = Arc::new(RwLock::new(StateStore::new()));
        registry.write().await.register([1; 6], addr(), 1, "1.0".into());

        sweep_once(&config, &registry, &state_store).await;

        assert!(registry.read().await.get(&[1; 6]).unwrap().offline);
    }

    #[tokio::test]
    async fn sweep_cleans_up_long_offline_session() {
        let config = Arc::new(CoordinatorConfig {
            heartbeat_timeout_secs: 0,
            ..CoordinatorConfig::default()
        });
        let registry = Arc::new(RwLock::new(SessionRegistry::new()));
        let state_store = Arc::new(RwLock::new(StateStore::new()));
        registry.write().await.register([1; 6], addr(), 1, "1.0".into());

        sweep_once(&config, &registry, &state_store).await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        sweep_once(&config, &registry, &state_store).await;

        assert_eq!(registry.read().await.session_count(), 0);
    }

    #[tokio::test]
    async fn force_cleanup_removes_only_offline() {
        let registry = Arc::new(RwLock::new(SessionRegistry::new()));
        let state_store = Arc::new(RwLock::new(StateStore::new()));
        registry.write().await.register([1; 6], addr(), 1, "1.0".into());
        registry.write().await.register([2; 6], addr(), 1, "1.0".into());
        registry.write().await.mark_offline(&[1; 6]);

        let removed = force_cleanup(&registry, &state_store).await;
        assert_eq!(removed, 1);
        assert_eq!(registry.read().await.session_count(), 1);
    }
}
