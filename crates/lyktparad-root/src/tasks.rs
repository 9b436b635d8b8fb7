// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The two periodic bridge tasks that only run while this node holds the
//! root role and has a confirmed coordinator destination: the heartbeat
//! beacon and the mesh state snapshot.
//!
//! Both self-terminate on `shutdown`; the role/event glue in
//! [`crate::bridge`] is what aborts them early on a role loss, since neither
//! task watches the role itself.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use lyktparad_mesh::{MeshLayer, PluginRuntime, RoutingRole};
use lyktparad_proto::payload::{HeartbeatPayload, NodeEntry, NodeRole, NodeStatus, StatePayload};
use tokio::sync::Notify;
use tracing::{debug, warn};

use crate::config::RootConfig;
use crate::outbound::OutboundLink;

fn now_secs() -> u32 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs() as u32).unwrap_or(0)
}

/// Run the bridge heartbeat beacon on `config.heartbeat_interval()` until
/// `shutdown` fires. Distinct from any mesh-internal liveness beacon; this
/// is purely the root-to-coordinator signal.
pub async fn run_heartbeat(config: Arc<RootConfig>, link: Arc<OutboundLink>, mesh: Arc<dyn MeshLayer>, shutdown: Arc<Notify>) {
    let mut interval = tokio::time::interval(config.heartbeat_interval());
    loop {
        tokio::select! {
            _ = interval.tick() => {
                let heartbeat = HeartbeatPayload {
                    timestamp: now_secs(),
                    node_count: Some(mesh.node_count()),
                };
                if let Err(e) = link.send_heartbeat(&heartbeat).await {
                    warn!("heartbeat send failed: {e}");
                }
            }
            _ = shutdown.notified() => {
                debug!("heartbeat task shutting down");
                break;
            }
        }
    }
}

/// Run the mesh state snapshot collector on `config.state_interval()` until
/// `shutdown` fires.
pub async fn run_state(
    config: Arc<RootConfig>,
    link: Arc<OutboundLink>,
    mesh: Arc<dyn MeshLayer>,
    plugin: Arc<dyn PluginRuntime>,
    shutdown: Arc<Notify>,
) {
    let mut interval = tokio::time::interval(config.state_interval());
    loop {
        tokio::select! {
            _ = interval.tick() => {
                let state = collect_state(&mesh, &plugin);
                if let Err(e) = link.send_state(&state).await {
                    warn!("state send failed: {e}");
                }
            }
            _ = shutdown.notified() => {
                debug!("state task shutting down");
                break;
            }
        }
    }
}

fn collect_state(mesh: &Arc<dyn MeshLayer>, plugin: &Arc<dyn PluginRuntime>) -> StatePayload {
    let nodes = mesh
        .routing_table()
        .into_iter()
        .map(|entry| NodeEntry {
            node_id: entry.node_id,
            address: entry.address,
            layer: entry.layer,
            parent_id: entry.parent_id,
            role: match entry.role {
                RoutingRole::Root => NodeRole::Root,
                RoutingRole::Child => NodeRole::Child,
                RoutingRole::Leaf => NodeRole::Leaf,
            },
            status: if entry.connected { NodeStatus::Connected } else { NodeStatus::Disconnected },
        })
        .collect();

    let ota = plugin.ota_status();
    StatePayload {
        root_ip: mesh.local_address(),
        mesh_id: mesh.local_id(),
        timestamp: now_secs(),
        connected: mesh.connected(),
        nodes,
        sequence_active: plugin.sequence_active(),
        sequence_position: plugin.sequence_pointer(),
        // The plugin runtime interface reports playback position but not the
        // uploaded sequence's total length; there is no case in this
        // collaborator set where that total is known independently of the
        // lighting runtime itself, so it is always reported as 0.
        sequence_total: 0,
        ota_active: ota.active,
        ota_percent: (ota.fraction.clamp(0.0, 1.0) * 100.0) as u8,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lyktparad_mesh::dispatch::InMemoryPluginRuntime;
    use lyktparad_mesh::LoopbackMesh;
    use lyktparad_proto::frame::ChecksumPolicy;
    use tokio::net::UdpSocket;

    #[tokio::test]
    async fn heartbeat_tick_reaches_destination() {
        let config = Arc::new(RootConfig {
            heartbeat_interval_secs: 1,
            ..RootConfig::default()
        });
        let link = Arc::new(OutboundLink::bind(config.bind_address, ChecksumPolicy::Strict).await.unwrap());
        let coordinator = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        link.set_dest(coordinator.local_addr().unwrap());
        let mesh: Arc<dyn MeshLayer> = Arc::new(LoopbackMesh::new([1; 6], [10, 0, 0, 1], 2));
        let shutdown = Arc::new(Notify::new());

        let task = tokio::spawn(run_heartbeat(config, link, mesh, shutdown.clone()));
        let mut buf = [0u8; 64];
        let (len, _) = tokio::time::timeout(std::time::Duration::from_secs(3), coordinator.recv_from(&mut buf))
            .await
            .unwrap()
            .unwrap();
        let frame = lyktparad_proto::frame::decode_frame(&buf[..len], ChecksumPolicy::Strict).unwrap();
        assert_eq!(frame.command, lyktparad_proto::command::CommandId::Heartbeat);

        shutdown.notify_waiters();
        task.await.unwrap();
    }

    #[test]
    fn collect_state_reports_plugin_and_mesh_facts() {
        let mesh: Arc<dyn MeshLayer> = Arc::new(LoopbackMesh::new([1; 6], [10, 0, 0, 1], 1));
        let plugin: Arc<dyn PluginRuntime> = Arc::new(InMemoryPluginRuntime::new("1.0.0"));
        plugin.sequence_upload(&[1, 2, 3]);
        plugin.sequence_start();

        let state = collect_state(&mesh, &plugin);
        assert_eq!(state.root_ip, [10, 0, 0, 1]);
        assert!(state.sequence_active);
        assert!(state.connected);
        assert!(state.nodes.is_empty());
    }
}
