// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Role/event glue: the one place that reacts to [`MeshRole`] transitions by
//! starting and stopping the subsystems that only make sense while this node
//! holds the root role — the heartbeat beacon, the state snapshot task, and
//! the RPC listener. Grounded in `role.rs`'s own design note ("so that
//! heartbeat, state, the API listener, and the mirror wrapper can start and
//! stop together").
//!
//! The mirror wrapper is not managed here: it has no lifecycle of its own,
//! since it checks the current role on every send rather than being
//! started or stopped.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use lyktparad_mesh::{MeshCommandId, MeshLayer, MeshRole, PluginRuntime, MESH_BROADCAST};
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::api::ApiListener;
use crate::config::RootConfig;
use crate::mirror::MirroringMeshSend;
use crate::outbound::OutboundLink;
use crate::tasks::{run_heartbeat, run_state};

struct RunningEpoch {
    stop: Arc<Notify>,
    handles: Vec<JoinHandle<()>>,
}

/// Starts/stops the root-only subsystems in step with [`MeshRole`]
/// transitions observed on `role`.
pub struct Bridge {
    config: Arc<RootConfig>,
    link: Arc<OutboundLink>,
    mesh: Arc<dyn MeshLayer>,
    plugin: Arc<dyn PluginRuntime>,
    role: watch::Receiver<MeshRole>,
    mirror: MirroringMeshSend,
}

impl Bridge {
    /// Build a bridge over the given collaborators, observing `role`.
    /// `registered` is shared with the discovery engine: every send this
    /// bridge makes onto the mesh is mirrored to the coordinator iff it's
    /// set, this node is root, and the payload is non-empty.
    pub fn new(
        config: Arc<RootConfig>,
        link: Arc<OutboundLink>,
        mesh: Arc<dyn MeshLayer>,
        plugin: Arc<dyn PluginRuntime>,
        role: watch::Receiver<MeshRole>,
        registered: Arc<AtomicBool>,
    ) -> Self {
        let mirror = MirroringMeshSend::new(mesh.clone(), link.clone(), role.clone(), registered);
        Self { config, link, mesh, plugin, role, mirror }
    }

    /// Run until `shutdown` fires, starting/stopping the root-only
    /// subsystems each time the observed role changes, and tearing them
    /// down cleanly on exit.
    pub async fn run(mut self, shutdown: Arc<Notify>) {
        let mut epoch = self.sync_to(*self.role.borrow()).await;

        loop {
            tokio::select! {
                changed = self.role.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let role = *self.role.borrow_and_update();
                    epoch = self.transition(epoch, role).await;
                }
                _ = shutdown.notified() => {
                    break;
                }
            }
        }

        if let Some(epoch) = epoch {
            stop_epoch(epoch).await;
        }
    }

    async fn transition(&self, current: Option<RunningEpoch>, role: MeshRole) -> Option<RunningEpoch> {
        if let Some(epoch) = current {
            stop_epoch(epoch).await;
        }
        self.sync_to(role).await
    }

    async fn sync_to(&self, role: MeshRole) -> Option<RunningEpoch> {
        match role {
            MeshRole::Root => Some(self.start_epoch().await),
            MeshRole::Child => {
                info!("mesh role is child, root-only subsystems stay dormant");
                None
            }
        }
    }

    async fn start_epoch(&self) -> RunningEpoch {
        info!("mesh role is root, starting bridge subsystems");
        self.push_active_playback_state();
        let stop = Arc::new(Notify::new());
        let mut handles = Vec::with_capacity(3);

        handles.push(tokio::spawn(run_heartbeat(
            self.config.clone(),
            self.link.clone(),
            self.mesh.clone(),
            stop.clone(),
        )));
        handles.push(tokio::spawn(run_state(
            self.config.clone(),
            self.link.clone(),
            self.mesh.clone(),
            self.plugin.clone(),
            stop.clone(),
        )));

        match ApiListener::bind(
            self.config.bind_address,
            self.config.rpc_port,
            self.mesh.clone(),
            self.plugin.clone(),
            self.config.checksum_policy(),
        )
        .await
        {
            Ok(listener) => {
                let listener_stop = stop.clone();
                handles.push(tokio::spawn(async move { listener.run(listener_stop).await }));
            }
            Err(e) => warn!("failed to bind rpc listener: {e}"),
        }

        RunningEpoch { stop, handles }
    }

    /// A fresh root joining an established mesh re-asserts whatever
    /// plugin/playback command is already active, so the mesh's
    /// user-visible state survives root churn instead of going quiet until
    /// the next API call. Best-effort: a failed push is logged, never
    /// retried, since the next state tick will still report the true
    /// playback state either way.
    fn push_active_playback_state(&self) {
        if self.plugin.sequence_active() {
            if let Err(e) = self.mirror.send(MESH_BROADCAST, MeshCommandId::SequenceStart, &[]) {
                warn!("failed to re-assert active sequence playback to new root: {e}");
            }
        }
    }
}

async fn stop_epoch(epoch: RunningEpoch) {
    epoch.stop.notify_waiters();
    for handle in epoch.handles {
        if let Err(e) = handle.await {
            warn!("bridge subsystem task panicked: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lyktparad_mesh::dispatch::InMemoryPluginRuntime;
    use lyktparad_mesh::{LoopbackMesh, RoleObserver};
    use lyktparad_proto::frame::ChecksumPolicy;
    use std::sync::atomic::AtomicBool;
    use tokio::net::UdpSocket;
    use tokio::time::{timeout, Duration};

    async fn bridge_with(initial: MeshRole) -> (RoleObserver, Arc<Notify>, UdpSocket, JoinHandle<()>) {
        let config = Arc::new(RootConfig {
            rpc_port: 0,
            heartbeat_interval_secs: 1,
            ..RootConfig::default()
        });
        let link = Arc::new(OutboundLink::bind(config.bind_address, ChecksumPolicy::Strict).await.unwrap());
        let coordinator = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        link.set_dest(coordinator.local_addr().unwrap());
        let mesh: Arc<dyn MeshLayer> = Arc::new(LoopbackMesh::new([1; 6], [10, 0, 0, 1], 1));
        let plugin: Arc<dyn PluginRuntime> = Arc::new(InMemoryPluginRuntime::new("1.0.0"));
        let (observer, rx) = RoleObserver::new(initial);
        let registered = Arc::new(AtomicBool::new(true));

        let bridge = Bridge::new(config, link, mesh, plugin, rx, registered);
        let shutdown = Arc::new(Notify::new());
        let handle = tokio::spawn(bridge.run(shutdown.clone()));
        (observer, shutdown, coordinator, handle)
    }

    #[tokio::test]
    async fn gaining_root_with_active_sequence_reasserts_it_to_the_mesh() {
        let config = Arc::new(RootConfig {
            rpc_port: 0,
            heartbeat_interval_secs: 1,
            ..RootConfig::default()
        });
        let link = Arc::new(OutboundLink::bind(config.bind_address, ChecksumPolicy::Strict).await.unwrap());
        let coordinator = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        link.set_dest(coordinator.local_addr().unwrap());
        let mesh = Arc::new(LoopbackMesh::new([1; 6], [10, 0, 0, 1], 1));
        let plugin = Arc::new(InMemoryPluginRuntime::new("1.0.0"));
        plugin.sequence_upload(&[1, 2, 3]);
        plugin.sequence_start();
        let (_observer, rx) = RoleObserver::new(MeshRole::Root);
        let registered = Arc::new(AtomicBool::new(true));

        let mesh_dyn: Arc<dyn MeshLayer> = mesh.clone();
        let plugin_dyn: Arc<dyn PluginRuntime> = plugin.clone();
        let bridge = Bridge::new(config, link, mesh_dyn, plugin_dyn, rx, registered);
        let shutdown = Arc::new(Notify::new());
        let handle = tokio::spawn(bridge.run(shutdown.clone()));

        // Give start_epoch a moment to run before asserting.
        tokio::time::sleep(Duration::from_millis(50)).await;
        let sent = mesh.sent();
        assert!(sent.iter().any(|(dest, cmd, _)| *dest == lyktparad_mesh::MESH_BROADCAST && *cmd == MeshCommandId::SequenceStart));

        shutdown.notify_waiters();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn becoming_root_starts_the_heartbeat_task() {
        let (_observer, shutdown, coordinator, handle) = bridge_with(MeshRole::Root).await;
        let mut buf = [0u8; 64];
        assert!(timeout(Duration::from_secs(2), coordinator.recv_from(&mut buf)).await.is_ok());
        shutdown.notify_waiters();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn staying_child_never_sends_a_heartbeat() {
        let (_observer, shutdown, coordinator, handle) = bridge_with(MeshRole::Child).await;
        let mut buf = [0u8; 64];
        assert!(timeout(Duration::from_millis(300), coordinator.recv_from(&mut buf)).await.is_err());
        shutdown.notify_waiters();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn losing_root_stops_the_heartbeat_task() {
        let (observer, shutdown, coordinator, handle) = bridge_with(MeshRole::Root).await;
        let mut buf = [0u8; 64];
        timeout(Duration::from_secs(2), coordinator.recv_from(&mut buf)).await.unwrap().unwrap();

        observer.set(MeshRole::Child);
        // Drain anything already in flight, then confirm silence.
        tokio::time::sleep(Duration::from_millis(200)).await;
        let mut drain = [0u8; 64];
        while timeout(Duration::from_millis(50), coordinator.recv_from(&mut drain)).await.is_ok() {}
        assert!(timeout(Duration::from_millis(500), coordinator.recv_from(&mut buf)).await.is_err());

        shutdown.notify_waiters();
        handle.await.unwrap();
    }
}
