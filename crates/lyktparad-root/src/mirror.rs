// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The single choke point every mesh send passes through, grounded in
//! `hdds-micro`'s `Bridge::process_lora_message`: one method wraps every
//! outbound path so a cross-cutting concern (there, stats and rate limiting;
//! here, coordinator observability) can't be bypassed by a call site that
//! reaches the mesh directly.
//!
//! A send is mirrored to the coordinator (`CMD 0xE6`) iff this node
//! currently holds the root role, the coordinator registration has been
//! accepted, and the payload is non-empty. The mirror send never blocks the
//! caller: it's dispatched onto its own task, and its result is discarded —
//! only logged on failure.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use lyktparad_mesh::{MeshCommandId, MeshError, MeshLayer, MeshRole};
use lyktparad_proto::payload::MirrorPayload;
use tokio::sync::watch;
use tracing::debug;

use crate::outbound::OutboundLink;

fn now_secs() -> u32 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs() as u32).unwrap_or(0)
}

/// Wraps a [`MeshLayer`] so every send is evaluated against the mirror
/// invariant before returning the underlying result to the caller unchanged.
pub struct MirroringMeshSend {
    mesh: Arc<dyn MeshLayer>,
    link: Arc<OutboundLink>,
    role: watch::Receiver<MeshRole>,
    registered: Arc<AtomicBool>,
}

impl MirroringMeshSend {
    /// Wrap `mesh`, mirroring through `link` whenever `role`/`registered`
    /// say this node is an active, registered root.
    pub fn new(mesh: Arc<dyn MeshLayer>, link: Arc<OutboundLink>, role: watch::Receiver<MeshRole>, registered: Arc<AtomicBool>) -> Self {
        Self { mesh, link, role, registered }
    }

    /// Send `payload` as `command` to `dest`, mirroring it to the
    /// coordinator first if the invariant is satisfied. Returns whatever the
    /// underlying mesh send returns, regardless of whether a mirror was
    /// sent.
    pub fn send(&self, dest: lyktparad_mesh::MeshId, command: MeshCommandId, payload: &[u8]) -> Result<(), MeshError> {
        let result = self.mesh.send(dest, command, payload);

        let is_root = *self.role.borrow() == MeshRole::Root;
        if is_root && self.registered.load(Ordering::Relaxed) && !payload.is_empty() {
            let link = self.link.clone();
            let mirror = MirrorPayload {
                mesh_cmd: command.to_byte(),
                mesh_payload: payload.to_vec(),
                timestamp: now_secs(),
            };
            tokio::spawn(async move {
                if let Err(e) = link.send_mirror(&mirror).await {
                    debug!("mirror send failed: {e}");
                }
            });
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lyktparad_mesh::RoleObserver;
    use lyktparad_proto::command::CommandId;
    use lyktparad_proto::frame::{decode_frame, ChecksumPolicy};
    use lyktparad_mesh::LoopbackMesh;
    use tokio::net::UdpSocket;
    use tokio::time::{timeout, Duration};

    async fn wrapper_with(role: MeshRole, registered: bool) -> (MirroringMeshSend, Arc<LoopbackMesh>, UdpSocket) {
        let mesh = Arc::new(LoopbackMesh::new([1; 6], [10, 0, 0, 1], 1));
        let link = Arc::new(OutboundLink::bind("127.0.0.1".parse().unwrap(), ChecksumPolicy::Strict).await.unwrap());
        let coordinator = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        link.set_dest(coordinator.local_addr().unwrap());
        let (_observer, rx) = RoleObserver::new(role);
        let wrapper = MirroringMeshSend::new(mesh.clone(), link, rx, Arc::new(AtomicBool::new(registered)));
        (wrapper, mesh, coordinator)
    }

    #[tokio::test]
    async fn mirrors_when_root_registered_and_payload_nonempty() {
        let (wrapper, mesh, coordinator) = wrapper_with(MeshRole::Root, true).await;
        wrapper.send([9; 6], MeshCommandId::LightSet, &[255, 0, 0]).unwrap();
        assert_eq!(mesh.sent().len(), 1);

        let mut buf = [0u8; 64];
        let (len, _) = timeout(Duration::from_secs(1), coordinator.recv_from(&mut buf)).await.unwrap().unwrap();
        let frame = decode_frame(&buf[..len], ChecksumPolicy::Strict).unwrap();
        assert_eq!(frame.command, CommandId::MeshMirror);
    }

    #[tokio::test]
    async fn does_not_mirror_when_not_root() {
        let (wrapper, _mesh, coordinator) = wrapper_with(MeshRole::Child, true).await;
        wrapper.send([9; 6], MeshCommandId::LightSet, &[1]).unwrap();
        let mut buf = [0u8; 64];
        assert!(timeout(Duration::from_millis(100), coordinator.recv_from(&mut buf)).await.is_err());
    }

    #[tokio::test]
    async fn does_not_mirror_when_not_registered() {
        let (wrapper, _mesh, coordinator) = wrapper_with(MeshRole::Root, false).await;
        wrapper.send([9; 6], MeshCommandId::LightSet, &[1]).unwrap();
        let mut buf = [0u8; 64];
        assert!(timeout(Duration::from_millis(100), coordinator.recv_from(&mut buf)).await.is_err());
    }

    #[tokio::test]
    async fn does_not_mirror_an_empty_payload() {
        let (wrapper, _mesh, coordinator) = wrapper_with(MeshRole::Root, true).await;
        wrapper.send([9; 6], MeshCommandId::Heartbeat, &[]).unwrap();
        let mut buf = [0u8; 64];
        assert!(timeout(Duration::from_millis(100), coordinator.recv_from(&mut buf)).await.is_err());
    }

    #[tokio::test]
    async fn underlying_send_result_passes_through() {
        let (wrapper, _mesh, _coordinator) = wrapper_with(MeshRole::Root, true).await;
        let result = wrapper.send([9; 6], MeshCommandId::LightSet, &[1, 2, 3]);
        assert!(result.is_ok());
    }
}
