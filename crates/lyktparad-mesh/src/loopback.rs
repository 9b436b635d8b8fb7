// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! A trivial in-memory [`MeshLayer`], for exercising the bridge without real
//! radio hardware or routing.

use std::sync::{Mutex, RwLock};

use crate::command::MeshCommandId;
use crate::layer::{MeshError, MeshLayer, MeshMessage};
use crate::routing::RoutingEntry;
use crate::MeshId;

/// Records every send and lets a test inject inbound messages directly into
/// the registered receiver.
pub struct LoopbackMesh {
    local_id: MeshId,
    local_address: [u8; 4],
    node_count: u8,
    connected: RwLock<bool>,
    routing_table: RwLock<Vec<RoutingEntry>>,
    sent: Mutex<Vec<(MeshId, MeshCommandId, Vec<u8>)>>,
    #[allow(clippy::type_complexity)]
    receiver: RwLock<Option<Box<dyn Fn(MeshMessage) + Send + Sync>>>,
}

impl LoopbackMesh {
    /// Create a loopback mesh presenting as `local_id`/`local_address` with
    /// `node_count` nodes. Starts connected with an empty routing table.
    pub fn new(local_id: MeshId, local_address: [u8; 4], node_count: u8) -> Self {
        Self {
            local_id,
            local_address,
            node_count,
            connected: RwLock::new(true),
            routing_table: RwLock::new(Vec::new()),
            sent: Mutex::new(Vec::new()),
            receiver: RwLock::new(None),
        }
    }

    /// Override what [`MeshLayer::connected`] reports, for tests exercising
    /// a split or unformed fabric.
    pub fn set_connected(&self, connected: bool) {
        *self.connected.write().expect("loopback mesh rwlock poisoned") = connected;
    }

    /// Replace the routing table [`MeshLayer::routing_table`] returns.
    pub fn set_routing_table(&self, table: Vec<RoutingEntry>) {
        *self.routing_table.write().expect("loopback mesh rwlock poisoned") = table;
    }

    /// Every command sent so far, in order.
    pub fn sent(&self) -> Vec<(MeshId, MeshCommandId, Vec<u8>)> {
        self.sent.lock().expect("loopback mesh mutex poisoned").clone()
    }

    /// Deliver `message` to the registered receiver, if one is set.
    pub fn inject(&self, message: MeshMessage) {
        if let Some(cb) = self.receiver.read().expect("loopback mesh rwlock poisoned").as_ref() {
            cb(message);
        }
    }
}

impl MeshLayer for LoopbackMesh {
    fn send(&self, dest: MeshId, command: MeshCommandId, payload: &[u8]) -> Result<(), MeshError> {
        self.sent
            .lock()
            .expect("loopback mesh mutex poisoned")
            .push((dest, command, payload.to_vec()));
        Ok(())
    }

    fn local_id(&self) -> MeshId {
        self.local_id
    }

    fn local_address(&self) -> [u8; 4] {
        self.local_address
    }

    fn node_count(&self) -> u8 {
        self.node_count
    }

    fn connected(&self) -> bool {
        *self.connected.read().expect("loopback mesh rwlock poisoned")
    }

    fn routing_table(&self) -> Vec<RoutingEntry> {
        self.routing_table.read().expect("loopback mesh rwlock poisoned").clone()
    }

    fn set_receiver(&self, callback: Box<dyn Fn(MeshMessage) + Send + Sync>) {
        *self.receiver.write().expect("loopback mesh rwlock poisoned") = Some(callback);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn records_sends() {
        let mesh = LoopbackMesh::new([1, 2, 3, 4, 5, 6], [10, 0, 0, 1], 3);
        mesh.send([9, 9, 9, 9, 9, 9], MeshCommandId::LightSet, &[255, 0, 0]).unwrap();
        let sent = mesh.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].1, MeshCommandId::LightSet);
    }

    #[test]
    fn delivers_injected_messages_to_receiver() {
        let mesh = LoopbackMesh::new([1, 2, 3, 4, 5, 6], [10, 0, 0, 1], 1);
        let seen = Arc::new(AtomicUsize::new(0));
        let seen_clone = seen.clone();
        mesh.set_receiver(Box::new(move |_msg| {
            seen_clone.fetch_add(1, Ordering::SeqCst);
        }));
        mesh.inject(MeshMessage {
            source: [9, 9, 9, 9, 9, 9],
            command: MeshCommandId::Heartbeat,
            payload: vec![],
        });
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn connected_and_routing_table_default_and_override() {
        let mesh = LoopbackMesh::new([1; 6], [10, 0, 0, 1], 2);
        assert!(mesh.connected());
        assert!(mesh.routing_table().is_empty());

        mesh.set_connected(false);
        mesh.set_routing_table(vec![crate::routing::RoutingEntry {
            node_id: [2; 6],
            address: [10, 0, 0, 2],
            layer: 1,
            parent_id: [1; 6],
            role: crate::routing::RoutingRole::Leaf,
            connected: true,
        }]);
        assert!(!mesh.connected());
        assert_eq!(mesh.routing_table().len(), 1);
    }

    #[test]
    fn inject_without_receiver_is_a_noop() {
        let mesh = LoopbackMesh::new([0; 6], [0; 4], 0);
        mesh.inject(MeshMessage {
            source: [0; 6],
            command: MeshCommandId::Heartbeat,
            payload: vec![],
        });
    }
}
