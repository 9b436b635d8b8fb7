// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Last-known mesh state, one snapshot per mesh-id, overwritten in place.

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::time::{Duration, Instant};

use lyktparad_proto::payload::{NodeEntry, StatePayload};

use crate::session::MeshId;

/// The coordinator's latest view of one mesh's state.
#[derive(Debug, Clone)]
pub struct StateSnapshot {
    /// Root's reported address.
    pub root_ip: Ipv4Addr,
    /// Wall-clock timestamp carried in the update, seconds.
    pub timestamp: u32,
    /// Whether the mesh reported itself connected end to end.
    pub connected: bool,
    /// Routing table rows as of this update.
    pub nodes: Vec<NodeEntry>,
    /// Whether a lighting sequence is currently playing.
    pub sequence_active: bool,
    /// Current playback position.
    pub sequence_position: u16,
    /// Total length of the current sequence.
    pub sequence_total: u16,
    /// Whether an OTA transfer is in progress.
    pub ota_active: bool,
    /// OTA progress, 0-100.
    pub ota_percent: u8,
    /// When this snapshot was recorded locally, used for staleness checks.
    updated_at: Instant,
}

impl StateSnapshot {
    fn from_payload(payload: &StatePayload) -> Self {
        Self {
            root_ip: Ipv4Addr::from(payload.root_ip),
            timestamp: payload.timestamp,
            connected: payload.connected,
            nodes: payload.nodes.clone(),
            sequence_active: payload.sequence_active,
            sequence_position: payload.sequence_position,
            sequence_total: payload.sequence_total,
            ota_active: payload.ota_active,
            ota_percent: payload.ota_percent,
            updated_at: Instant::now(),
        }
    }

    /// True when this snapshot is older than `staleness_limit`.
    pub fn is_stale(&self, staleness_limit: Duration) -> bool {
        self.updated_at.elapsed() > staleness_limit
    }
}

/// Per-mesh state store. A later update always replaces the prior snapshot
/// wholesale — states are never merged — and an update whose timestamp is
/// older than the one on file is dropped as reordered.
#[derive(Debug, Default)]
pub struct StateStore {
    snapshots: HashMap<MeshId, StateSnapshot>,
}

impl StateStore {
    /// Create a new, empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a state update for `mesh_id`. Returns `false` (and leaves the
    /// store untouched) if `payload.timestamp` is older than the timestamp
    /// already on file, since out-of-order updates are discarded.
    pub fn apply(&mut self, mesh_id: MeshId, payload: &StatePayload) -> bool {
        if let Some(existing) = self.snapshots.get(&mesh_id) {
            if payload.timestamp < existing.timestamp {
                return false;
            }
        }
        self.snapshots.insert(mesh_id, StateSnapshot::from_payload(payload));
        true
    }

    /// Fetch the snapshot for `mesh_id`, if any.
    pub fn get(&self, mesh_id: &MeshId) -> Option<&StateSnapshot> {
        self.snapshots.get(mesh_id)
    }

    /// Remove the snapshot for `mesh_id`, e.g. when its session is cleaned up.
    pub fn remove(&mut self, mesh_id: &MeshId) {
        self.snapshots.remove(mesh_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lyktparad_proto::payload::{NodeRole, NodeStatus};

    fn sample(timestamp: u32) -> StatePayload {
        StatePayload {
            root_ip: [10, 0, 0, 1],
            mesh_id: [1, 2, 3, 4, 5, 6],
            timestamp,
            connected: true,
            nodes: vec![NodeEntry {
                node_id: [0; 6],
                address: [10, 0, 0, 1],
                layer: 0,
                parent_id: [0; 6],
                role: NodeRole::Root,
                status: NodeStatus::Connected,
            }],
            sequence_active: false,
            sequence_position: 0,
            sequence_total: 0,
            ota_active: false,
            ota_percent: 0,
        }
    }

    #[test]
    fn apply_overwrites_in_place() {
        let mut store = StateStore::new();
        store.apply([1; 6], &sample(1));
        store.apply([1; 6], &sample(2));
        assert_eq!(store.get(&[1; 6]).unwrap().timestamp, 2);
    }

    #[test]
    fn out_of_order_update_is_dropped() {
        let mut store = StateStore::new();
        store.apply([1; 6], &sample(5));
        let applied = store.apply([1; 6], &sample(3));
        assert!(!applied);
        assert_eq!(store.get(&[1; 6]).unwrap().timestamp, 5);
    }

    #[test]
    fn staleness_flag_reflects_age() {
        let mut store = StateStore::new();
        store.apply([1; 6], &sample(1));
        let snap = store.get(&[1; 6]).unwrap();
        assert!(!snap.is_stale(Duration::from_secs(10)));
        assert!(snap.is_stale(Duration::from_secs(0)));
    }
}
