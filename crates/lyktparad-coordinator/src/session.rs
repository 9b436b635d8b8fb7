// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Session registry: one record per registered root, keyed by mesh-id.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// 6-byte opaque mesh identity, the registry's primary key.
pub type MeshId = [u8; 6];

/// The coordinator's record of one registered root.
#[derive(Debug, Clone)]
pub struct Session {
    /// Identity of the mesh this session represents.
    pub mesh_id: MeshId,
    /// Last-known address the root's datagrams arrived from.
    pub root_addr: SocketAddr,
    /// Node count as of the last heartbeat or state update.
    pub node_count: u8,
    /// Firmware version string reported at registration.
    pub firmware_version: String,
    /// When this session was first registered.
    pub registered_at: Instant,
    /// Timestamp of the last heartbeat packet, if any.
    pub last_heartbeat: Option<Instant>,
    /// Timestamp of the last state update packet, if any.
    pub last_state_update: Option<Instant>,
    /// Consecutive UDP send failures observed for this session.
    pub failure_count: u32,
    /// Whether this session is currently considered offline.
    pub offline: bool,
}

impl Session {
    fn new(mesh_id: MeshId, root_addr: SocketAddr, node_count: u8, firmware_version: String) -> Self {
        let now = Instant::now();
        Self {
            mesh_id,
            root_addr,
            node_count,
            firmware_version,
            registered_at: now,
            last_heartbeat: None,
            last_state_update: None,
            failure_count: 0,
            offline: false,
        }
    }

    /// Most recent activity timestamp, falling back to registration time if
    /// neither a heartbeat nor a state update has ever arrived.
    pub fn last_activity(&self) -> Instant {
        [self.last_heartbeat, self.last_state_update, Some(self.registered_at)]
            .into_iter()
            .flatten()
            .max()
            .unwrap_or(self.registered_at)
    }

    /// True when `last_activity()` is older than `timeout`.
    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_activity().elapsed() > timeout
    }

    /// True when this session should be removed outright: offline (or never
    /// active) for at least `cleanup_timeout`.
    pub fn is_cleanup_eligible(&self, cleanup_timeout: Duration) -> bool {
        self.offline && self.last_activity().elapsed() > cleanup_timeout
    }

    /// Record activity from `source`, clearing offline/failure state and
    /// migrating the stored address if the source has changed (the IP-change
    /// recovery path).
    fn record_activity(&mut self, source: SocketAddr) {
        if self.root_addr != source {
            self.root_addr = source;
        }
        self.failure_count = 0;
        self.offline = false;
    }
}

/// Registry of all coordinator sessions, keyed by mesh-id.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: HashMap<MeshId, Session>,
}

impl SessionRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a root, creating a new session or reviving an existing one.
    /// Per the recovery invariant, re-registering preserves `registered_at`
    /// if a session for this mesh-id already exists.
    pub fn register(
        &mut self,
        mesh_id: MeshId,
        source: SocketAddr,
        node_count: u8,
        firmware_version: String,
    ) {
        match self.sessions.get_mut(&mesh_id) {
            Some(existing) => {
                existing.node_count = node_count;
                existing.firmware_version = firmware_version;
                existing.record_activity(source);
            }
            None => {
                self.sessions
                    .insert(mesh_id, Session::new(mesh_id, source, node_count, firmware_version));
            }
        }
    }

    /// Record a heartbeat, updating node count and clearing offline/failure
    /// state. Updates the stored address on an IP change.
    pub fn touch_heartbeat(&mut self, mesh_id: &MeshId, source: SocketAddr, node_count: Option<u8>) {
        if let Some(session) = self.sessions.get_mut(mesh_id) {
            if let Some(n) = node_count {
                session.node_count = n;
            }
            session.last_heartbeat = Some(Instant::now());
            session.record_activity(source);
        }
    }

    /// Record a state update, clearing offline/failure state. Updates the
    /// stored address on an IP change.
    pub fn touch_state_update(&mut self, mesh_id: &MeshId, source: SocketAddr) {
        if let Some(session) = self.sessions.get_mut(mesh_id) {
            session.last_state_update = Some(Instant::now());
            session.record_activity(source);
        }
    }

    /// Record a UDP send failure against a session, returning the new
    /// failure count.
    pub fn record_failure(&mut self, mesh_id: &MeshId) -> Option<u32> {
        self.sessions.get_mut(mesh_id).map(|s| {
            s.failure_count += 1;
            s.failure_count
        })
    }

    /// Mark a session offline.
    pub fn mark_offline(&mut self, mesh_id: &MeshId) {
        if let Some(session) = self.sessions.get_mut(mesh_id) {
            session.offline = true;
        }
    }

    /// Get a session by mesh-id.
    pub fn get(&self, mesh_id: &MeshId) -> Option<&Session> {
        self.sessions.get(mesh_id)
    }

    /// Every session in the registry.
    pub fn sessions(&self) -> impl Iterator<Item = &Session> {
        self.sessions.values()
    }

    /// Number of sessions currently registered.
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Remove every session for which `cleanup_timeout` has elapsed since
    /// going offline, returning their mesh-ids.
    pub fn remove_expired(&mut self, cleanup_timeout: Duration) -> Vec<MeshId> {
        let expired: Vec<MeshId> = self
            .sessions
            .values()
            .filter(|s| s.is_cleanup_eligible(cleanup_timeout))
            .map(|s| s.mesh_id)
            .collect();
        for mesh_id in &expired {
            self.sessions.remove(mesh_id);
        }
        expired
    }

    /// Remove every offline session immediately, regardless of age —
    /// administrative force-cleanup.
    pub fn force_cleanup(&mut self) -> Vec<MeshId> {
        let offline: Vec<MeshId> = self
            .sessions
            .values()
            .filter(|s| s.offline)
            .map(|s| s.mesh_id)
            .collect();
        for mesh_id in &offline {
            self.sessions.remove(mesh_id);
        }
        offline
    }
}
