// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The narrow interface the bridge needs from the mesh fabric.

use crate::command::MeshCommandId;
use crate::routing::RoutingEntry;
use crate::MeshId;

/// A command received from the mesh fabric, handed to the bridge's receive
/// callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeshMessage {
    /// Node the command originated from.
    pub source: MeshId,
    /// Which mesh-internal command this is.
    pub command: MeshCommandId,
    /// Raw command payload.
    pub payload: Vec<u8>,
}

/// Failure sending a command into the mesh fabric.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MeshError {
    /// The addressed node is not currently reachable.
    #[error("destination {0:02x?} unreachable")]
    Unreachable(MeshId),
    /// The underlying transport rejected the send.
    #[error("mesh transport error: {0}")]
    Transport(String),
}

/// What a mesh radio/routing implementation must expose to the bridge.
///
/// Implementations own everything below this boundary: routing, flooding,
/// retransmission, radio framing. The bridge only ever calls `send` and
/// registers a receive callback; it never reaches past this trait.
pub trait MeshLayer: Send + Sync {
    /// Send `payload` as `command` to `dest`. Returns once the underlying
    /// transport has accepted the send, not once it's been acknowledged —
    /// the mesh fabric's own reliability, if any, is invisible here.
    fn send(&self, dest: MeshId, command: MeshCommandId, payload: &[u8]) -> Result<(), MeshError>;

    /// This node's own mesh identity.
    fn local_id(&self) -> MeshId;

    /// This node's current IPv4 address as seen by the mesh fabric (used by
    /// the registration engine and state collector).
    fn local_address(&self) -> [u8; 4];

    /// Number of nodes currently reachable through the mesh, including this
    /// one.
    fn node_count(&self) -> u8;

    /// Whether the fabric currently considers itself formed end to end (used
    /// as the `connected` flag in the state collector's snapshot). A lone
    /// root with no children is still connected to itself.
    fn connected(&self) -> bool;

    /// A snapshot of every node the fabric can currently see, for the state
    /// collector's periodic state-update tick. Order is unspecified.
    fn routing_table(&self) -> Vec<RoutingEntry>;

    /// Register the callback invoked for every inbound mesh command. Only
    /// one callback is supported at a time; a later call replaces an
    /// earlier one.
    fn set_receiver(&self, callback: Box<dyn Fn(MeshMessage) + Send + Sync>);
}
