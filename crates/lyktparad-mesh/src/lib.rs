// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The boundary between the bridge and the mesh fabric itself.
//!
//! Routing, flooding, retransmission, and radio framing all happen below
//! this crate — a node's actual forwarding behavior is out of scope here.
//! What the bridge needs from the mesh is narrow: a way to send a command to
//! a destination node, a way to be told about inbound mesh commands, and a
//! way to be told when this node's root role changes.

/// The send/receive boundary a mesh implementation must expose.
pub mod layer;
/// Mesh-internal command identifiers carried by [`layer::MeshMessage`].
pub mod command;
/// Root-role change notifications.
pub mod role;
/// An in-memory mesh used for host-side testing.
pub mod loopback;
/// The routing snapshot row type returned by [`layer::MeshLayer::routing_table`].
pub mod routing;
/// The lighting/plugin runtime's command dispatch surface.
pub mod dispatch;

pub use command::MeshCommandId;
pub use dispatch::{ColorState, InMemoryPluginRuntime, OtaProgress, PluginRuntime};
pub use layer::{MeshError, MeshLayer, MeshMessage};
pub use loopback::LoopbackMesh;
pub use role::{MeshRole, RoleObserver};
pub use routing::{RoutingEntry, RoutingRole};

/// 6-byte opaque mesh node identity, MAC-shaped.
pub type MeshId = [u8; 6];

/// Convention for "every node currently in the mesh", used by pushes that
/// have no single addressee (e.g. [`role::RoleObserver`]'s re-assertion of
/// an already-active plugin command to a freshly elected root). The mesh
/// fabric's actual flooding/broadcast mechanics are out of scope here; this
/// is just the identity the bridge passes to [`layer::MeshLayer::send`].
pub const MESH_BROADCAST: MeshId = [0xFF; 6];
