// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Root-role change notification.
//!
//! The mesh election algorithm itself is out of scope; all the bridge needs
//! is to know when this node gains or loses the root role, so that heartbeat,
//! state, the API listener, and the mirror wrapper can start and stop
//! together (design notes: "break with message passing — discovery
//! publishes `ServerFound`, role observer publishes `RoleChanged`").

use tokio::sync::watch;

/// Whether this node currently holds the elected root role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeshRole {
    /// This node owns WAN connectivity and drives the bridge.
    Root,
    /// This node is a mesh child; the bridge subsystems stay dormant.
    Child,
}

/// Publishes [`MeshRole`] changes to every interested bridge subsystem.
///
/// Backed by a `tokio::sync::watch` channel: subscribers always see the
/// latest role and can `changed().await` to wait for the next transition,
/// with no risk of missing an edge between subscribe and first poll.
pub struct RoleObserver {
    tx: watch::Sender<MeshRole>,
}

impl RoleObserver {
    /// Create an observer starting from `initial`.
    pub fn new(initial: MeshRole) -> (Self, watch::Receiver<MeshRole>) {
        let (tx, rx) = watch::channel(initial);
        (Self { tx }, rx)
    }

    /// Publish a new role, notifying every subscriber. A no-op if the role
    /// is unchanged, so subscribers never see a spurious edge.
    pub fn set(&self, role: MeshRole) {
        self.tx.send_if_modified(|current| {
            if *current == role {
                false
            } else {
                *current = role;
                true
            }
        });
    }

    /// Current role, without waiting for a change.
    pub fn current(&self) -> MeshRole {
        *self.tx.borrow()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscriber_observes_transition() {
        let (observer, mut rx) = RoleObserver::new(MeshRole::Child);
        assert_eq!(*rx.borrow(), MeshRole::Child);

        observer.set(MeshRole::Root);
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), MeshRole::Root);
    }

    #[test]
    fn duplicate_set_is_not_an_edge() {
        let (observer, mut rx) = RoleObserver::new(MeshRole::Root);
        observer.set(MeshRole::Root);
        assert!(rx.has_changed().is_ok_and(|changed| !changed));
    }
}
