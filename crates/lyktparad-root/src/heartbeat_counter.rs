// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The free-running local heartbeat counter: an 8-bit tick that advances on
//! a fixed interval no matter what role this node holds or whether it is
//! connected to anything. Grounded in the mesh layer's own tick counter
//! (`SeenCache::tick`), generalized from a 32-bit duplicate-detection clock
//! to an 8-bit wrapping one.
//!
//! Distinct from both the bridge heartbeat (§4.5, 45 s, coordinator-facing)
//! and any mesh-internal liveness beacon — this counter is not sent
//! anywhere and not read by either of them.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tracing::debug;

/// Interval between ticks of the local heartbeat counter.
pub const TICK_INTERVAL: Duration = Duration::from_secs(1);

/// An 8-bit wrapping counter, incremented once per [`TICK_INTERVAL`].
#[derive(Debug, Default)]
pub struct LocalHeartbeatCounter {
    value: AtomicU8,
}

impl LocalHeartbeatCounter {
    /// A fresh counter starting at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value, without advancing it.
    pub fn get(&self) -> u8 {
        self.value.load(Ordering::Relaxed)
    }

    /// Advance by one tick, wrapping at 256.
    pub fn tick(&self) -> u8 {
        self.value.fetch_add(1, Ordering::Relaxed).wrapping_add(1)
    }
}

/// Drive a [`LocalHeartbeatCounter`] on [`TICK_INTERVAL`] until `shutdown`
/// fires. Runs unconditionally: unlike the bridge heartbeat/state tasks,
/// this is never started or stopped by role transitions.
pub async fn run(counter: Arc<LocalHeartbeatCounter>, shutdown: Arc<Notify>) {
    let mut interval = tokio::time::interval(TICK_INTERVAL);
    loop {
        tokio::select! {
            _ = interval.tick() => {
                counter.tick();
            }
            _ = shutdown.notified() => {
                debug!("local heartbeat counter task shutting down");
                break;
            }
        }
    }
}
