// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Pending RPC table: matches datagram responses back to the HTTP request
//! that triggered them, by sequence number.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU16, Ordering};
use std::time::{Duration, Instant};

use std::sync::Arc;

use tokio::sync::{oneshot, Mutex, Notify};
use tracing::debug;

struct PendingEntry {
    responder: oneshot::Sender<Vec<u8>>,
    created_at: Instant,
}

/// Sequence-number allocator plus the map of RPCs awaiting a response.
///
/// One writer operates on the map at a time (the datagram listener and the
/// HTTP handlers briefly lock it); each entry is effectively single-consumer,
/// since only the awaiting HTTP handler ever reads from the `oneshot`
/// receiver it was handed at `register` time.
pub struct PendingRpcMap {
    next_seq: AtomicU16,
    entries: Mutex<HashMap<u16, PendingEntry>>,
}

impl Default for PendingRpcMap {
    fn default() -> Self {
        Self::new()
    }
}

impl PendingRpcMap {
    /// Create an empty map, sequence numbers starting at 0.
    pub fn new() -> Self {
        Self {
            next_seq: AtomicU16::new(0),
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Allocate the next sequence number. Wraps at 65536; collisions with a
    /// still-pending entry are avoided in practice by the 5-minute janitor
    /// sweep, per the concurrency model.
    pub fn alloc_seq(&self) -> u16 {
        self.next_seq.fetch_add(1, Ordering::Relaxed)
    }

    /// Register a pending RPC under `seq`, returning the receiver half the
    /// caller awaits for the response.
    pub async fn register(&self, seq: u16) -> oneshot::Receiver<Vec<u8>> {
        let (tx, rx) = oneshot::channel();
        let mut entries = self.entries.lock().await;
        entries.insert(
            seq,
            PendingEntry {
                responder: tx,
                created_at: Instant::now(),
            },
        );
        rx
    }

    /// Fulfil the pending entry for `seq` with `payload`. Returns `false`
    /// (and logs nothing itself — the caller decides) if `seq` is unknown,
    /// e.g. because it already timed out or was never issued.
    pub async fn fulfil(&self, seq: u16, payload: Vec<u8>) -> bool {
        let mut entries = self.entries.lock().await;
        match entries.remove(&seq) {
            Some(entry) => entry.responder.send(payload).is_ok(),
            None => false,
        }
    }

    /// Remove the pending entry for `seq` without fulfilling it, e.g. when
    /// the awaiter's own timeout fires first.
    pub async fn cancel(&self, seq: u16) {
        self.entries.lock().await.remove(&seq);
    }

    /// Evict every entry older than `max_age`, returning how many were
    /// removed. Intended to run on the janitor's periodic sweep.
    pub async fn sweep(&self, max_age: Duration) -> usize {
        let mut entries = self.entries.lock().await;
        let stale: Vec<u16> = entries
            .iter()
            .filter(|(_, e)| e.created_at.elapsed() > max_age)
            .map(|(seq, _)| *seq)
            .collect();
        for seq in &stale {
            entries.remove(seq);
        }
        stale.len()
    }

    /// Number of RPCs currently awaiting a response.
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }
}

/// Run the periodic janitor sweep until `shutdown` is notified, evicting any
/// entry older than `max_age`.
pub async fn run_janitor(pending: Arc<PendingRpcMap>, sweep_interval: Duration, max_age: Duration, shutdown: Arc<Notify>) {
    let mut interval = tokio::time::interval(sweep_interval);
    loop {
        tokio::select! {
            _ = interval.tick() => {
                let evicted = pending.sweep(max_age).await;
                if evicted > 0 {
                    debug!("janitor evicted {evicted} stale pending RPC entries");
                }
            }
            _ = shutdown.notified() => {
                debug!("pending RPC janitor shutting down");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fulfil_delivers_to_waiter() {
        let map = PendingRpcMap::new();
        let seq = map.alloc_seq();
        let rx = map.register(seq).await;
        assert!(map.fulfil(seq, vec![1, 2, 3]).await);
        assert_eq!(rx.await.unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn fulfil_unknown_seq_is_false() {
        let map = PendingRpcMap::new();
        assert!(!map.fulfil(999, vec![]).await);
    }

    #[tokio::test]
    async fn sweep_evicts_stale_entries_only() {
        let map = PendingRpcMap::new();
        let old_seq = map.alloc_seq();
        let _old_rx = map.register(old_seq).await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        let fresh_seq = map.alloc_seq();
        let _fresh_rx = map.register(fresh_seq).await;

        let evicted = map.sweep(Duration::from_millis(10)).await;
        assert_eq!(evicted, 1);
        assert_eq!(map.len().await, 1);
    }

    #[tokio::test]
    async fn seq_allocator_increments_and_wraps() {
        let map = PendingRpcMap::new();
        map.next_seq.store(u16::MAX, Ordering::Relaxed);
        assert_eq!(map.alloc_seq(), u16::MAX);
        assert_eq!(map.alloc_seq(), 0);
    }

    #[tokio::test]
    async fn cancel_removes_without_fulfilling() {
        let map = PendingRpcMap::new();
        let seq = map.alloc_seq();
        let rx = map.register(seq).await;
        map.cancel(seq).await;
        assert!(rx.await.is_err());
        assert_eq!(map.len().await, 0);
    }
}
