// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The discovery state machine: how a root with no confirmed coordinator
//! destination finds one.
//!
//! States run in a fixed cycle: `TryCache` (the address a previous
//! discovery saved), then `Mdns` (service browse), then `Broadcast` (listen
//! for the coordinator's own fallback announcement), then `RetryBackoff`
//! before cycling back through `Mdns`/`Broadcast` again. Every state that
//! turns up a candidate address runs the full registration handshake
//! ([`crate::registration::register_with_retries`]) against it immediately;
//! a `Rejected` or `TimedOut` outcome just moves on to the next state rather
//! than aborting the whole cycle.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicBool, AtomicU16, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use lyktparad_mesh::MeshLayer;
use lyktparad_proto::payload::RegisterPayload;
use mdns_sd::{ServiceDaemon, ServiceEvent};
use serde::Deserialize;
use tokio::net::UdpSocket;
use tokio::sync::Notify;
use tracing::{debug, info, warn};

use crate::cache::{read_cached_server, write_cached_server, CachedServer};
use crate::config::RootConfig;
use crate::outbound::OutboundLink;
use crate::registration::{register_with_retries, RegistrationOutcome, DEFAULT_BACKOFFS};

/// mDNS service type advertised by the coordinator.
const SERVICE_TYPE: &str = "_lyktparad-web._tcp.local.";
/// Service name a broadcast announcement must carry to be accepted, matching
/// the coordinator's own `BROADCAST_SERVICE_NAME`.
const BROADCAST_SERVICE_NAME: &str = "lyktparad-web";

/// The coordinator's UDP fallback announcement, as broadcast on
/// `broadcast_port`. Mirrors the shape the coordinator serializes; only the
/// fields discovery needs are declared.
#[derive(Debug, Deserialize)]
struct BroadcastAnnouncement {
    service: String,
    udp_port: u16,
}

fn now_secs() -> u32 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs() as u32).unwrap_or(0)
}

/// Drives the discovery cycle and, on success, leaves `link` pointed at the
/// accepted coordinator and the cache file updated.
pub struct Discovery {
    config: Arc<RootConfig>,
    kv: Arc<dyn lyktparad_kv::KvStore>,
    link: Arc<OutboundLink>,
    mesh: Arc<dyn MeshLayer>,
    registered: Arc<AtomicBool>,
    seq: AtomicU16,
}

impl Discovery {
    /// Build a discovery driver over the given collaborators. `registered`
    /// is flipped to `true` the moment a candidate accepts this root, so
    /// [`crate::mirror::MirroringMeshSend`] (sharing the same flag) knows
    /// when it's safe to start mirroring sends to the coordinator.
    pub fn new(
        config: Arc<RootConfig>,
        kv: Arc<dyn lyktparad_kv::KvStore>,
        link: Arc<OutboundLink>,
        mesh: Arc<dyn MeshLayer>,
        registered: Arc<AtomicBool>,
    ) -> Self {
        Self {
            config,
            kv,
            link,
            mesh,
            registered,
            seq: AtomicU16::new(1),
        }
    }

    fn next_seq(&self) -> u16 {
        self.seq.fetch_add(1, Ordering::SeqCst)
    }

    fn register_payload(&self) -> RegisterPayload {
        RegisterPayload {
            root_ip: self.mesh.local_address(),
            mesh_id: self.mesh.local_id(),
            node_count: self.mesh.node_count(),
            version: self.config.firmware_version.clone(),
            timestamp: now_secs(),
        }
    }

    /// Attempt the registration handshake against `dest`. On acceptance,
    /// points `link` at `dest` and persists it to the cache.
    async fn try_register(&self, dest: SocketAddr) -> RegistrationOutcome {
        let register = self.register_payload();
        let outcome = register_with_retries(
            &self.link,
            dest,
            &register,
            self.config.register_ack_timeout(),
            &DEFAULT_BACKOFFS,
            || self.next_seq(),
        )
        .await;
        if outcome == RegistrationOutcome::Accepted {
            self.link.set_dest(dest);
            self.registered.store(true, Ordering::Relaxed);
            if let (IpAddr::V4(addr), port) = (dest.ip(), dest.port()) {
                if let Err(e) = write_cached_server(self.kv.as_ref(), CachedServer { addr, port }) {
                    warn!("failed to persist discovered server to cache: {e}");
                }
            }
        }
        outcome
    }

    /// Try the cached server from a previous successful discovery, if any.
    /// Returns `true` on acceptance.
    async fn try_cache(&self) -> bool {
        let Some(cached) = read_cached_server(self.kv.as_ref()) else {
            debug!("no cached server to try");
            return false;
        };
        let dest = SocketAddr::new(IpAddr::V4(cached.addr), cached.port);
        info!("trying cached coordinator {dest}");
        self.try_register(dest).await == RegistrationOutcome::Accepted
    }

    /// Browse mDNS for `mdns_timeout`, attempting registration against every
    /// resolved candidate in the order they arrive. Returns `true` on the
    /// first acceptance.
    async fn try_mdns(&self) -> bool {
        let timeout = self.config.mdns_timeout();
        let candidates = tokio::task::spawn_blocking(move || browse_mdns_blocking(timeout))
            .await
            .unwrap_or_default();
        if candidates.is_empty() {
            debug!("mdns browse found no candidates");
            return false;
        }
        for (addr, port) in candidates {
            let dest = SocketAddr::new(IpAddr::V4(addr), port);
            info!("trying mdns-discovered coordinator {dest}");
            if self.try_register(dest).await == RegistrationOutcome::Accepted {
                return true;
            }
        }
        false
    }

    /// Listen for the coordinator's broadcast fallback announcement until
    /// `mdns_timeout` elapses, attempting registration against the first
    /// valid announcement received. Returns `true` on acceptance.
    async fn try_broadcast(&self) -> bool {
        let socket = match UdpSocket::bind((self.config.bind_address, self.config.broadcast_port)).await {
            Ok(s) => s,
            Err(e) => {
                warn!("broadcast listener could not bind port {}: {e}", self.config.broadcast_port);
                return false;
            }
        };
        let deadline = Instant::now() + self.config.mdns_timeout();
        let mut buf = [0u8; 512];
        while Instant::now() < deadline {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let received = tokio::time::timeout(remaining, socket.recv_from(&mut buf)).await;
            let (len, source) = match received {
                Ok(Ok(pair)) => pair,
                Ok(Err(e)) => {
                    warn!("broadcast listener recv error: {e}");
                    continue;
                }
                Err(_elapsed) => break,
            };
            let announcement: BroadcastAnnouncement = match serde_json::from_slice(&buf[..len]) {
                Ok(a) => a,
                Err(_) => continue,
            };
            if announcement.service != BROADCAST_SERVICE_NAME || announcement.udp_port == 0 {
                continue;
            }
            let dest = SocketAddr::new(source.ip(), announcement.udp_port);
            info!("trying broadcast-discovered coordinator {dest}");
            if self.try_register(dest).await == RegistrationOutcome::Accepted {
                return true;
            }
        }
        false
    }

    /// Run the discovery cycle until a coordinator accepts this root, or
    /// `shutdown` is notified. Returns `false` if shutdown won the race.
    pub async fn run(&self, shutdown: &Notify) -> bool {
        let (backoff_min, backoff_max) = self.config.discovery_backoff_range();
        let mut backoff = backoff_min;

        if self.try_cache().await {
            return true;
        }

        loop {
            let found = tokio::select! {
                found = self.try_mdns() => found,
                _ = shutdown.notified() => return false,
            };
            if found {
                return true;
            }

            let found = tokio::select! {
                found = self.try_broadcast() => found,
                _ = shutdown.notified() => return false,
            };
            if found {
                return true;
            }

            debug!("discovery cycle exhausted, backing off {backoff:?}");
            tokio::select! {
                _ = tokio::time::sleep(backoff) => {}
                _ = shutdown.notified() => return false,
            }
            backoff = (backoff * 2).min(backoff_max);
        }
    }
}

/// Blocking mDNS browse, run on a blocking-pool thread since `mdns-sd`'s
/// receiver is a synchronous channel.
fn browse_mdns_blocking(timeout: Duration) -> Vec<(Ipv4Addr, u16)> {
    let daemon = match ServiceDaemon::new() {
        Ok(d) => d,
        Err(e) => {
            warn!("mdns daemon init failed: {e}");
            return Vec::new();
        }
    };
    let receiver = match daemon.browse(SERVICE_TYPE) {
        Ok(r) => r,
        Err(e) => {
            warn!("mdns browse failed: {e}");
            return Vec::new();
        }
    };

    let mut candidates = Vec::new();
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match receiver.recv_timeout(remaining) {
            Ok(ServiceEvent::ServiceResolved(info)) => {
                let port = info
                    .get_property_val_str("udp_port")
                    .and_then(|s| s.parse::<u16>().ok())
                    .unwrap_or_else(|| info.get_port());
                for addr in info.get_addresses() {
                    if let IpAddr::V4(v4) = addr {
                        candidates.push((*v4, port));
                    }
                }
            }
            Ok(_) => {}
            Err(_) => break,
        }
    }
    let _ = daemon.shutdown();
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use lyktparad_kv::JsonFileKvStore;
    use lyktparad_mesh::LoopbackMesh;
    use lyktparad_proto::command::CommandId;
    use lyktparad_proto::frame::{decode_frame, encode_frame, ChecksumPolicy};
    use lyktparad_proto::payload::AckStatus;
    use tokio::net::UdpSocket as TestSocket;

    async fn discovery_with_cache(cache_dir: &std::path::Path) -> (Discovery, Arc<dyn lyktparad_kv::KvStore>) {
        let kv: Arc<dyn lyktparad_kv::KvStore> =
            Arc::new(JsonFileKvStore::open(cache_dir.join("cache.json")).unwrap());
        let config = Arc::new(RootConfig::default());
        let link = Arc::new(OutboundLink::bind(config.bind_address, ChecksumPolicy::Strict).await.unwrap());
        let mesh: Arc<dyn MeshLayer> = Arc::new(LoopbackMesh::new([1, 2, 3, 4, 5, 6], [10, 0, 0, 9], 1));
        let registered = Arc::new(AtomicBool::new(false));
        (Discovery::new(config, kv.clone(), link, mesh, registered), kv)
    }

    #[tokio::test]
    async fn try_cache_succeeds_against_a_live_coordinator() {
        let dir = tempfile::tempdir().unwrap();
        let (discovery, kv) = discovery_with_cache(dir.path()).await;

        let coordinator = TestSocket::bind("127.0.0.1:0").await.unwrap();
        let coordinator_addr = coordinator.local_addr().unwrap();
        write_cached_server(
            kv.as_ref(),
            CachedServer {
                addr: match coordinator_addr.ip() {
                    IpAddr::V4(v4) => v4,
                    _ => unreachable!(),
                },
                port: coordinator_addr.port(),
            },
        )
        .unwrap();

        let responder = tokio::spawn(async move {
            let mut buf = [0u8; 128];
            let (len, from) = coordinator.recv_from(&mut buf).await.unwrap();
            let frame = decode_frame(&buf[..len], ChecksumPolicy::Strict).unwrap();
            assert_eq!(frame.command, CommandId::Register);
            let ack = encode_frame(CommandId::RegistrationAck, None, &AckStatus::Accepted.encode()).unwrap();
            coordinator.send_to(&ack, from).await.unwrap();
        });

        assert!(discovery.try_cache().await);
        responder.await.unwrap();
        assert_eq!(discovery.link.dest(), Some(coordinator_addr));
    }

    #[tokio::test]
    async fn try_cache_fails_with_no_cached_entry() {
        let dir = tempfile::tempdir().unwrap();
        let (discovery, _kv) = discovery_with_cache(dir.path()).await;
        assert!(!discovery.try_cache().await);
    }

    #[tokio::test]
    async fn try_broadcast_accepts_a_matching_announcement() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = RootConfig::default();
        config.broadcast_port = 0;
        let kv: Arc<dyn lyktparad_kv::KvStore> = Arc::new(JsonFileKvStore::open(dir.path().join("cache.json")).unwrap());
        let link = Arc::new(OutboundLink::bind(config.bind_address, ChecksumPolicy::Strict).await.unwrap());
        let mesh: Arc<dyn MeshLayer> = Arc::new(LoopbackMesh::new([1; 6], [10, 0, 0, 9], 1));

        // Bind the broadcast listener directly to learn its ephemeral port,
        // then hand the same port to a fresh Discovery instance so
        // `try_broadcast` binds to the address we can send to.
        let probe = TestSocket::bind((config.bind_address, 0)).await.unwrap();
        let broadcast_port = probe.local_addr().unwrap().port();
        drop(probe);
        config.broadcast_port = broadcast_port;
        let config = Arc::new(config);
        let discovery = Discovery::new(config.clone(), kv, link, mesh, Arc::new(AtomicBool::new(false)));

        let coordinator = TestSocket::bind("127.0.0.1:0").await.unwrap();
        let coordinator_addr = coordinator.local_addr().unwrap();
        let sender = tokio::spawn({
            let broadcast_port = broadcast_port;
            async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                let announcement = serde_json::json!({
                    "service": BROADCAST_SERVICE_NAME,
                    "port": 8080,
                    "udp_port": coordinator_addr.port(),
                    "protocol": "udp",
                    "version": "1.0",
                });
                coordinator
                    .send_to(
                        announcement.to_string().as_bytes(),
                        ("127.0.0.1", broadcast_port),
                    )
                    .await
                    .unwrap();
                coordinator
            }
        });

        let coordinator = sender.await.unwrap();
        let responder = tokio::spawn(async move {
            let mut buf = [0u8; 128];
            let (len, from) = coordinator.recv_from(&mut buf).await.unwrap();
            let frame = decode_frame(&buf[..len], ChecksumPolicy::Strict).unwrap();
            assert_eq!(frame.command, CommandId::Register);
            let ack = encode_frame(CommandId::RegistrationAck, None, &AckStatus::Accepted.encode()).unwrap();
            coordinator.send_to(&ack, from).await.unwrap();
        });

        assert!(discovery.try_broadcast().await);
        responder.await.unwrap();
    }
}
