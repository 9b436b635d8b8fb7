// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Datagram listener + codec: the single receive loop for register,
//! heartbeat, state, mirror, and RPC-response packets, and the send path for
//! outbound RPC requests.

use std::net::SocketAddr;
use std::sync::Arc;

use lyktparad_proto::command::{ApiOp, CommandId};
use lyktparad_proto::frame::{decode_frame, encode_frame, ChecksumPolicy};
use lyktparad_proto::payload::{AckStatus, HeartbeatPayload, MirrorPayload, RegisterPayload, StatePayload};
use lyktparad_proto::DropCounters;
use tokio::net::UdpSocket;
use tokio::sync::{Notify, RwLock};
use tracing::{debug, info, warn};

use crate::config::CoordinatorConfig;
use crate::pending::PendingRpcMap;
use crate::session::SessionRegistry;
use crate::state::StateStore;

/// Owns the UDP socket that carries register/heartbeat/state/mirror traffic
/// in and RPC requests/responses in both directions.
pub struct DatagramService {
    socket: UdpSocket,
    registry: Arc<RwLock<SessionRegistry>>,
    state_store: Arc<RwLock<StateStore>>,
    pending: Arc<PendingRpcMap>,
    config: Arc<CoordinatorConfig>,
    drops: DropCounters,
}

impl DatagramService {
    /// Bind the datagram socket and construct the service.
    pub async fn bind(
        config: Arc<CoordinatorConfig>,
        registry: Arc<RwLock<SessionRegistry>>,
        state_store: Arc<RwLock<StateStore>>,
        pending: Arc<PendingRpcMap>,
    ) -> std::io::Result<Self> {
        let addr = SocketAddr::new(config.bind_address, config.udp_port);
        let socket = UdpSocket::bind(addr).await?;
        Ok(Self {
            socket,
            registry,
            state_store,
            pending,
            config,
            drops: DropCounters::new(),
        })
    }

    /// Local address this service is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Decoder drop counters, exposed for `/health`-style observability.
    pub fn drops(&self) -> &DropCounters {
        &self.drops
    }

    /// Send an RPC request (`op`, `seq`) to `dest` with `payload`.
    pub async fn send_rpc(&self, op: ApiOp, seq: u16, payload: &[u8], dest: SocketAddr) -> std::io::Result<()> {
        let frame = encode_frame(CommandId::Api(op), Some(seq), payload)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string()))?;
        self.socket.send_to(&frame, dest).await?;
        Ok(())
    }

    /// Run the receive loop until `shutdown` is notified.
    pub async fn run(&self, shutdown: Arc<Notify>) {
        let mut buf = vec![0u8; lyktparad_proto::MAX_PACKET_SIZE];
        loop {
            tokio::select! {
                result = self.socket.recv_from(&mut buf) => {
                    match result {
                        Ok((len, source)) => self.handle_datagram(&buf[..len], source).await,
                        Err(e) => warn!("datagram recv error: {e}"),
                    }
                }
                _ = shutdown.notified() => {
                    debug!("datagram service shutting down");
                    break;
                }
            }
        }
    }

    async fn handle_datagram(&self, bytes: &[u8], source: SocketAddr) {
        let frame = match decode_frame(bytes, self.config.checksum_policy()) {
            Ok(frame) => frame,
            Err(err) => {
                self.drops.record(&err);
                debug!("dropped datagram from {source}: {err}");
                return;
            }
        };
        if frame.checksum_mismatch {
            warn!("decoded {source} despite checksum mismatch (lenient policy)");
        }

        match frame.command {
            CommandId::Register => self.handle_register(frame.payload, source).await,
            CommandId::Heartbeat => self.handle_heartbeat(frame.payload, source).await,
            CommandId::StateUpdate => self.handle_state_update(frame.payload, source).await,
            CommandId::MeshMirror => self.handle_mirror(frame.payload),
            CommandId::Api(_) => {
                if let Some(seq) = frame.seq {
                    let fulfilled = self.pending.fulfil(seq, frame.payload.to_vec()).await;
                    if !fulfilled {
                        warn!("RPC response for unknown seq {seq} from {source}");
                    }
                }
            }
            CommandId::RegistrationAck => {
                debug!("coordinator does not expect a RegistrationAck, ignoring from {source}");
            }
        }
    }

    async fn handle_register(&self, payload: &[u8], source: SocketAddr) {
        let register = match RegisterPayload::decode(payload) {
            Ok(r) => r,
            Err(e) => {
                warn!("malformed register payload from {source}: {e}");
                self.send_ack(AckStatus::Rejected, source).await;
                return;
            }
        };

        self.registry.write().await.register(
            register.mesh_id,
            source,
            register.node_count,
            register.version,
        );
        info!("registered mesh {:02x?} from {source}", register.mesh_id);
        self.send_ack(AckStatus::Accepted, source).await;
    }

    async fn send_ack(&self, status: AckStatus, dest: SocketAddr) {
        match encode_frame(CommandId::RegistrationAck, None, &status.encode()) {
            Ok(frame) => {
                if let Err(e) = self.socket.send_to(&frame, dest).await {
                    warn!("failed to send registration ack to {dest}: {e}");
                }
            }
            Err(e) => warn!("failed to encode registration ack: {e}"),
        }
    }

    async fn handle_heartbeat(&self, payload: &[u8], source: SocketAddr) {
        let heartbeat = match HeartbeatPayload::decode(payload) {
            Ok(h) => h,
            Err(e) => {
                warn!("malformed heartbeat from {source}: {e}");
                return;
            }
        };
        if let Some(mesh_id) = self.mesh_id_for_addr(source).await {
            self.registry
                .write()
                .await
                .touch_heartbeat(&mesh_id, source, heartbeat.node_count);
        }
    }

    async fn handle_state_update(&self, payload: &[u8], source: SocketAddr) {
        let state = match StatePayload::decode(payload) {
            Ok(s) => s,
            Err(e) => {
                warn!("malformed state update from {source}: {e}");
                return;
            }
        };
        self.registry.write().await.touch_state_update(&state.mesh_id, source);
        self.state_store.write().await.apply(state.mesh_id, &state);
    }

    fn handle_mirror(&self, payload: &[u8]) {
        match MirrorPayload::decode(payload) {
            Ok(mirror) => {
                debug!(
                    "mirror: mesh_cmd={:#04x} len={} ts={}",
                    mirror.mesh_cmd,
                    mirror.mesh_payload.len(),
                    mirror.timestamp
                );
            }
            Err(e) => warn!("malformed mirror payload: {e}"),
        }
    }

    /// The registry is keyed by mesh-id, not address, so a heartbeat (which
    /// carries no mesh-id of its own) is matched to its session by source
    /// address. This is a linear scan; the session count is expected to stay
    /// small (one root per mesh on a LAN).
    async fn mesh_id_for_addr(&self, source: SocketAddr) -> Option<crate::session::MeshId> {
        self.registry
            .read()
            .await
            .sessions()
            .find(|s| s.root_addr == source)
            .map(|s| s.mesh_id)
    }
}
