// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The outbound link to the coordinator: register/heartbeat/state/mirror
//! sends, and the registration ACK that arrives back on the same socket.
//!
//! This is a distinct socket from the RPC listener (§4.7): RPC requests
//! arrive on the fixed, well-known `rpc_port`, while this socket is bound
//! ephemerally and only ever talks to whichever coordinator address
//! discovery/registration last set as its destination.

use std::net::SocketAddr;
use std::sync::RwLock;

use lyktparad_proto::command::CommandId;
use lyktparad_proto::frame::{decode_frame, encode_frame, ChecksumPolicy, FrameError};
use lyktparad_proto::payload::{AckStatus, HeartbeatPayload, MirrorPayload, RegisterPayload, StatePayload};
use tokio::net::UdpSocket;

/// Owns the ephemeral socket used for everything the root sends to the
/// coordinator except RPC responses.
pub struct OutboundLink {
    socket: UdpSocket,
    dest: RwLock<Option<SocketAddr>>,
    checksum_policy: ChecksumPolicy,
}

impl OutboundLink {
    /// Bind a fresh ephemeral socket with no destination set yet.
    pub async fn bind(bind_address: std::net::IpAddr, checksum_policy: ChecksumPolicy) -> std::io::Result<Self> {
        let socket = UdpSocket::bind((bind_address, 0)).await?;
        Ok(Self {
            socket,
            dest: RwLock::new(None),
            checksum_policy,
        })
    }

    /// Local address this link is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Point this link at a newly discovered/confirmed coordinator.
    pub fn set_dest(&self, dest: SocketAddr) {
        *self.dest.write().expect("outbound link rwlock poisoned") = Some(dest);
    }

    /// Current destination, if one has been set.
    pub fn dest(&self) -> Option<SocketAddr> {
        *self.dest.read().expect("outbound link rwlock poisoned")
    }

    /// Send a `Register` frame to `dest` (registration targets an explicit
    /// candidate address, which may not yet be the confirmed destination).
    pub async fn send_register(&self, register: &RegisterPayload, seq: u16, dest: SocketAddr) -> std::io::Result<()> {
        let frame = encode_frame(CommandId::Register, Some(seq), &register.encode())
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string()))?;
        self.socket.send_to(&frame, dest).await?;
        Ok(())
    }

    /// Wait for a `RegistrationAck` frame, up to `timeout`. Any other frame
    /// received while waiting is logged and ignored, since only the register
    /// handshake uses this path and nothing else targets this socket until
    /// registration completes.
    pub async fn recv_ack(&self, timeout: std::time::Duration) -> std::io::Result<Option<AckStatus>> {
        let mut buf = vec![0u8; lyktparad_proto::MAX_PACKET_SIZE];
        let result = tokio::time::timeout(timeout, self.socket.recv_from(&mut buf)).await;
        let (len, _source) = match result {
            Ok(Ok(pair)) => pair,
            Ok(Err(e)) => return Err(e),
            Err(_elapsed) => return Ok(None),
        };
        match decode_frame(&buf[..len], self.checksum_policy) {
            Ok(frame) if frame.command == CommandId::RegistrationAck => {
                match AckStatus::decode(frame.payload) {
                    Ok(status) => Ok(Some(status)),
                    Err(_) => Ok(None),
                }
            }
            Ok(_) => Ok(None),
            Err(FrameError::ChecksumMismatch { .. }) => Ok(None),
            Err(_) => Ok(None),
        }
    }

    /// Fire-and-forget heartbeat send to the current destination.
    pub async fn send_heartbeat(&self, heartbeat: &HeartbeatPayload) -> std::io::Result<()> {
        self.send_fire_and_forget(CommandId::Heartbeat, &heartbeat.encode()).await
    }

    /// Fire-and-forget state update send to the current destination.
    pub async fn send_state(&self, state: &StatePayload) -> std::io::Result<()> {
        self.send_fire_and_forget(CommandId::StateUpdate, &state.encode()).await
    }

    /// Fire-and-forget mirror send to the current destination.
    pub async fn send_mirror(&self, mirror: &MirrorPayload) -> std::io::Result<()> {
        self.send_fire_and_forget(CommandId::MeshMirror, &mirror.encode()).await
    }

    async fn send_fire_and_forget(&self, command: CommandId, payload: &[u8]) -> std::io::Result<()> {
        let Some(dest) = self.dest() else {
            return Ok(());
        };
        let frame = encode_frame(command, None, payload)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string()))?;
        self.socket.send_to(&frame, dest).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::UdpSocket as TestSocket;

    #[tokio::test]
    async fn register_then_ack_roundtrip() {
        let link = OutboundLink::bind("127.0.0.1".parse().unwrap(), ChecksumPolicy::Strict)
            .await
            .unwrap();
        let coordinator = TestSocket::bind("127.0.0.1:0").await.unwrap();
        let coordinator_addr = coordinator.local_addr().unwrap();

        let register = RegisterPayload {
            root_ip: [10, 0, 0, 5],
            mesh_id: [1, 2, 3, 4, 5, 6],
            node_count: 3,
            version: "1.0.0".to_string(),
            timestamp: 1000,
        };
        link.send_register(&register, 7, coordinator_addr).await.unwrap();

        let mut buf = [0u8; 128];
        let (len, from) = coordinator.recv_from(&mut buf).await.unwrap();
        let frame = decode_frame(&buf[..len], ChecksumPolicy::Strict).unwrap();
        assert_eq!(frame.command, CommandId::Register);
        assert_eq!(frame.seq, Some(7));

        let ack = encode_frame(CommandId::RegistrationAck, None, &AckStatus::Accepted.encode()).unwrap();
        coordinator.send_to(&ack, from).await.unwrap();

        let status = link.recv_ack(std::time::Duration::from_secs(1)).await.unwrap();
        assert_eq!(status, Some(AckStatus::Accepted));
    }

    #[tokio::test]
    async fn recv_ack_times_out_with_no_response() {
        let link = OutboundLink::bind("127.0.0.1".parse().unwrap(), ChecksumPolicy::Strict)
            .await
            .unwrap();
        let status = link.recv_ack(std::time::Duration::from_millis(50)).await.unwrap();
        assert_eq!(status, None);
    }

    #[tokio::test]
    async fn fire_and_forget_sends_are_noop_without_dest() {
        let link = OutboundLink::bind("127.0.0.1".parse().unwrap(), ChecksumPolicy::Strict)
            .await
            .unwrap();
        let heartbeat = HeartbeatPayload {
            timestamp: 1,
            node_count: Some(1),
        };
        link.send_heartbeat(&heartbeat).await.unwrap();
    }

    #[tokio::test]
    async fn heartbeat_reaches_destination_once_set() {
        let link = OutboundLink::bind("127.0.0.1".parse().unwrap(), ChecksumPolicy::Strict)
            .await
            .unwrap();
        let coordinator = TestSocket::bind("127.0.0.1:0").await.unwrap();
        link.set_dest(coordinator.local_addr().unwrap());

        let heartbeat = HeartbeatPayload {
            timestamp: 42,
            node_count: Some(5),
        };
        link.send_heartbeat(&heartbeat).await.unwrap();

        let mut buf = [0u8; 128];
        let (len, _) = coordinator.recv_from(&mut buf).await.unwrap();
        let frame = decode_frame(&buf[..len], ChecksumPolicy::Strict).unwrap();
        assert_eq!(frame.command, CommandId::Heartbeat);
        assert_eq!(HeartbeatPayload::decode(frame.payload).unwrap(), heartbeat);
    }
}
