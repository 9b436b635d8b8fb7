// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The RPC listener: the root's half of the request/response exchange the
//! coordinator's HTTP handlers translate into. One socket, bound to the
//! fixed `rpc_port`; every request is dispatched through [`dispatch`] to the
//! [`PluginRuntime`] and [`MeshLayer`] collaborators, then answered on the
//! same `SEQ` it arrived with.
//!
//! An unrecognized `ApiOp` byte still carries a `SEQ` (the whole `0xE7..=0xFF`
//! range is SEQ-bearing), so the listener replies with [`ApiOp::Error`] on
//! that recovered `SEQ` rather than dropping the request silently — the
//! coordinator's pending-RPC map is waiting on that sequence number either
//! way.

use std::net::SocketAddr;
use std::sync::Arc;

use lyktparad_mesh::{MeshLayer, PluginRuntime};
use lyktparad_proto::command::{ApiOp, CommandId};
use lyktparad_proto::frame::{decode_frame, encode_frame, recover_seq, ChecksumPolicy, FrameError};
use lyktparad_proto::payload::{
    ActiveResponse, ColorResponse, NodesResponse, OtaDownloadRequest, OtaRebootRequest, OtaStatusResponse,
    OtaVersionResponse, ProgressResponse, SequencePointerResponse, SequenceStatusResponse, SequenceUploadRequest,
    SetColorRequest, SuccessResponse,
};
use lyktparad_proto::DropCounters;
use tokio::net::UdpSocket;
use tokio::sync::Notify;
use tracing::{debug, warn};

/// Owns the RPC listener socket and the collaborators its dispatch table
/// reaches into.
pub struct ApiListener {
    socket: UdpSocket,
    mesh: Arc<dyn MeshLayer>,
    plugin: Arc<dyn PluginRuntime>,
    checksum_policy: ChecksumPolicy,
    drops: DropCounters,
}

impl ApiListener {
    /// Bind the fixed RPC port.
    pub async fn bind(
        bind_address: std::net::IpAddr,
        port: u16,
        mesh: Arc<dyn MeshLayer>,
        plugin: Arc<dyn PluginRuntime>,
        checksum_policy: ChecksumPolicy,
    ) -> std::io::Result<Self> {
        let socket = UdpSocket::bind((bind_address, port)).await?;
        Ok(Self {
            socket,
            mesh,
            plugin,
            checksum_policy,
            drops: DropCounters::new(),
        })
    }

    /// Local address this listener is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Decoder drop counters.
    pub fn drops(&self) -> &DropCounters {
        &self.drops
    }

    /// Run the receive loop until `shutdown` fires.
    pub async fn run(&self, shutdown: Arc<Notify>) {
        let mut buf = vec![0u8; lyktparad_proto::MAX_PACKET_SIZE];
        loop {
            tokio::select! {
                result = self.socket.recv_from(&mut buf) => {
                    match result {
                        Ok((len, source)) => self.handle_datagram(&buf[..len], source).await,
                        Err(e) => warn!("rpc listener recv error: {e}"),
                    }
                }
                _ = shutdown.notified() => {
                    debug!("rpc listener shutting down");
                    break;
                }
            }
        }
    }

    async fn handle_datagram(&self, bytes: &[u8], source: SocketAddr) {
        match decode_frame(bytes, self.checksum_policy) {
            Ok(frame) => {
                let CommandId::Api(op) = frame.command else {
                    debug!("unexpected non-RPC command on rpc listener from {source}");
                    return;
                };
                let Some(seq) = frame.seq else {
                    warn!("api frame missing seq from {source}, dropping");
                    return;
                };
                let response = dispatch(op, frame.payload, &self.mesh, &self.plugin);
                self.reply(op, seq, &response, source).await;
            }
            Err(err) => {
                self.drops.record(&err);
                if let FrameError::UnknownCommand(_) = err {
                    if let Some(seq) = recover_seq(bytes) {
                        self.reply(ApiOp::Error, seq, &[], source).await;
                    }
                } else {
                    debug!("dropped rpc datagram from {source}: {err}");
                }
            }
        }
    }

    async fn reply(&self, op: ApiOp, seq: u16, payload: &[u8], dest: SocketAddr) {
        match encode_frame(CommandId::Api(op), Some(seq), payload) {
            Ok(frame) => {
                if let Err(e) = self.socket.send_to(&frame, dest).await {
                    warn!("failed to send rpc reply to {dest}: {e}");
                }
            }
            Err(e) => warn!("failed to encode rpc reply: {e}"),
        }
    }
}

/// The dispatch table: one arm per [`ApiOp`], each calling straight into the
/// [`MeshLayer`]/[`PluginRuntime`] collaborators and encoding the result.
/// Malformed request bodies decode to a `success: false`-shaped response
/// rather than dropping the datagram, since the caller is still owed a
/// reply on this `SEQ`.
fn dispatch(op: ApiOp, payload: &[u8], mesh: &Arc<dyn MeshLayer>, plugin: &Arc<dyn PluginRuntime>) -> Vec<u8> {
    match op {
        ApiOp::Nodes => NodesResponse {
            count: mesh.node_count() as u32,
        }
        .encode_narrow()
        .to_vec(),

        ApiOp::GetColor => {
            let c = plugin.get_color();
            ColorResponse { r: c.r, g: c.g, b: c.b, is_set: c.is_set }.encode().to_vec()
        }

        ApiOp::SetColor => match SetColorRequest::decode(payload) {
            Ok(req) => SuccessResponse { success: plugin.set_color(req.r, req.g, req.b) }.encode().to_vec(),
            Err(_) => SuccessResponse { success: false }.encode().to_vec(),
        },

        ApiOp::SequenceUpload => {
            // SequenceUploadRequest::decode never fails: the blob is opaque.
            let req = SequenceUploadRequest::decode(payload).expect("sequence upload decode is infallible");
            SuccessResponse { success: plugin.sequence_upload(&req.blob) }.encode().to_vec()
        }

        ApiOp::SequencePointer => SequencePointerResponse { pointer: plugin.sequence_pointer() }.encode().to_vec(),

        ApiOp::SequenceStart => SuccessResponse { success: plugin.sequence_start() }.encode().to_vec(),
        ApiOp::SequenceStop => SuccessResponse { success: plugin.sequence_stop() }.encode().to_vec(),
        ApiOp::SequenceReset => SuccessResponse { success: plugin.sequence_reset() }.encode().to_vec(),
        ApiOp::SequenceStatus => SequenceStatusResponse { active: plugin.sequence_active() }.encode().to_vec(),

        ApiOp::OtaDownload => match OtaDownloadRequest::decode(payload) {
            Ok(req) => SuccessResponse { success: plugin.ota_download(&req.url) }.encode().to_vec(),
            Err(_) => SuccessResponse { success: false }.encode().to_vec(),
        },
        ApiOp::OtaStatus => {
            let p = plugin.ota_status();
            OtaStatusResponse { downloading: p.active, progress: p.fraction }.encode().to_vec()
        }
        ApiOp::OtaVersion => OtaVersionResponse { version: plugin.ota_version() }.encode().to_vec(),
        ApiOp::OtaCancel => SuccessResponse { success: plugin.ota_cancel() }.encode().to_vec(),
        ApiOp::OtaDistribute => SuccessResponse { success: plugin.ota_distribute() }.encode().to_vec(),
        ApiOp::OtaDistributionStatus => ActiveResponse { active: plugin.ota_distribution_active() }.encode().to_vec(),
        ApiOp::OtaDistributionProgress => ProgressResponse { progress: plugin.ota_distribution_progress() }.encode().to_vec(),
        ApiOp::OtaDistributionCancel => SuccessResponse { success: plugin.ota_distribution_cancel() }.encode().to_vec(),
        ApiOp::OtaReboot => match OtaRebootRequest::decode(payload) {
            Ok(req) => SuccessResponse { success: plugin.ota_reboot(req.timeout, req.delay) }.encode().to_vec(),
            Err(_) => SuccessResponse { success: false }.encode().to_vec(),
        },

        ApiOp::Error => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lyktparad_mesh::dispatch::InMemoryPluginRuntime;
    use lyktparad_mesh::LoopbackMesh;
    use lyktparad_proto::payload::ColorResponse;
    use tokio::net::UdpSocket as TestSocket;

    async fn listener() -> (ApiListener, SocketAddr) {
        let mesh: Arc<dyn MeshLayer> = Arc::new(LoopbackMesh::new([1; 6], [10, 0, 0, 1], 4));
        let plugin: Arc<dyn PluginRuntime> = Arc::new(InMemoryPluginRuntime::new("1.0.0"));
        let listener = ApiListener::bind("127.0.0.1".parse().unwrap(), 0, mesh, plugin, ChecksumPolicy::Strict)
            .await
            .unwrap();
        let addr = listener.local_addr().unwrap();
        (listener, addr)
    }

    #[tokio::test]
    async fn nodes_request_replies_on_same_seq() {
        let (listener, addr) = listener().await;
        let client = TestSocket::bind("127.0.0.1:0").await.unwrap();
        let frame = encode_frame(CommandId::Api(ApiOp::Nodes), Some(42), &[]).unwrap();
        client.send_to(&frame, addr).await.unwrap();

        let mut buf = [0u8; 64];
        let (n, from) = listener.socket.recv_from(&mut buf).await.unwrap();
        listener.handle_datagram(&buf[..n], from).await;

        let mut reply_buf = [0u8; 64];
        let (len, _) = client.recv_from(&mut reply_buf).await.unwrap();
        let reply = decode_frame(&reply_buf[..len], ChecksumPolicy::Strict).unwrap();
        assert_eq!(reply.command, CommandId::Api(ApiOp::Nodes));
        assert_eq!(reply.seq, Some(42));
        assert_eq!(NodesResponse::decode(reply.payload).unwrap(), NodesResponse { count: 4 });
    }

    #[tokio::test]
    async fn set_color_then_get_color_roundtrips() {
        let (listener, addr) = listener().await;
        let client = TestSocket::bind("127.0.0.1:0").await.unwrap();

        let set_frame = encode_frame(CommandId::Api(ApiOp::SetColor), Some(1), &SetColorRequest { r: 10, g: 20, b: 30 }.encode()).unwrap();
        client.send_to(&set_frame, addr).await.unwrap();
        let mut buf = [0u8; 64];
        let (n, from) = listener.socket.recv_from(&mut buf).await.unwrap();
        listener.handle_datagram(&buf[..n], from).await;
        let mut reply_buf = [0u8; 64];
        client.recv_from(&mut reply_buf).await.unwrap();

        let get_frame = encode_frame(CommandId::Api(ApiOp::GetColor), Some(2), &[]).unwrap();
        client.send_to(&get_frame, addr).await.unwrap();
        let (n, from) = listener.socket.recv_from(&mut buf).await.unwrap();
        listener.handle_datagram(&buf[..n], from).await;
        let (len, _) = client.recv_from(&mut reply_buf).await.unwrap();
        let reply = decode_frame(&reply_buf[..len], ChecksumPolicy::Strict).unwrap();
        assert_eq!(
            ColorResponse::decode(reply.payload).unwrap(),
            ColorResponse { r: 10, g: 20, b: 30, is_set: true }
        );
    }

    #[tokio::test]
    async fn unknown_api_op_replies_with_error_on_recovered_seq() {
        let (listener, addr) = listener().await;
        let client = TestSocket::bind("127.0.0.1:0").await.unwrap();
        // 0xF9 is in the SEQ-bearing range but not a known ApiOp.
        let mut raw = vec![0xF9u8];
        raw.extend_from_slice(&99u16.to_be_bytes());
        raw.extend_from_slice(&0u16.to_be_bytes()); // LEN = 0
        let checksum = lyktparad_proto::frame::checksum(&raw);
        raw.extend_from_slice(&checksum.to_be_bytes());
        client.send_to(&raw, addr).await.unwrap();

        let mut buf = [0u8; 64];
        let (n, from) = listener.socket.recv_from(&mut buf).await.unwrap();
        listener.handle_datagram(&buf[..n], from).await;

        let mut reply_buf = [0u8; 64];
        let (len, _) = client.recv_from(&mut reply_buf).await.unwrap();
        let reply = decode_frame(&reply_buf[..len], ChecksumPolicy::Strict).unwrap();
        assert_eq!(reply.command, CommandId::Api(ApiOp::Error));
        assert_eq!(reply.seq, Some(99));
    }
}
