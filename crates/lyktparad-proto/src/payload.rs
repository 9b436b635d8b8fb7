// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Bit-exact payload schemas for every command.
//!
//! Each type here is a small wire struct with `encode`/`decode` methods — the
//! same separation `hdds-discovery-server` draws between its wire types
//! (`ParticipantInfoWire`) and the internal state they get converted to. No
//! `serde` on the wire side: these payloads are fixed binary layouts, not
//! JSON, so hand-rolled encode/decode is the honest representation of what's
//! actually on the wire.

use thiserror::Error;

/// Failure modes of payload decoding. Distinct from [`crate::FrameError`],
/// which only concerns the outer envelope; this is about what's inside it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PayloadError {
    /// Payload shorter than the type's minimum fixed-width prefix.
    #[error("payload too short: need at least {need} bytes, got {got}")]
    TooShort {
        /// Minimum bytes required.
        need: usize,
        /// Bytes actually present.
        got: usize,
    },
    /// A length-prefixed field's declared length runs past the buffer.
    #[error("declared field length {declared} exceeds remaining {remaining} bytes")]
    FieldTooLong {
        /// Length the payload claims.
        declared: usize,
        /// Bytes actually left to read.
        remaining: usize,
    },
    /// A length-prefixed UTF-8 field was not valid UTF-8.
    #[error("field is not valid UTF-8")]
    InvalidUtf8,
    /// Payload carried a byte pattern with no valid interpretation (e.g. an
    /// enum discriminant outside its known set).
    #[error("invalid value for {field}: {value}")]
    InvalidValue {
        /// Name of the offending field, for diagnostics.
        field: &'static str,
        /// The raw byte value that was rejected.
        value: u8,
    },
}

fn need(buf: &[u8], n: usize) -> Result<(), PayloadError> {
    if buf.len() < n {
        Err(PayloadError::TooShort { need: n, got: buf.len() })
    } else {
        Ok(())
    }
}

// ---------------------------------------------------------------------
// Register / RegistrationAck
// ---------------------------------------------------------------------

/// `0xE0` payload: root-ip(4) | mesh-id(6) | node-count(1) | ver-len(1) |
/// ver(<=31 utf-8) | timestamp(4 BE). 16-47 bytes total.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterPayload {
    /// Root's current IPv4 address.
    pub root_ip: [u8; 4],
    /// 6-byte opaque mesh identity.
    pub mesh_id: [u8; 6],
    /// Number of nodes in the mesh at registration time.
    pub node_count: u8,
    /// Firmware version string, at most 31 UTF-8 bytes.
    pub version: String,
    /// Wall-clock timestamp, seconds.
    pub timestamp: u32,
}

impl RegisterPayload {
    /// Maximum encoded length: 4 + 6 + 1 + 1 + 31 + 4.
    pub const MAX_LEN: usize = 47;

    /// Encode to the wire layout.
    pub fn encode(&self) -> Vec<u8> {
        let ver_bytes = self.version.as_bytes();
        debug_assert!(ver_bytes.len() <= 31, "firmware version must fit in 31 bytes");
        let mut buf = Vec::with_capacity(16 + ver_bytes.len());
        buf.extend_from_slice(&self.root_ip);
        buf.extend_from_slice(&self.mesh_id);
        buf.push(self.node_count);
        buf.push(ver_bytes.len() as u8);
        buf.extend_from_slice(ver_bytes);
        buf.extend_from_slice(&self.timestamp.to_be_bytes());
        buf
    }

    /// Decode from the wire layout.
    pub fn decode(buf: &[u8]) -> Result<Self, PayloadError> {
        need(buf, 12)?;
        let root_ip = [buf[0], buf[1], buf[2], buf[3]];
        let mesh_id = [buf[4], buf[5], buf[6], buf[7], buf[8], buf[9]];
        let node_count = buf[10];
        let ver_len = buf[11] as usize;
        let rest = &buf[12..];
        if rest.len() < ver_len + 4 {
            return Err(PayloadError::FieldTooLong {
                declared: ver_len,
                remaining: rest.len(),
            });
        }
        let version = std::str::from_utf8(&rest[..ver_len])
            .map_err(|_| PayloadError::InvalidUtf8)?
            .to_string();
        let ts_start = ver_len;
        let timestamp = u32::from_be_bytes([
            rest[ts_start],
            rest[ts_start + 1],
            rest[ts_start + 2],
            rest[ts_start + 3],
        ]);
        Ok(Self {
            root_ip,
            mesh_id,
            node_count,
            version,
            timestamp,
        })
    }
}

/// `0xE3` payload: a single status byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckStatus {
    /// Registration accepted; root may proceed to Registered.
    Accepted,
    /// Registration rejected; root stays Unregistered.
    Rejected,
}

impl AckStatus {
    /// Encode to the single wire byte.
    pub fn encode(self) -> [u8; 1] {
        match self {
            AckStatus::Accepted => [0],
            AckStatus::Rejected => [1],
        }
    }

    /// Decode from the wire byte.
    pub fn decode(buf: &[u8]) -> Result<Self, PayloadError> {
        need(buf, 1)?;
        match buf[0] {
            0 => Ok(AckStatus::Accepted),
            1 => Ok(AckStatus::Rejected),
            other => Err(PayloadError::InvalidValue {
                field: "ack_status",
                value: other,
            }),
        }
    }
}

// ---------------------------------------------------------------------
// Heartbeat
// ---------------------------------------------------------------------

/// `0xE1` payload: timestamp(4 BE), optional trailing node-count(1). Peer
/// MUST accept both the 4-byte and 5-byte form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeartbeatPayload {
    /// Wall-clock timestamp, seconds.
    pub timestamp: u32,
    /// Node count, if the sender included it.
    pub node_count: Option<u8>,
}

impl HeartbeatPayload {
    /// Encode to the wire layout, including the optional node count.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(5);
        buf.extend_from_slice(&self.timestamp.to_be_bytes());
        if let Some(n) = self.node_count {
            buf.push(n);
        }
        buf
    }

    /// Decode either the 4-byte or 5-byte form.
    pub fn decode(buf: &[u8]) -> Result<Self, PayloadError> {
        need(buf, 4)?;
        let timestamp = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]);
        let node_count = buf.get(4).copied();
        Ok(Self { timestamp, node_count })
    }
}

// ---------------------------------------------------------------------
// State update
// ---------------------------------------------------------------------

/// Role of a node as carried in a [`NodeEntry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeRole {
    /// Currently elected mesh root.
    Root,
    /// Intermediate relay node.
    Child,
    /// Terminal mesh node with no children.
    Leaf,
}

impl NodeRole {
    fn encode(self) -> u8 {
        match self {
            NodeRole::Root => 0,
            NodeRole::Child => 1,
            NodeRole::Leaf => 2,
        }
    }

    fn decode(b: u8) -> Result<Self, PayloadError> {
        match b {
            0 => Ok(NodeRole::Root),
            1 => Ok(NodeRole::Child),
            2 => Ok(NodeRole::Leaf),
            other => Err(PayloadError::InvalidValue {
                field: "node_role",
                value: other,
            }),
        }
    }
}

/// Connection status of a node as carried in a [`NodeEntry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeStatus {
    /// Node currently reachable through the mesh.
    Connected,
    /// Node has dropped out of the mesh.
    Disconnected,
}

impl NodeStatus {
    fn encode(self) -> u8 {
        match self {
            NodeStatus::Connected => 0,
            NodeStatus::Disconnected => 1,
        }
    }

    fn decode(b: u8) -> Result<Self, PayloadError> {
        match b {
            0 => Ok(NodeStatus::Connected),
            1 => Ok(NodeStatus::Disconnected),
            other => Err(PayloadError::InvalidValue {
                field: "node_status",
                value: other,
            }),
        }
    }
}

/// One row of the routing table inside a state update. Fixed 19-byte record:
/// node-id(6) | address(4) | layer(1) | parent-id(6) | role(1) | status(1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeEntry {
    /// 6-byte opaque node identity.
    pub node_id: [u8; 6],
    /// Node's current mesh-local IPv4 address.
    pub address: [u8; 4],
    /// Hop distance from the root, 0-6.
    pub layer: u8,
    /// 6-byte identity of this node's mesh parent.
    pub parent_id: [u8; 6],
    /// Role within the mesh.
    pub role: NodeRole,
    /// Current reachability.
    pub status: NodeStatus,
}

/// Size in bytes of one encoded [`NodeEntry`].
pub const NODE_ENTRY_LEN: usize = 19;

impl NodeEntry {
    fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.node_id);
        out.extend_from_slice(&self.address);
        out.push(self.layer);
        out.extend_from_slice(&self.parent_id);
        out.push(self.role.encode());
        out.push(self.status.encode());
    }

    fn decode(buf: &[u8]) -> Result<Self, PayloadError> {
        need(buf, NODE_ENTRY_LEN)?;
        Ok(Self {
            node_id: [buf[0], buf[1], buf[2], buf[3], buf[4], buf[5]],
            address: [buf[6], buf[7], buf[8], buf[9]],
            layer: buf[10],
            parent_id: [buf[11], buf[12], buf[13], buf[14], buf[15], buf[16]],
            role: NodeRole::decode(buf[17])?,
            status: NodeStatus::decode(buf[18])?,
        })
    }
}

/// `0xE2` payload: the full mesh state snapshot.
///
/// Wire layout: root-ip(4) | mesh-id(6) | timestamp(4) | mesh-state(1) |
/// node-count(1) | node-entry × N (19N) | seq-active(1) | seq-pos(2 BE) |
/// seq-total(2 BE) | ota-active(1) | ota-pct(1). 23 + 19N bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatePayload {
    /// Root's current IPv4 address.
    pub root_ip: [u8; 4],
    /// 6-byte opaque mesh identity.
    pub mesh_id: [u8; 6],
    /// Wall-clock timestamp, seconds.
    pub timestamp: u32,
    /// Whether the mesh is currently connected end to end.
    pub connected: bool,
    /// Routing table rows.
    pub nodes: Vec<NodeEntry>,
    /// Whether a lighting sequence is currently playing.
    pub sequence_active: bool,
    /// Current playback position within the sequence.
    pub sequence_position: u16,
    /// Total length of the current sequence.
    pub sequence_total: u16,
    /// Whether an OTA transfer is currently in progress.
    pub ota_active: bool,
    /// OTA progress, 0-100.
    pub ota_percent: u8,
}

impl StatePayload {
    /// Encode to the wire layout.
    pub fn encode(&self) -> Vec<u8> {
        debug_assert!(self.nodes.len() <= u8::MAX as usize, "node list must fit one byte count");
        let mut buf = Vec::with_capacity(23 + NODE_ENTRY_LEN * self.nodes.len());
        buf.extend_from_slice(&self.root_ip);
        buf.extend_from_slice(&self.mesh_id);
        buf.extend_from_slice(&self.timestamp.to_be_bytes());
        buf.push(self.connected as u8);
        buf.push(self.nodes.len() as u8);
        for node in &self.nodes {
            node.encode(&mut buf);
        }
        buf.push(self.sequence_active as u8);
        buf.extend_from_slice(&self.sequence_position.to_be_bytes());
        buf.extend_from_slice(&self.sequence_total.to_be_bytes());
        buf.push(self.ota_active as u8);
        buf.push(self.ota_percent);
        buf
    }

    /// Decode from the wire layout. Validates the declared node count
    /// against the remaining length before reading any entries.
    pub fn decode(buf: &[u8]) -> Result<Self, PayloadError> {
        need(buf, 16)?;
        let root_ip = [buf[0], buf[1], buf[2], buf[3]];
        let mesh_id = [buf[4], buf[5], buf[6], buf[7], buf[8], buf[9]];
        let timestamp = u32::from_be_bytes([buf[10], buf[11], buf[12], buf[13]]);
        let connected = buf[14] != 0;
        let node_count = buf[15] as usize;

        let nodes_region = &buf[16..];
        let nodes_bytes = node_count
            .checked_mul(NODE_ENTRY_LEN)
            .ok_or(PayloadError::FieldTooLong {
                declared: node_count,
                remaining: nodes_region.len(),
            })?;
        if nodes_region.len() < nodes_bytes + 6 {
            return Err(PayloadError::FieldTooLong {
                declared: node_count,
                remaining: nodes_region.len(),
            });
        }

        let mut nodes = Vec::with_capacity(node_count);
        for i in 0..node_count {
            let start = i * NODE_ENTRY_LEN;
            nodes.push(NodeEntry::decode(&nodes_region[start..start + NODE_ENTRY_LEN])?);
        }

        let tail = &nodes_region[nodes_bytes..];
        let sequence_active = tail[0] != 0;
        let sequence_position = u16::from_be_bytes([tail[1], tail[2]]);
        let sequence_total = u16::from_be_bytes([tail[3], tail[4]]);
        let ota_active = tail[5] != 0;
        let ota_percent = *tail.get(6).ok_or(PayloadError::TooShort { need: 7, got: tail.len() })?;

        Ok(Self {
            root_ip,
            mesh_id,
            timestamp,
            connected,
            nodes,
            sequence_active,
            sequence_position,
            sequence_total,
            ota_active,
            ota_percent,
        })
    }
}

// ---------------------------------------------------------------------
// Mesh mirror
// ---------------------------------------------------------------------

/// `0xE6` payload: mesh-cmd(1) | payload-len(2 BE) | mesh-payload(N) |
/// timestamp(4 BE).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorPayload {
    /// Inner mesh command id being mirrored.
    pub mesh_cmd: u8,
    /// Raw payload of the mirrored mesh command.
    pub mesh_payload: Vec<u8>,
    /// Wall-clock timestamp, seconds.
    pub timestamp: u32,
}

impl MirrorPayload {
    /// Encode to the wire layout.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(7 + self.mesh_payload.len());
        buf.push(self.mesh_cmd);
        buf.extend_from_slice(&(self.mesh_payload.len() as u16).to_be_bytes());
        buf.extend_from_slice(&self.mesh_payload);
        buf.extend_from_slice(&self.timestamp.to_be_bytes());
        buf
    }

    /// Decode from the wire layout.
    pub fn decode(buf: &[u8]) -> Result<Self, PayloadError> {
        need(buf, 3)?;
        let mesh_cmd = buf[0];
        let len = u16::from_be_bytes([buf[1], buf[2]]) as usize;
        let rest = &buf[3..];
        if rest.len() < len + 4 {
            return Err(PayloadError::FieldTooLong {
                declared: len,
                remaining: rest.len(),
            });
        }
        let mesh_payload = rest[..len].to_vec();
        let ts = &rest[len..len + 4];
        let timestamp = u32::from_be_bytes([ts[0], ts[1], ts[2], ts[3]]);
        Ok(Self {
            mesh_cmd,
            mesh_payload,
            timestamp,
        })
    }
}

// ---------------------------------------------------------------------
// RPC requests
// ---------------------------------------------------------------------

/// `POST /api/color` request body: R(1) | G(1) | B(1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetColorRequest {
    /// Red channel, 0-255.
    pub r: u8,
    /// Green channel, 0-255.
    pub g: u8,
    /// Blue channel, 0-255.
    pub b: u8,
}

impl SetColorRequest {
    /// Encode to the wire layout.
    pub fn encode(&self) -> [u8; 3] {
        [self.r, self.g, self.b]
    }

    /// Decode from the wire layout.
    pub fn decode(buf: &[u8]) -> Result<Self, PayloadError> {
        need(buf, 3)?;
        Ok(Self {
            r: buf[0],
            g: buf[1],
            b: buf[2],
        })
    }
}

/// `POST /api/ota/reboot` request body: timeout(2 BE) | delay(2 BE).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OtaRebootRequest {
    /// Reboot timeout in seconds.
    pub timeout: u16,
    /// Delay before reboot, in seconds.
    pub delay: u16,
}

impl OtaRebootRequest {
    /// Encode to the wire layout.
    pub fn encode(&self) -> [u8; 4] {
        let mut buf = [0u8; 4];
        buf[0..2].copy_from_slice(&self.timeout.to_be_bytes());
        buf[2..4].copy_from_slice(&self.delay.to_be_bytes());
        buf
    }

    /// Decode from the wire layout.
    pub fn decode(buf: &[u8]) -> Result<Self, PayloadError> {
        need(buf, 4)?;
        Ok(Self {
            timeout: u16::from_be_bytes([buf[0], buf[1]]),
            delay: u16::from_be_bytes([buf[2], buf[3]]),
        })
    }
}

/// `POST /api/sequence` request body: opaque caller-supplied bytes, passed
/// through unparsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceUploadRequest {
    /// Raw sequence blob, meaning owned entirely by the lighting runtime.
    pub blob: Vec<u8>,
}

impl SequenceUploadRequest {
    /// Encode to the wire layout (the blob, verbatim).
    pub fn encode(&self) -> &[u8] {
        &self.blob
    }

    /// Decode from the wire layout (accepts any byte string).
    pub fn decode(buf: &[u8]) -> Result<Self, PayloadError> {
        Ok(Self { blob: buf.to_vec() })
    }
}

/// `POST /api/ota/download` request body: len(1) | utf-8(len). Caller side
/// (the HTTP translator) enforces the 255-char ceiling from the endpoint
/// table before encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OtaDownloadRequest {
    /// URL the root should fetch the firmware image from.
    pub url: String,
}

impl OtaDownloadRequest {
    /// Encode to the wire layout.
    pub fn encode(&self) -> Vec<u8> {
        let bytes = self.url.as_bytes();
        debug_assert!(bytes.len() <= u8::MAX as usize, "url must fit in 255 bytes");
        let mut buf = Vec::with_capacity(1 + bytes.len());
        buf.push(bytes.len() as u8);
        buf.extend_from_slice(bytes);
        buf
    }

    /// Decode from the wire layout.
    pub fn decode(buf: &[u8]) -> Result<Self, PayloadError> {
        need(buf, 1)?;
        let len = buf[0] as usize;
        let rest = &buf[1..];
        if rest.len() < len {
            return Err(PayloadError::FieldTooLong {
                declared: len,
                remaining: rest.len(),
            });
        }
        let url = std::str::from_utf8(&rest[..len])
            .map_err(|_| PayloadError::InvalidUtf8)?
            .to_string();
        Ok(Self { url })
    }
}

// ---------------------------------------------------------------------
// RPC responses
// ---------------------------------------------------------------------

/// `GET /api/nodes` response. Decoder accepts either a 1-byte or 4-byte
/// (big-endian) count, per the dual-width requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodesResponse {
    /// Number of nodes currently in the mesh.
    pub count: u32,
}

impl NodesResponse {
    /// Encode using the narrow 1-byte form (what the root emits).
    pub fn encode_narrow(&self) -> [u8; 1] {
        [self.count as u8]
    }

    /// Decode either the narrow (1-byte) or wide (4-byte BE) form.
    pub fn decode(buf: &[u8]) -> Result<Self, PayloadError> {
        match buf.len() {
            1 => Ok(Self { count: buf[0] as u32 }),
            4 => Ok(Self {
                count: u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]),
            }),
            other => Err(PayloadError::TooShort { need: 1, got: other }),
        }
    }
}

/// `GET /api/color` response: R(1) | G(1) | B(1) | is_set(1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorResponse {
    /// Red channel.
    pub r: u8,
    /// Green channel.
    pub g: u8,
    /// Blue channel.
    pub b: u8,
    /// Whether a color has ever been explicitly set.
    pub is_set: bool,
}

impl ColorResponse {
    /// Encode to the wire layout.
    pub fn encode(&self) -> [u8; 4] {
        [self.r, self.g, self.b, self.is_set as u8]
    }

    /// Decode from the wire layout.
    pub fn decode(buf: &[u8]) -> Result<Self, PayloadError> {
        need(buf, 4)?;
        Ok(Self {
            r: buf[0],
            g: buf[1],
            b: buf[2],
            is_set: buf[3] != 0,
        })
    }
}

/// `GET /api/sequence/pointer` response. The HTTP translator renders this as
/// a bare numeric string, not JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequencePointerResponse {
    /// Current playback pointer.
    pub pointer: u16,
}

impl SequencePointerResponse {
    /// Encode using the wide 2-byte BE form, so a pointer past 255 frames
    /// doesn't silently truncate.
    pub fn encode(&self) -> [u8; 2] {
        self.pointer.to_be_bytes()
    }

    /// Decode either the narrow (1-byte) or wide (2-byte BE) form.
    pub fn decode(buf: &[u8]) -> Result<Self, PayloadError> {
        match buf.len() {
            1 => Ok(Self { pointer: buf[0] as u16 }),
            2 => Ok(Self {
                pointer: u16::from_be_bytes([buf[0], buf[1]]),
            }),
            other => Err(PayloadError::TooShort { need: 1, got: other }),
        }
    }
}

/// `GET /api/sequence/status` response: active(1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceStatusResponse {
    /// Whether a sequence is currently playing.
    pub active: bool,
}

impl SequenceStatusResponse {
    /// Encode to the single wire byte.
    pub fn encode(self) -> [u8; 1] {
        [self.active as u8]
    }

    /// Decode from the wire layout.
    pub fn decode(buf: &[u8]) -> Result<Self, PayloadError> {
        need(buf, 1)?;
        Ok(Self { active: buf[0] != 0 })
    }
}

/// `GET /api/ota/status` response. Decoder accepts progress as either a
/// big-endian `f32` in `[0,1]` or a single byte `0..100`; both normalize to
/// the same `[0,1]` float.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OtaStatusResponse {
    /// Whether a download is currently in progress.
    pub downloading: bool,
    /// Normalized progress in `[0,1]`.
    pub progress: f32,
}

impl OtaStatusResponse {
    /// Encode using the wide 5-byte form (active + `f32` BE), so fractional
    /// progress isn't rounded down to a whole percent.
    pub fn encode(&self) -> [u8; 5] {
        let mut buf = [0u8; 5];
        buf[0] = self.downloading as u8;
        buf[1..].copy_from_slice(&self.progress.to_be_bytes());
        buf
    }

    /// Decode either the narrow (2-byte: active + percent-as-byte) or wide
    /// (5-byte: active + f32 BE) form.
    pub fn decode(buf: &[u8]) -> Result<Self, PayloadError> {
        need(buf, 2)?;
        let downloading = buf[0] != 0;
        let progress = if buf.len() >= 5 {
            f32::from_be_bytes([buf[1], buf[2], buf[3], buf[4]])
        } else {
            buf[1] as f32 / 100.0
        };
        Ok(Self { downloading, progress })
    }
}

/// `GET /api/ota/version` response: len(1) | utf-8(len).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OtaVersionResponse {
    /// Firmware version string.
    pub version: String,
}

impl OtaVersionResponse {
    /// Encode to the wire layout.
    pub fn encode(&self) -> Vec<u8> {
        let bytes = self.version.as_bytes();
        debug_assert!(bytes.len() <= u8::MAX as usize);
        let mut buf = Vec::with_capacity(1 + bytes.len());
        buf.push(bytes.len() as u8);
        buf.extend_from_slice(bytes);
        buf
    }

    /// Decode from the wire layout.
    pub fn decode(buf: &[u8]) -> Result<Self, PayloadError> {
        need(buf, 1)?;
        let len = buf[0] as usize;
        let rest = &buf[1..];
        if rest.len() < len {
            return Err(PayloadError::FieldTooLong {
                declared: len,
                remaining: rest.len(),
            });
        }
        let version = std::str::from_utf8(&rest[..len])
            .map_err(|_| PayloadError::InvalidUtf8)?
            .to_string();
        Ok(Self { version })
    }
}

/// A single-value progress response with no accompanying "in progress" flag,
/// used by `/api/ota/distribution/progress`. Decoder accepts the same dual
/// width as [`OtaStatusResponse`]'s progress field and normalizes the same
/// way, but there is no leading active-flag byte here.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressResponse {
    /// Normalized progress in `[0,1]`.
    pub progress: f32,
}

impl ProgressResponse {
    /// Encode using the wide 4-byte BE `f32` form, already normalized to
    /// `[0,1]`.
    pub fn encode(&self) -> [u8; 4] {
        self.progress.to_be_bytes()
    }

    /// Decode either the narrow (1-byte, `0..100`) or wide (4-byte BE `f32`
    /// already in `[0,1]`) form.
    pub fn decode(buf: &[u8]) -> Result<Self, PayloadError> {
        match buf.len() {
            1 => Ok(Self {
                progress: buf[0] as f32 / 100.0,
            }),
            4 => Ok(Self {
                progress: f32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]),
            }),
            other => Err(PayloadError::TooShort { need: 1, got: other }),
        }
    }
}

/// Generic `{active: bool}` response shared by `/api/sequence/status` and
/// `/api/ota/distribution/status` — both are a single boolean byte on the
/// wire, and only differ in the JSON key the HTTP translator renders them
/// under.
pub type ActiveResponse = SequenceStatusResponse;

/// Generic `{success: bool}` response shared by most mutating endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SuccessResponse {
    /// Whether the root handler accepted and applied the request.
    pub success: bool,
}

impl SuccessResponse {
    /// Encode to the single wire byte.
    pub fn encode(self) -> [u8; 1] {
        [self.success as u8]
    }

    /// Decode from the single wire byte.
    pub fn decode(buf: &[u8]) -> Result<Self, PayloadError> {
        need(buf, 1)?;
        Ok(Self { success: buf[0] != 0 })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_payload_roundtrip() {
        let payload = RegisterPayload {
            root_ip: [192, 168, 1, 10],
            mesh_id: [0x12, 0x34, 0x56, 0x78, 0x9A, 0xBC],
            node_count: 5,
            version: "1.4.2".to_string(),
            timestamp: 1_700_000_000,
        };
        let encoded = payload.encode();
        assert!(encoded.len() <= RegisterPayload::MAX_LEN);
        let decoded = RegisterPayload::decode(&encoded).unwrap();
        assert_eq!(decoded, payload);
    }

    #[test]
    fn ack_status_roundtrip() {
        assert_eq!(AckStatus::decode(&AckStatus::Accepted.encode()).unwrap(), AckStatus::Accepted);
        assert_eq!(AckStatus::decode(&AckStatus::Rejected.encode()).unwrap(), AckStatus::Rejected);
        assert!(AckStatus::decode(&[2]).is_err());
    }

    #[test]
    fn heartbeat_accepts_both_widths() {
        let narrow = HeartbeatPayload {
            timestamp: 100,
            node_count: None,
        };
        let wide = HeartbeatPayload {
            timestamp: 100,
            node_count: Some(7),
        };
        assert_eq!(HeartbeatPayload::decode(&narrow.encode()).unwrap(), narrow);
        assert_eq!(HeartbeatPayload::decode(&wide.encode()).unwrap(), wide);
    }

    fn sample_node(n: u8) -> NodeEntry {
        NodeEntry {
            node_id: [n, n, n, n, n, n],
            address: [10, 0, 0, n],
            layer: n % 7,
            parent_id: [0, 0, 0, 0, 0, 0],
            role: if n == 0 { NodeRole::Root } else { NodeRole::Child },
            status: NodeStatus::Connected,
        }
    }

    #[test]
    fn state_payload_roundtrip_with_nodes() {
        let payload = StatePayload {
            root_ip: [10, 0, 0, 1],
            mesh_id: [1, 2, 3, 4, 5, 6],
            timestamp: 42,
            connected: true,
            nodes: vec![sample_node(0), sample_node(1), sample_node(2)],
            sequence_active: true,
            sequence_position: 12,
            sequence_total: 256,
            ota_active: false,
            ota_percent: 0,
        };
        let encoded = payload.encode();
        assert_eq!(encoded.len(), 23 + NODE_ENTRY_LEN * 3);
        let decoded = StatePayload::decode(&encoded).unwrap();
        assert_eq!(decoded, payload);
    }

    #[test]
    fn state_payload_rejects_node_count_overrun() {
        let payload = StatePayload {
            root_ip: [10, 0, 0, 1],
            mesh_id: [1, 2, 3, 4, 5, 6],
            timestamp: 1,
            connected: false,
            nodes: vec![sample_node(0)],
            sequence_active: false,
            sequence_position: 0,
            sequence_total: 0,
            ota_active: false,
            ota_percent: 0,
        };
        let mut encoded = payload.encode();
        // Claim two nodes while only one is actually present.
        encoded[15] = 2;
        let err = StatePayload::decode(&encoded).unwrap_err();
        assert!(matches!(err, PayloadError::FieldTooLong { .. }));
    }

    #[test]
    fn mirror_payload_roundtrip() {
        let payload = MirrorPayload {
            mesh_cmd: 0x03,
            mesh_payload: vec![0xFF, 0x00, 0x00],
            timestamp: 9000,
        };
        let encoded = payload.encode();
        let decoded = MirrorPayload::decode(&encoded).unwrap();
        assert_eq!(decoded, payload);
    }

    #[test]
    fn set_color_request_roundtrip() {
        let req = SetColorRequest { r: 255, g: 0, b: 0 };
        assert_eq!(SetColorRequest::decode(&req.encode()).unwrap(), req);
    }

    #[test]
    fn nodes_response_accepts_both_widths() {
        assert_eq!(NodesResponse::decode(&[5]).unwrap(), NodesResponse { count: 5 });
        assert_eq!(
            NodesResponse::decode(&[0, 0, 0, 5]).unwrap(),
            NodesResponse { count: 5 }
        );
    }

    #[test]
    fn sequence_pointer_accepts_both_widths() {
        assert_eq!(
            SequencePointerResponse::decode(&[7]).unwrap(),
            SequencePointerResponse { pointer: 7 }
        );
        assert_eq!(
            SequencePointerResponse::decode(&[0, 7]).unwrap(),
            SequencePointerResponse { pointer: 7 }
        );
    }

    #[test]
    fn ota_status_normalizes_both_widths_to_unit_range() {
        let narrow = OtaStatusResponse::decode(&[1, 50]).unwrap();
        assert!(narrow.downloading);
        assert!((narrow.progress - 0.5).abs() < f32::EPSILON);

        let mut wide_buf = vec![1u8];
        wide_buf.extend_from_slice(&0.5f32.to_be_bytes());
        let wide = OtaStatusResponse::decode(&wide_buf).unwrap();
        assert!(wide.downloading);
        assert!((wide.progress - 0.5).abs() < f32::EPSILON);
    }

    #[test]
    fn ota_version_roundtrip() {
        let resp = OtaVersionResponse {
            version: "2.1.0".to_string(),
        };
        let decoded = OtaVersionResponse::decode(&resp.encode()).unwrap();
        assert_eq!(decoded, resp);
    }

    #[test]
    fn success_response_roundtrip() {
        assert_eq!(
            SuccessResponse::decode(&SuccessResponse { success: true }.encode()).unwrap(),
            SuccessResponse { success: true }
        );
    }

    #[test]
    fn ota_download_request_roundtrip() {
        let req = OtaDownloadRequest {
            url: "http://10.0.0.5/fw.bin".to_string(),
        };
        let decoded = OtaDownloadRequest::decode(&req.encode()).unwrap();
        assert_eq!(decoded, req);
    }

    #[test]
    fn progress_response_normalizes_both_widths() {
        let narrow = ProgressResponse::decode(&[50]).unwrap();
        assert!((narrow.progress - 0.5).abs() < f32::EPSILON);
        let wide = ProgressResponse::decode(&0.75f32.to_be_bytes()).unwrap();
        assert!((wide.progress - 0.75).abs() < f32::EPSILON);
    }

    #[test]
    fn progress_response_encode_roundtrips_wide() {
        let resp = ProgressResponse { progress: 0.33 };
        let decoded = ProgressResponse::decode(&resp.encode()).unwrap();
        assert!((decoded.progress - resp.progress).abs() < f32::EPSILON);
    }

    #[test]
    fn sequence_pointer_encode_roundtrips_wide() {
        let resp = SequencePointerResponse { pointer: 900 };
        assert_eq!(SequencePointerResponse::decode(&resp.encode()).unwrap(), resp);
    }

    #[test]
    fn sequence_status_encode_roundtrips() {
        let resp = SequenceStatusResponse { active: true };
        assert_eq!(SequenceStatusResponse::decode(&resp.encode()).unwrap(), resp);
    }

    #[test]
    fn ota_status_encode_roundtrips_wide() {
        let resp = OtaStatusResponse { downloading: true, progress: 0.42 };
        let decoded = OtaStatusResponse::decode(&resp.encode()).unwrap();
        assert_eq!(decoded.downloading, resp.downloading);
        assert!((decoded.progress - resp.progress).abs() < f32::EPSILON);
    }
}
