// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Command id ranges (closed set, treated as a tagged union per the
//! "REDESIGN FLAGS" note about eliminating switch-case scatter).

/// Top-level command identifier carried in the first byte of every frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandId {
    /// `0xE0` — root registers itself with the coordinator. Carries SEQ,
    /// ACKed by [`CommandId::RegistrationAck`].
    Register,
    /// `0xE1` — fire-and-forget liveness beacon.
    Heartbeat,
    /// `0xE2` — fire-and-forget mesh state snapshot.
    StateUpdate,
    /// `0xE3` — coordinator's reply to [`CommandId::Register`].
    RegistrationAck,
    /// `0xE6` — fire-and-forget copy of a mesh command, for observability.
    MeshMirror,
    /// `0xE7`-`0xFF` — request/response RPC, dispatched further by [`ApiOp`].
    Api(ApiOp),
}

impl CommandId {
    /// Does this command id carry a SEQ field on the wire?
    ///
    /// `Register` is ACKed and carries SEQ; the RPC API range carries SEQ
    /// because a response is expected. Every other command is
    /// fire-and-forget and carries no SEQ.
    pub fn has_seq(self) -> bool {
        matches!(self, CommandId::Register | CommandId::Api(_))
    }

    /// Encode to the wire byte.
    pub fn to_byte(self) -> u8 {
        match self {
            CommandId::Register => 0xE0,
            CommandId::Heartbeat => 0xE1,
            CommandId::StateUpdate => 0xE2,
            CommandId::RegistrationAck => 0xE3,
            CommandId::MeshMirror => 0xE6,
            CommandId::Api(op) => op.to_byte(),
        }
    }

    /// Decode from the wire byte. Returns `None` for anything outside the
    /// closed set defined by the protocol (unknown command id).
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0xE0 => Some(CommandId::Register),
            0xE1 => Some(CommandId::Heartbeat),
            0xE2 => Some(CommandId::StateUpdate),
            0xE3 => Some(CommandId::RegistrationAck),
            0xE6 => Some(CommandId::MeshMirror),
            0xE7..=0xFF => ApiOp::from_byte(b).map(CommandId::Api),
            _ => None,
        }
    }

    /// Whether `b` falls in the SEQ-carrying ranges, without requiring a
    /// successful full decode. Used by the framing layer to know whether to
    /// expect a SEQ field before it has validated the rest of the packet.
    pub fn byte_has_seq(b: u8) -> bool {
        b == 0xE0 || (0xE7..=0xFF).contains(&b)
    }
}

/// RPC API operation, the command ids `0xE7`-`0xFF`.
///
/// This is the closed set backing the HTTP endpoint table the coordinator
/// exposes. `Error` (`0xFF`) is reserved so an unrecognized command arriving
/// on the RPC listener can still be answered on the same SEQ: rather than
/// inventing an out-of-band signal, the root replies using this op so the
/// framing stays uniform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ApiOp {
    /// `GET /api/nodes`
    Nodes = 0xE7,
    /// `GET /api/color`
    GetColor = 0xE8,
    /// `POST /api/color`
    SetColor = 0xE9,
    /// `POST /api/sequence`
    SequenceUpload = 0xEA,
    /// `GET /api/sequence/pointer`
    SequencePointer = 0xEB,
    /// `POST /api/sequence/start`
    SequenceStart = 0xEC,
    /// `POST /api/sequence/stop`
    SequenceStop = 0xED,
    /// `POST /api/sequence/reset`
    SequenceReset = 0xEE,
    /// `GET /api/sequence/status`
    SequenceStatus = 0xEF,
    /// `POST /api/ota/download`
    OtaDownload = 0xF0,
    /// `GET /api/ota/status`
    OtaStatus = 0xF1,
    /// `GET /api/ota/version`
    OtaVersion = 0xF2,
    /// `POST /api/ota/cancel`
    OtaCancel = 0xF3,
    /// `POST /api/ota/distribute`
    OtaDistribute = 0xF4,
    /// `GET /api/ota/distribution/status`
    OtaDistributionStatus = 0xF5,
    /// `GET /api/ota/distribution/progress`
    OtaDistributionProgress = 0xF6,
    /// `POST /api/ota/distribution/cancel`
    OtaDistributionCancel = 0xF7,
    /// `POST /api/ota/reboot`
    OtaReboot = 0xF8,
    /// Reserved: error-shaped response to an unknown or failed RPC.
    Error = 0xFF,
}

impl ApiOp {
    /// Encode to the wire byte.
    pub fn to_byte(self) -> u8 {
        self as u8
    }

    /// Decode from the wire byte. `0xF9..=0xFE` is reserved and currently
    /// unknown; it decodes to `None` so the listener can answer with
    /// [`ApiOp::Error`].
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0xE7 => Some(ApiOp::Nodes),
            0xE8 => Some(ApiOp::GetColor),
            0xE9 => Some(ApiOp::SetColor),
            0xEA => Some(ApiOp::SequenceUpload),
            0xEB => Some(ApiOp::SequencePointer),
            0xEC => Some(ApiOp::SequenceStart),
            0xED => Some(ApiOp::SequenceStop),
            0xEE => Some(ApiOp::SequenceReset),
            0xEF => Some(ApiOp::SequenceStatus),
            0xF0 => Some(ApiOp::OtaDownload),
            0xF1 => Some(ApiOp::OtaStatus),
            0xF2 => Some(ApiOp::OtaVersion),
            0xF3 => Some(ApiOp::OtaCancel),
            0xF4 => Some(ApiOp::OtaDistribute),
            0xF5 => Some(ApiOp::OtaDistributionStatus),
            0xF6 => Some(ApiOp::OtaDistributionProgress),
            0xF7 => Some(ApiOp::OtaDistributionCancel),
            0xF8 => Some(ApiOp::OtaReboot),
            0xFF => Some(ApiOp::Error),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_id_roundtrip() {
        let ids = [
            CommandId::Register,
            CommandId::Heartbeat,
            CommandId::StateUpdate,
            CommandId::RegistrationAck,
            CommandId::MeshMirror,
            CommandId::Api(ApiOp::Nodes),
            CommandId::Api(ApiOp::OtaReboot),
            CommandId::Api(ApiOp::Error),
        ];
        for id in ids {
            let byte = id.to_byte();
            assert_eq!(CommandId::from_byte(byte), Some(id));
        }
    }

    #[test]
    fn seq_presence_matches_command_table() {
        assert!(CommandId::Register.has_seq());
        assert!(!CommandId::Heartbeat.has_seq());
        assert!(!CommandId::StateUpdate.has_seq());
        assert!(!CommandId::RegistrationAck.has_seq());
        assert!(!CommandId::MeshMirror.has_seq());
        assert!(CommandId::Api(ApiOp::Nodes).has_seq());
    }

    #[test]
    fn unknown_command_byte_is_none() {
        assert_eq!(CommandId::from_byte(0x00), None);
        assert_eq!(CommandId::from_byte(0xE4), None);
        assert_eq!(CommandId::from_byte(0xE5), None);
    }

    #[test]
    fn unknown_api_op_in_range_is_none() {
        assert_eq!(ApiOp::from_byte(0xF9), None);
        assert_eq!(ApiOp::from_byte(0xFE), None);
    }

    #[test]
    fn byte_has_seq_matches_ranges() {
        assert!(CommandId::byte_has_seq(0xE0));
        assert!(!CommandId::byte_has_seq(0xE1));
        assert!(CommandId::byte_has_seq(0xE7));
        assert!(CommandId::byte_has_seq(0xFF));
        assert!(!CommandId::byte_has_seq(0xE6));
    }
}
