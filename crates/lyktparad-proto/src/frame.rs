// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Outer datagram framing.
//!
//! Layout, all integers big-endian:
//!
//! ```text
//! CMD(1) | LEN(2) | [SEQ(2) iff CMD carries one] | PAYLOAD(LEN) | CHKSUM(2)
//! ```
//!
//! `LEN` covers the payload only (not CMD/SEQ/CHKSUM). `CHKSUM` is a 16-bit
//! wrapping sum over every byte that precedes it.

use crate::command::CommandId;

/// How the decoder reacts to a checksum mismatch.
///
/// Dropping the frame is the baseline, but some deployments want to see why
/// a corrupt frame arrived at all. `LogAndContinue` is the escape hatch:
/// decode anyway and let the caller decide, counting the mismatch either
/// way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChecksumPolicy {
    /// Reject frames whose checksum does not match (default).
    #[default]
    Strict,
    /// Decode past a checksum mismatch, so the caller can log the payload.
    LogAndContinue,
}

/// A successfully decoded frame, borrowing its payload from the input slice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedFrame<'a> {
    /// Which command this frame carries.
    pub command: CommandId,
    /// Sequence number, present iff `command.has_seq()`.
    pub seq: Option<u16>,
    /// Raw payload bytes, exactly `LEN` long.
    pub payload: &'a [u8],
    /// Set when the checksum did not match but [`ChecksumPolicy::LogAndContinue`]
    /// let decoding proceed anyway.
    pub checksum_mismatch: bool,
}

/// Failure modes of [`decode_frame`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    /// Fewer bytes than the minimum fixed header + checksum trailer.
    #[error("frame too short: {len} bytes")]
    TooShort {
        /// Bytes actually received.
        len: usize,
    },
    /// Declared `LEN` does not match the bytes actually present.
    #[error("length mismatch: header says {declared}, frame has {actual} remaining")]
    LengthMismatch {
        /// `LEN` field value.
        declared: usize,
        /// Bytes remaining in the datagram after the fixed header.
        actual: usize,
    },
    /// Checksum did not match and the policy was [`ChecksumPolicy::Strict`].
    #[error("checksum mismatch: expected {expected:#06x}, computed {computed:#06x}")]
    ChecksumMismatch {
        /// Checksum carried on the wire.
        expected: u16,
        /// Checksum computed over the received bytes.
        computed: u16,
    },
    /// First byte did not match any known command id.
    #[error("unknown command byte {0:#04x}")]
    UnknownCommand(u8),
    /// Encoding input would not fit in [`crate::MAX_PACKET_SIZE`].
    #[error("payload of {len} bytes exceeds the {max} byte packet limit")]
    TooLarge {
        /// Payload length requested.
        len: usize,
        /// The limit that was exceeded.
        max: usize,
    },
}

const FIXED_HEADER_LEN: usize = 1 + 2; // CMD + LEN
const CHECKSUM_LEN: usize = 2;
const SEQ_LEN: usize = 2;

/// Compute the 16-bit wrapping checksum over `bytes`.
///
/// Sums the buffer two bytes at a time as big-endian `u16`s, wrapping on
/// overflow, matching the fixed-width accumulator a lighting-node MCU can
/// compute without a software bignum.
pub fn checksum(bytes: &[u8]) -> u16 {
    let mut sum: u16 = 0;
    let mut chunks = bytes.chunks_exact(2);
    for chunk in &mut chunks {
        let word = u16::from_be_bytes([chunk[0], chunk[1]]);
        sum = sum.wrapping_add(word);
    }
    if let [last] = chunks.remainder() {
        sum = sum.wrapping_add(u16::from_be_bytes([*last, 0]));
    }
    sum
}

/// Encode `command` (and `seq`, if the command carries one) plus `payload`
/// into a single datagram ready to send.
///
/// Returns [`FrameError::TooLarge`] if the assembled frame would exceed
/// [`crate::MAX_PACKET_SIZE`]. Panics (via `debug_assert`) if `seq.is_some()`
/// disagrees with `command.has_seq()` — that is a caller bug, not a wire
/// condition.
pub fn encode_frame(command: CommandId, seq: Option<u16>, payload: &[u8]) -> Result<Vec<u8>, FrameError> {
    debug_assert_eq!(seq.is_some(), command.has_seq(), "seq presence must match command");

    let seq_len = if command.has_seq() { SEQ_LEN } else { 0 };
    let total = FIXED_HEADER_LEN + seq_len + payload.len() + CHECKSUM_LEN;
    if total > crate::MAX_PACKET_SIZE {
        return Err(FrameError::TooLarge {
            len: total,
            max: crate::MAX_PACKET_SIZE,
        });
    }

    let mut buf = Vec::with_capacity(total);
    buf.push(command.to_byte());
    buf.extend_from_slice(&(payload.len() as u16).to_be_bytes());
    if let Some(s) = seq {
        buf.extend_from_slice(&s.to_be_bytes());
    }
    buf.extend_from_slice(payload);
    let sum = checksum(&buf);
    buf.extend_from_slice(&sum.to_be_bytes());
    Ok(buf)
}

/// Recover the SEQ field from a datagram whose command byte didn't decode
/// (e.g. a reserved `ApiOp` in `0xF9..=0xFE`), so a caller that must reply on
/// the same SEQ — per the RPC listener's "unknown commands MUST reply with
/// an error-shaped response on the same SEQ" requirement — can still find it
/// after [`decode_frame`] has already returned [`FrameError::UnknownCommand`].
///
/// Returns `None` if the byte doesn't fall in a SEQ-carrying range, or the
/// datagram is too short to contain one.
pub fn recover_seq(bytes: &[u8]) -> Option<u16> {
    if bytes.is_empty() || !CommandId::byte_has_seq(bytes[0]) {
        return None;
    }
    if bytes.len() < FIXED_HEADER_LEN + SEQ_LEN {
        return None;
    }
    Some(u16::from_be_bytes([bytes[3], bytes[4]]))
}

/// Decode a raw datagram into a [`DecodedFrame`], per `policy`.
pub fn decode_frame(bytes: &[u8], policy: ChecksumPolicy) -> Result<DecodedFrame<'_>, FrameError> {
    if bytes.len() < FIXED_HEADER_LEN + CHECKSUM_LEN {
        return Err(FrameError::TooShort { len: bytes.len() });
    }

    let cmd_byte = bytes[0];
    let command = CommandId::from_byte(cmd_byte).ok_or(FrameError::UnknownCommand(cmd_byte))?;
    let declared_len = u16::from_be_bytes([bytes[1], bytes[2]]) as usize;

    let seq_len = if command.has_seq() { SEQ_LEN } else { 0 };
    let body_start = FIXED_HEADER_LEN + seq_len;
    let expected_total = body_start + declared_len + CHECKSUM_LEN;
    if expected_total != bytes.len() {
        return Err(FrameError::LengthMismatch {
            declared: declared_len,
            actual: bytes.len().saturating_sub(body_start + CHECKSUM_LEN),
        });
    }

    let checksummed_region = &bytes[..bytes.len() - CHECKSUM_LEN];
    let computed = checksum(checksummed_region);
    let expected = u16::from_be_bytes([bytes[bytes.len() - 2], bytes[bytes.len() - 1]]);
    let mut checksum_mismatch = false;
    if computed != expected {
        match policy {
            ChecksumPolicy::Strict => {
                return Err(FrameError::ChecksumMismatch { expected, computed });
            }
            ChecksumPolicy::LogAndContinue => checksum_mismatch = true,
        }
    }

    let seq = if command.has_seq() {
        Some(u16::from_be_bytes([bytes[3], bytes[4]]))
    } else {
        None
    };
    let payload = &bytes[body_start..body_start + declared_len];

    Ok(DecodedFrame {
        command,
        seq,
        payload,
        checksum_mismatch,
    })
}
