// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Wire protocol for the lyktparad mesh<->coordinator bridge.
//!
//! This crate owns the one thing both peers must agree on bit-for-bit: the
//! datagram framing (command id, length, optional sequence number, checksum)
//! and the payload layouts carried inside it. Nothing here talks to a socket;
//! callers own the transport.

#![warn(missing_docs)]

/// Command id ranges, the tagged-union `CommandId`, and `ApiOp`.
pub mod command;
/// Outer datagram framing: encode/decode, checksum, MTU enforcement.
pub mod frame;
/// Per-reason drop counters for the decoder.
pub mod drops;
/// Bit-exact payload schemas for every command.
pub mod payload;

pub use command::{ApiOp, CommandId};
pub use drops::DropCounters;
pub use frame::{ChecksumPolicy, DecodedFrame, FrameError};

/// Maximum packet size in bytes, chosen to fit one unfragmented datagram over
/// typical Ethernet.
pub const MAX_PACKET_SIZE: usize = 1472;
