// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Per-reason counters for frames the decoder refused.
//!
//! Mirrors the atomic-counter shape used for mesh/radio bridge statistics:
//! one `AtomicU64` per reason, relaxed ordering throughout since these are
//! cumulative observability counters, not synchronization primitives.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::frame::FrameError;

/// Cumulative counts of frames dropped by the decoder, broken out by reason.
#[derive(Debug, Default)]
pub struct DropCounters {
    too_short: AtomicU64,
    length_mismatch: AtomicU64,
    checksum_fail: AtomicU64,
    unknown_command: AtomicU64,
    too_large: AtomicU64,
}

impl DropCounters {
    /// Create a fresh, zeroed counter set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a decode failure against the matching counter.
    pub fn record(&self, err: &FrameError) {
        let counter = match err {
            FrameError::TooShort { .. } => &self.too_short,
            FrameError::LengthMismatch { .. } => &self.length_mismatch,
            FrameError::ChecksumMismatch { .. } => &self.checksum_fail,
            FrameError::UnknownCommand(_) => &self.unknown_command,
            FrameError::TooLarge { .. } => &self.too_large,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Frames dropped for being shorter than the fixed header + trailer.
    pub fn too_short(&self) -> u64 {
        self.too_short.load(Ordering::Relaxed)
    }

    /// Frames dropped for a `LEN` field disagreeing with the datagram size.
    pub fn length_mismatch(&self) -> u64 {
        self.length_mismatch.load(Ordering::Relaxed)
    }

    /// Frames dropped for a checksum mismatch under [`crate::ChecksumPolicy::Strict`].
    pub fn checksum_fail(&self) -> u64 {
        self.checksum_fail.load(Ordering::Relaxed)
    }

    /// Frames dropped for an unrecognized command byte.
    pub fn unknown_command(&self) -> u64 {
        self.unknown_command.load(Ordering::Relaxed)
    }

    /// Encode attempts refused for exceeding the packet size limit.
    pub fn too_large(&self) -> u64 {
        self.too_large.load(Ordering::Relaxed)
    }

    /// Sum of every reason, for a single "total drops" gauge.
    pub fn total(&self) -> u64 {
        self.too_short() + self.length_mismatch() + self.checksum_fail() + self.unknown_command() + self.too_large()
    }
}
