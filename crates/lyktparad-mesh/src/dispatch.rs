// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The boundary between the bridge and the lighting/plugin runtime.
//!
//! Sequence playback, effect rendering, and OTA image handling all happen
//! below this crate, driven by a small command dispatch table keyed by
//! request kind rather than a switch-case. The bridge's RPC handlers call
//! into this trait; they never reach past it into the runtime itself.

use std::sync::{Mutex, RwLock};

/// Current lighting color, as last set (or its power-on default).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorState {
    /// Red channel.
    pub r: u8,
    /// Green channel.
    pub g: u8,
    /// Blue channel.
    pub b: u8,
    /// Whether a color has ever been explicitly set.
    pub is_set: bool,
}

/// Progress of an in-flight OTA transfer, either download-to-root or
/// distribution-to-mesh.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OtaProgress {
    /// Whether a transfer is currently in flight.
    pub active: bool,
    /// Fraction complete, `0.0..=1.0`.
    pub fraction: f32,
}

/// The lighting/plugin runtime's command dispatch surface, as seen by the
/// bridge's RPC handlers.
///
/// Every method returns quickly: long-running work (a sequence upload parse,
/// an OTA transfer) is handed off internally and polled via the `*_status`
/// methods, mirroring how the RPC layer above never blocks a handler on mesh
/// completion.
pub trait PluginRuntime: Send + Sync {
    /// Current lighting color.
    fn get_color(&self) -> ColorState;
    /// Set the lighting color. Returns whether the runtime accepted it.
    fn set_color(&self, r: u8, g: u8, b: u8) -> bool;

    /// Accept a new sequence blob for upload. Returns whether it parsed.
    fn sequence_upload(&self, blob: &[u8]) -> bool;
    /// Start sequence playback from the current pointer.
    fn sequence_start(&self) -> bool;
    /// Halt sequence playback, leaving the pointer where it stopped.
    fn sequence_stop(&self) -> bool;
    /// Reset the sequence pointer to the beginning.
    fn sequence_reset(&self) -> bool;
    /// Current sequence playback pointer (frame index).
    fn sequence_pointer(&self) -> u16;
    /// Whether a sequence is currently playing.
    fn sequence_active(&self) -> bool;

    /// Begin downloading a firmware image from `url` to the root. Returns
    /// whether the request was accepted.
    fn ota_download(&self, url: &str) -> bool;
    /// Progress of the root's own OTA download.
    fn ota_status(&self) -> OtaProgress;
    /// Firmware version string currently running.
    fn ota_version(&self) -> String;
    /// Cancel an in-flight OTA download. Returns whether one was cancelled.
    fn ota_cancel(&self) -> bool;
    /// Begin distributing the downloaded image to the rest of the mesh.
    fn ota_distribute(&self) -> bool;
    /// Whether a mesh-wide OTA distribution is in flight.
    fn ota_distribution_active(&self) -> bool;
    /// Progress of the mesh-wide OTA distribution.
    fn ota_distribution_progress(&self) -> f32;
    /// Cancel an in-flight mesh-wide distribution.
    fn ota_distribution_cancel(&self) -> bool;
    /// Reboot the mesh into the newly distributed image after `delay_secs`,
    /// aborting if it hasn't rebooted within `timeout_secs`.
    fn ota_reboot(&self, timeout_secs: u16, delay_secs: u16) -> bool;
}

/// An in-memory [`PluginRuntime`] for exercising the bridge without a real
/// lighting stack.
pub struct InMemoryPluginRuntime {
    color: RwLock<ColorState>,
    sequence: Mutex<SequenceState>,
    ota: Mutex<OtaState>,
    version: RwLock<String>,
}

struct SequenceState {
    uploaded: bool,
    active: bool,
    pointer: u16,
}

struct OtaState {
    download: OtaProgress,
    distribution: OtaProgress,
}

impl InMemoryPluginRuntime {
    /// Create a runtime reporting `version` with no color, sequence, or OTA
    /// state set yet.
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            color: RwLock::new(ColorState { r: 0, g: 0, b: 0, is_set: false }),
            sequence: Mutex::new(SequenceState { uploaded: false, active: false, pointer: 0 }),
            ota: Mutex::new(OtaState {
                download: OtaProgress { active: false, fraction: 0.0 },
                distribution: OtaProgress { active: false, fraction: 0.0 },
            }),
            version: RwLock::new(version.into()),
        }
    }

    /// Directly set the reported download/distribution progress, for tests
    /// simulating a transfer in flight.
    pub fn set_ota_progress(&self, download: OtaProgress, distribution: OtaProgress) {
        let mut ota = self.ota.lock().expect("ota mutex poisoned");
        ota.download = download;
        ota.distribution = distribution;
    }
}

impl PluginRuntime for InMemoryPluginRuntime {
    fn get_color(&self) -> ColorState {
        *self.color.read().expect("color rwlock poisoned")
    }

    fn set_color(&self, r: u8, g: u8, b: u8) -> bool {
        *self.color.write().expect("color rwlock poisoned") = ColorState { r, g, b, is_set: true };
        true
    }

    fn sequence_upload(&self, blob: &[u8]) -> bool {
        if blob.is_empty() {
            return false;
        }
        let mut seq = self.sequence.lock().expect("sequence mutex poisoned");
        seq.uploaded = true;
        seq.pointer = 0;
        true
    }

    fn sequence_start(&self) -> bool {
        let mut seq = self.sequence.lock().expect("sequence mutex poisoned");
        if !seq.uploaded {
            return false;
        }
        seq.active = true;
        true
    }

    fn sequence_stop(&self) -> bool {
        let mut seq = self.sequence.lock().expect("sequence mutex poisoned");
        seq.active = false;
        true
    }

    fn sequence_reset(&self) -> bool {
        let mut seq = self.sequence.lock().expect("sequence mutex poisoned");
        seq.pointer = 0;
        seq.active = false;
        true
    }

    fn sequence_pointer(&self) -> u16 {
        self.sequence.lock().expect("sequence mutex poisoned").pointer
    }

    fn sequence_active(&self) -> bool {
        self.sequence.lock().expect("sequence mutex poisoned").active
    }

    fn ota_download(&self, url: &str) -> bool {
        if url.is_empty() {
            return false;
        }
        let mut ota = self.ota.lock().expect("ota mutex poisoned");
        ota.download = OtaProgress { active: true, fraction: 0.0 };
        true
    }

    fn ota_status(&self) -> OtaProgress {
        self.ota.lock().expect("ota mutex poisoned").download
    }

    fn ota_version(&self) -> String {
        self.version.read().expect("version rwlock poisoned").clone()
    }

    fn ota_cancel(&self) -> bool {
        let mut ota = self.ota.lock().expect("ota mutex poisoned");
        let was_active = ota.download.active;
        ota.download = OtaProgress { active: false, fraction: 0.0 };
        was_active
    }

    fn ota_distribute(&self) -> bool {
        let mut ota = self.ota.lock().expect("ota mutex poisoned");
        ota.distribution = OtaProgress { active: true, fraction: 0.0 };
        true
    }

    fn ota_distribution_active(&self) -> bool {
        self.ota.lock().expect("ota mutex poisoned").distribution.active
    }

    fn ota_distribution_progress(&self) -> f32 {
        self.ota.lock().expect("ota mutex poisoned").distribution.fraction
    }

    fn ota_distribution_cancel(&self) -> bool {
        let mut ota = self.ota.lock().expect("ota mutex poisoned");
        let was_active = ota.distribution.active;
        ota.distribution = OtaProgress { active: false, fraction: 0.0 };
        was_active
    }

    fn ota_reboot(&self, _timeout_secs: u16, _delay_secs: u16) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn color_defaults_unset_then_roundtrips() {
        let rt = InMemoryPluginRuntime::new("1.0.0");
        assert!(!rt.get_color().is_set);
        assert!(rt.set_color(10, 20, 30));
        let c = rt.get_color();
        assert_eq!((c.r, c.g, c.b, c.is_set), (10, 20, 30, true));
    }

    #[test]
    fn sequence_cannot_start_before_upload() {
        let rt = InMemoryPluginRuntime::new("1.0.0");
        assert!(!rt.sequence_start());
        assert!(rt.sequence_upload(&[1, 2, 3]));
        assert!(rt.sequence_start());
        assert!(rt.sequence_active());
        assert!(rt.sequence_stop());
        assert!(!rt.sequence_active());
    }

    #[test]
    fn sequence_upload_rejects_empty_blob() {
        let rt = InMemoryPluginRuntime::new("1.0.0");
        assert!(!rt.sequence_upload(&[]));
    }

    #[test]
    fn ota_download_and_cancel() {
        let rt = InMemoryPluginRuntime::new("1.0.0");
        assert!(rt.ota_download("http://example.invalid/fw.bin"));
        assert!(rt.ota_status().active);
        assert!(rt.ota_cancel());
        assert!(!rt.ota_status().active);
        assert!(!rt.ota_cancel());
    }

    #[test]
    fn ota_distribution_tracks_independently_of_download() {
        let rt = InMemoryPluginRuntime::new("1.0.0");
        assert!(rt.ota_download("http://example.invalid/fw.bin"));
        assert!(rt.ota_distribute());
        assert!(rt.ota_status().active);
        assert!(rt.ota_distribution_active());
        assert!(rt.ota_cancel());
        assert!(!rt.ota_status().active);
        assert!(rt.ota_distribution_active());
    }

    #[test]
    fn ota_version_reports_configured_string() {
        let rt = InMemoryPluginRuntime::new("2.3.4");
        assert_eq!(rt.ota_version(), "2.3.4");
    }
}
