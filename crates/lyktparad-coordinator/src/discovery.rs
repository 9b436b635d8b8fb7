// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Discovery advertiser: mDNS service registration plus the broadcast
//! announcement fallback the root's `Broadcast` state listens for.

use std::sync::Arc;

use mdns_sd::{ServiceDaemon, ServiceInfo};
use serde::Serialize;
use tokio::net::UdpSocket;
use tokio::sync::Notify;
use tracing::{debug, info, warn};

use crate::config::CoordinatorConfig;

/// mDNS service type the root's discovery FSM queries for.
pub const SERVICE_TYPE: &str = "_lyktparad-web._tcp.local.";
/// Service name a broadcast announcement must carry to be accepted.
pub const BROADCAST_SERVICE_NAME: &str = "lyktparad-web";

/// Registers the coordinator's mDNS service for as long as it's held.
pub struct ServiceAdvertiser {
    daemon: ServiceDaemon,
    fullname: String,
}

impl ServiceAdvertiser {
    /// Register the mDNS service described by `config`.
    pub fn start(config: &CoordinatorConfig, hostname: &str) -> Result<Self, mdns_sd::Error> {
        let daemon = ServiceDaemon::new()?;
        let instance_name = "lyktparad-coordinator";
        let host_name = format!("{hostname}.local.");
        let properties = [
            ("version", config.advertised_version.as_str()),
            ("protocol", "udp"),
            ("udp_port", &config.udp_port.to_string()),
        ];
        let service = ServiceInfo::new(
            SERVICE_TYPE,
            instance_name,
            &host_name,
            "",
            config.http_port,
            &properties[..],
        )?
        .enable_addr_auto();
        let fullname = service.get_fullname().to_string();
        daemon.register(service)?;
        info!("advertising {SERVICE_TYPE} as {fullname}");
        Ok(Self { daemon, fullname })
    }

    /// Unregister the service, e.g. on shutdown.
    pub fn stop(&self) {
        if let Err(e) = self.daemon.unregister(&self.fullname) {
            warn!("failed to unregister mdns service: {e}");
        }
    }
}

/// Broadcast announcement payload, in the JSON shape a root's fallback
/// listener expects: `{service,port,udp_port,protocol,version}`.
#[derive(Debug, Clone, Serialize)]
pub struct BroadcastAnnouncement {
    /// Must equal [`BROADCAST_SERVICE_NAME`] for a root to accept it.
    pub service: String,
    /// HTTP ingress port.
    pub port: u16,
    /// Datagram ingress port.
    pub udp_port: u16,
    /// Always `"udp"`.
    pub protocol: String,
    /// Advertised coordinator version.
    pub version: String,
}

impl BroadcastAnnouncement {
    /// Build the announcement this coordinator should emit.
    pub fn for_config(config: &CoordinatorConfig) -> Self {
        Self {
            service: BROADCAST_SERVICE_NAME.to_string(),
            port: config.http_port,
            udp_port: config.udp_port,
            protocol: "udp".to_string(),
            version: config.advertised_version.clone(),
        }
    }

    /// Serialize to the UTF-8 JSON wire form.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).expect("announcement contains only plain strings and integers")
    }
}

/// Periodically emits [`BroadcastAnnouncement`] on the broadcast port, for
/// roots that fell through mDNS to the `Broadcast` discovery state.
pub async fn run_broadcast_emitter(config: Arc<CoordinatorConfig>, shutdown: Arc<Notify>) {
    let socket = match UdpSocket::bind(("0.0.0.0", 0)).await {
        Ok(s) => s,
        Err(e) => {
            warn!("broadcast emitter could not bind a socket: {e}");
            return;
        }
    };
    if let Err(e) = socket.set_broadcast(true) {
        warn!("broadcast emitter could not enable broadcast: {e}");
        return;
    }

    let announcement = BroadcastAnnouncement::for_config(&config);
    let payload = announcement.to_json();
    let dest = ("255.255.255.255", config.broadcast_port);

    let mut interval = tokio::time::interval(std::time::Duration::from_secs(5));
    loop {
        tokio::select! {
            _ = interval.tick() => {
                if let Err(e) = socket.send_to(payload.as_bytes(), dest).await {
                    debug!("broadcast announcement send failed: {e}");
                }
            }
            _ = shutdown.notified() => {
                debug!("broadcast emitter shutting down");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn announcement_json_matches_expected_shape() {
        let config = CoordinatorConfig::default();
        let announcement = BroadcastAnnouncement::for_config(&config);
        let json: serde_json::Value = serde_json::from_str(&announcement.to_json()).unwrap();
        assert_eq!(json["service"], "lyktparad-web");
        assert_eq!(json["protocol"], "udp");
        assert_eq!(json["udp_port"], config.udp_port);
        assert_eq!(json["port"], config.http_port);
    }
}
