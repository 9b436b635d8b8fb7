// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The registration engine: the ACKed handshake a root runs against a
//! freshly discovered (or cached) coordinator candidate.
//!
//! Three attempts, 5 s ACK timeout each, with 1 s / 2 s / 4 s backoff after
//! each failed attempt. Exhausting all three attempts without an `Accepted`
//! ack is reported as [`RegistrationOutcome::TimedOut`] so the discovery FSM
//! can fall back to `RetryBackoff` rather than treating this candidate as
//! permanently bad.

use std::net::SocketAddr;
use std::time::Duration;

use lyktparad_proto::payload::{AckStatus, RegisterPayload};
use tracing::{debug, info, warn};

use crate::outbound::OutboundLink;

/// Result of running the registration handshake against one candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationOutcome {
    /// The coordinator accepted this root.
    Accepted,
    /// The coordinator explicitly rejected this root.
    Rejected,
    /// No ack arrived within any of the three attempts.
    TimedOut,
}

/// Backoff applied after each of the three attempts, in order.
pub const DEFAULT_BACKOFFS: [Duration; 3] = [Duration::from_secs(1), Duration::from_secs(2), Duration::from_secs(4)];

/// Run the registration handshake against `dest`, retrying per `backoffs`
/// (one entry per attempt; production callers should pass
/// [`DEFAULT_BACKOFFS`]). `next_seq` supplies a fresh sequence number for
/// each attempt.
pub async fn register_with_retries(
    link: &OutboundLink,
    dest: SocketAddr,
    register: &RegisterPayload,
    ack_timeout: Duration,
    backoffs: &[Duration],
    mut next_seq: impl FnMut() -> u16,
) -> RegistrationOutcome {
    for (attempt, backoff) in backoffs.iter().enumerate() {
        let seq = next_seq();
        if let Err(e) = link.send_register(register, seq, dest).await {
            warn!("registration attempt {} to {dest} failed to send: {e}", attempt + 1);
        } else {
            debug!("registration attempt {} sent to {dest} (seq {seq})", attempt + 1);
        }

        match link.recv_ack(ack_timeout).await {
            Ok(Some(AckStatus::Accepted)) => {
                info!("registered with {dest} on attempt {}", attempt + 1);
                return RegistrationOutcome::Accepted;
            }
            Ok(Some(AckStatus::Rejected)) => {
                warn!("registration rejected by {dest} on attempt {}", attempt + 1);
                return RegistrationOutcome::Rejected;
            }
            Ok(None) => {
                debug!("no ack from {dest} on attempt {}, backing off {backoff:?}", attempt + 1);
            }
            Err(e) => {
                warn!("error waiting for ack from {dest}: {e}");
            }
        }
        if attempt + 1 < backoffs.len() {
            tokio::time::sleep(*backoff).await;
        }
    }
    warn!("registration with {dest} timed out after {} attempts", backoffs.len());
    RegistrationOutcome::TimedOut
}

#[cfg(test)]
mod tests {
    use super::*;
    use lyktparad_proto::command::CommandId;
    use lyktparad_proto::frame::{decode_frame, encode_frame, ChecksumPolicy};
    use std::sync::atomic::{AtomicU16, Ordering};
    use tokio::net::UdpSocket;

    fn sample_register() -> RegisterPayload {
        RegisterPayload {
            root_ip: [10, 0, 0, 5],
            mesh_id: [1, 2, 3, 4, 5, 6],
            node_count: 3,
            version: "1.0.0".to_string(),
            timestamp: 1000,
        }
    }

    #[tokio::test]
    async fn accepted_on_first_attempt() {
        let link = OutboundLink::bind("127.0.0.1".parse().unwrap(), ChecksumPolicy::Strict)
            .await
            .unwrap();
        let coordinator = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let coordinator_addr = coordinator.local_addr().unwrap();

        let responder = tokio::spawn(async move {
            let mut buf = [0u8; 128];
            let (len, from) = coordinator.recv_from(&mut buf).await.unwrap();
            let frame = decode_frame(&buf[..len], ChecksumPolicy::Strict).unwrap();
            assert_eq!(frame.command, CommandId::Register);
            let ack = encode_frame(CommandId::RegistrationAck, None, &AckStatus::Accepted.encode()).unwrap();
            coordinator.send_to(&ack, from).await.unwrap();
        });

        let seq = AtomicU16::new(1);
        let backoffs = [Duration::from_millis(10); 3];
        let outcome = register_with_retries(
            &link,
            coordinator_addr,
            &sample_register(),
            Duration::from_secs(1),
            &backoffs,
            || seq.fetch_add(1, Ordering::SeqCst),
        )
        .await;
        responder.await.unwrap();
        assert_eq!(outcome, RegistrationOutcome::Accepted);
    }

    #[tokio::test]
    async fn rejected_stops_retrying_immediately() {
        let link = OutboundLink::bind("127.0.0.1".parse().unwrap(), ChecksumPolicy::Strict)
            .await
            .unwrap();
        let coordinator = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let coordinator_addr = coordinator.local_addr().unwrap();

        let responder = tokio::spawn(async move {
            let mut buf = [0u8; 128];
            let (_len, from) = coordinator.recv_from(&mut buf).await.unwrap();
            let ack = encode_frame(CommandId::RegistrationAck, None, &AckStatus::Rejected.encode()).unwrap();
            coordinator.send_to(&ack, from).await.unwrap();
        });

        let seq = AtomicU16::new(1);
        let backoffs = [Duration::from_millis(10); 3];
        let outcome = register_with_retries(
            &link,
            coordinator_addr,
            &sample_register(),
            Duration::from_secs(1),
            &backoffs,
            || seq.fetch_add(1, Ordering::SeqCst),
        )
        .await;
        responder.await.unwrap();
        assert_eq!(outcome, RegistrationOutcome::Rejected);
    }

    #[tokio::test]
    async fn times_out_after_three_silent_attempts() {
        let link = OutboundLink::bind("127.0.0.1".parse().unwrap(), ChecksumPolicy::Strict)
            .await
            .unwrap();
        // Nothing is listening on this address: every attempt times out.
        let dest: SocketAddr = "127.0.0.1:1".parse().unwrap();

        let seq = AtomicU16::new(1);
        let backoffs = [Duration::from_millis(10); 3];
        let outcome = register_with_retries(
            &link,
            dest,
            &sample_register(),
            Duration::from_millis(20),
            &backoffs,
            || seq.fetch_add(1, Ordering::SeqCst),
        )
        .await;
        assert_eq!(outcome, RegistrationOutcome::TimedOut);
        assert_eq!(seq.load(Ordering::SeqCst), 4); // started at 1, incremented 3 times
    }
}
