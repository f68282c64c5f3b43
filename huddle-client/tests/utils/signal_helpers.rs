use anyhow::{Result, bail};
use huddle_client::SignalingOrchestrator;
use huddle_core::model::{Client, IncomingEvent, OutgoingEvent, SessionDescription};
use serde_json::json;
use std::time::{Duration, Instant};

use super::callback_recorder::{CallbackEvent, CallbackRecorder};
use super::mock_engine::{MOCK_ANSWER_SDP, MOCK_OFFER_SDP};
use super::mock_signaling::MockConnector;

/// Timeout for signaling round trips through the event loop (ms).
pub const SIGNAL_TIMEOUT_MS: u64 = 2000;

/// How long to wait before concluding that something did not happen (ms).
pub const QUIET_PERIOD_MS: u64 = 150;

pub fn client(id: &str) -> Client {
    Client::new(id, id.to_uppercase(), json!({"tag": id}))
}

pub fn remote_offer() -> SessionDescription {
    SessionDescription {
        kind: huddle_core::model::SdpType::Offer,
        sdp: MOCK_OFFER_SDP.to_owned(),
    }
}

pub fn remote_answer() -> SessionDescription {
    SessionDescription {
        kind: huddle_core::model::SdpType::Answer,
        sdp: MOCK_ANSWER_SDP.to_owned(),
    }
}

/// Poll `condition` every 10ms until it holds or the timeout expires.
pub async fn wait_until(condition: impl Fn() -> bool, timeout_ms: u64) -> bool {
    let start = Instant::now();
    let timeout = Duration::from_millis(timeout_ms);

    loop {
        if condition() {
            return true;
        }
        if start.elapsed() > timeout {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Let the event loop drain whatever is queued.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(QUIET_PERIOD_MS)).await;
}

/// Connect, answer the `join-room` request as `local_id` and wait for the
/// connection-opened callback.
pub async fn join_room(
    orchestrator: &SignalingOrchestrator,
    connector: &MockConnector,
    recorder: &CallbackRecorder,
    local_id: &str,
    roster: &[&str],
) -> Result<()> {
    orchestrator.connect();

    let join_sent = wait_until(|| !connector.sent_named("join-room").is_empty(), SIGNAL_TIMEOUT_MS).await;
    if !join_sent {
        bail!("join-room was never sent");
    }

    connector.deliver_message(IncomingEvent::JoinRoom {
        is_joined: true,
        id: local_id.to_owned(),
        clients: Some(roster.iter().map(|id| client(id)).collect()),
    });

    if !recorder.wait_for(&CallbackEvent::Opened, SIGNAL_TIMEOUT_MS).await {
        bail!("connection-opened callback never fired");
    }
    Ok(())
}

/// Wait until a `call-peer` to `peer_id` has been sent.
pub async fn wait_for_call_peer(connector: &MockConnector, peer_id: &str) -> Result<SessionDescription> {
    let start = Instant::now();
    let timeout = Duration::from_millis(SIGNAL_TIMEOUT_MS);

    loop {
        let offer = connector.sent().into_iter().find_map(|e| match e {
            OutgoingEvent::CallPeer { to_id, offer } if to_id == peer_id => Some(offer),
            _ => None,
        });
        if let Some(offer) = offer {
            return Ok(offer);
        }
        if start.elapsed() > timeout {
            bail!("Timeout waiting for call-peer to {peer_id}");
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
