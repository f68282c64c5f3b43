use huddle_client::PeerConnectionState;
use huddle_core::model::{IceCandidate, IncomingEvent, OutgoingEvent};

use crate::integration::{TestRoom, create_joined_room, init_tracing};
use crate::utils::{
    CallbackEvent, SIGNAL_TIMEOUT_MS, remote_answer, settle, wait_for_call_peer, wait_until,
};

/// Call `peer` and drive the mock session to Connected.
async fn connect_peer(room: &TestRoom, peer: &str) {
    room.orchestrator.call_ids(&[peer]).expect("call_ids failed");
    wait_for_call_peer(&room.connector, peer)
        .await
        .expect("no call-peer");
    room.connector.deliver_message(IncomingEvent::MakePeerCallAnswer {
        from_id: peer.into(),
        answer: remote_answer(),
    });
    room.engine
        .latest(peer)
        .expect("session")
        .set_state(PeerConnectionState::Connected);
    assert!(
        room.recorder
            .wait_for(&CallbackEvent::Connected(peer.into()), SIGNAL_TIMEOUT_MS)
            .await
    );
}

#[tokio::test]
async fn test_disconnect_fires_once() {
    init_tracing();

    let room = create_joined_room("a", &["a", "b"]).await;
    connect_peer(&room, "b").await;
    let session = room.engine.latest("b").expect("session for b");

    session.set_state(PeerConnectionState::Disconnected);
    assert!(
        room.recorder
            .wait_for(&CallbackEvent::Disconnected("b".into()), SIGNAL_TIMEOUT_MS)
            .await
    );

    // The session is gone; nothing it reports later is delivered.
    assert!(!session.set_state(PeerConnectionState::Failed));
    room.orchestrator.hang_up_all();
    room.orchestrator.close_sync();
    settle().await;

    assert!(session.is_closed());
    assert_eq!(room.recorder.count(&CallbackEvent::Disconnected("b".into())), 1);
    assert!(!room.orchestrator.is_rtc_connected());
    let clients = room.recorder.last_room_clients().expect("room clients update");
    assert!(clients.iter().all(|c| c.id != "b" || !c.is_connected));
}

#[tokio::test]
async fn test_hang_up_mid_negotiation_reports_disconnect() {
    init_tracing();

    let room = create_joined_room("a", &["a", "b"]).await;
    room.orchestrator.call_ids(&["b"]).expect("call_ids failed");
    wait_for_call_peer(&room.connector, "b").await.expect("no call-peer");

    room.orchestrator.hang_up_all();

    assert_eq!(room.recorder.count(&CallbackEvent::Disconnected("b".into())), 1);
    assert!(room.engine.latest("b").expect("session for b").is_closed());
    assert_eq!(room.orchestrator.get_session_state("b"), None);
    // Still in the room.
    assert!(room.orchestrator.is_connected());

    // A second hang-up has nothing left to report.
    room.orchestrator.hang_up_all();
    assert_eq!(room.recorder.count(&CallbackEvent::Disconnected("b".into())), 1);
}

#[tokio::test]
async fn test_failed_offer_discards_session() {
    init_tracing();

    let room = create_joined_room("a", &["a", "b"]).await;
    room.engine.fail_offers(true);
    room.orchestrator.call_ids(&["b"]).expect("call_ids failed");

    assert!(
        wait_until(|| !room.recorder.errors().is_empty(), SIGNAL_TIMEOUT_MS).await
    );
    assert!(
        wait_until(
            || room.orchestrator.get_session_state("b").is_none(),
            SIGNAL_TIMEOUT_MS
        )
        .await
    );
    assert_eq!(room.recorder.count(&CallbackEvent::Disconnected("b".into())), 0);
    assert!(room.connector.sent_named("call-peer").is_empty());

    // The peer can be called again.
    room.engine.fail_offers(false);
    room.orchestrator.call_ids(&["b"]).expect("call_ids failed");
    wait_for_call_peer(&room.connector, "b").await.expect("no call-peer");
    assert_eq!(room.engine.sessions_for("b").len(), 2);
}

#[tokio::test]
async fn test_close_all_request_from_peer() {
    init_tracing();

    let room = create_joined_room("a", &["a", "b", "c"]).await;
    connect_peer(&room, "b").await;
    connect_peer(&room, "c").await;

    room.connector
        .deliver_message(IncomingEvent::CloseAllPeerConnectionsRequest { from_id: "b".into() });
    assert!(
        room.recorder
            .wait_for(&CallbackEvent::Disconnected("b".into()), SIGNAL_TIMEOUT_MS)
            .await
    );

    assert_eq!(room.orchestrator.get_connected_room_client_ids(), vec!["c".to_owned()]);
    assert_eq!(room.recorder.count(&CallbackEvent::Disconnected("c".into())), 0);
}

#[tokio::test]
async fn test_close_all_room_peer_connections() {
    init_tracing();

    let room = create_joined_room("a", &["a", "b", "c"]).await;
    connect_peer(&room, "b").await;
    connect_peer(&room, "c").await;

    room.orchestrator
        .close_all_room_peer_connections()
        .expect("request failed");

    assert_eq!(
        room.connector.sent_named("close-all-peer-connections-request"),
        vec![OutgoingEvent::CloseAllPeerConnectionsRequest {}]
    );
    assert_eq!(room.recorder.count(&CallbackEvent::Disconnected("b".into())), 1);
    assert_eq!(room.recorder.count(&CallbackEvent::Disconnected("c".into())), 1);
    assert!(!room.orchestrator.is_rtc_connected());
    assert!(room.orchestrator.is_connected());
}

#[tokio::test]
async fn test_late_events_for_unknown_peers_are_ignored() {
    init_tracing();

    let room = create_joined_room("a", &["a", "b"]).await;
    room.recorder.clear();

    room.connector.deliver_message(IncomingEvent::MakePeerCallAnswer {
        from_id: "z".into(),
        answer: remote_answer(),
    });
    room.connector.deliver_message(IncomingEvent::SendIceCandidate {
        from_id: "z".into(),
        candidate: IceCandidate {
            sdp_mid: Some("0".into()),
            sdp_m_line_index: Some(0),
            candidate: "candidate:1 1 udp 2130706431 10.0.0.9 9 typ host".into(),
        },
    });
    room.connector
        .deliver_message(IncomingEvent::CloseAllPeerConnectionsRequest { from_id: "z".into() });
    settle().await;

    assert!(room.recorder.events().is_empty());
    assert_eq!(room.engine.session_count(), 0);
}

#[tokio::test]
async fn test_replaced_session_ignores_old_engine_events() {
    init_tracing();

    let room = create_joined_room("a", &["a", "b"]).await;
    room.orchestrator.call_ids(&["b"]).expect("call_ids failed");
    wait_for_call_peer(&room.connector, "b").await.expect("no call-peer");
    let old = room.engine.latest("b").expect("first session");

    room.orchestrator.hang_up_all();
    room.connector.clear_sent();
    room.orchestrator.call_ids(&["b"]).expect("call_ids failed");
    wait_for_call_peer(&room.connector, "b").await.expect("no second call-peer");

    // The first session's sender was closed with it.
    assert!(!old.set_state(PeerConnectionState::Connected));
    settle().await;
    assert_eq!(room.recorder.count(&CallbackEvent::Connected("b".into())), 0);
    assert_eq!(
        room.orchestrator.get_session_state("b"),
        Some(huddle_client::NegotiationState::OfferSent)
    );
}
