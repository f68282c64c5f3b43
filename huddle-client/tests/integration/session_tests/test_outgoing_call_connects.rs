use huddle_client::{NegotiationState, PeerConnectionState};
use huddle_core::model::{IceCandidate, IncomingEvent, OutgoingEvent, SdpType};

use crate::integration::{create_joined_room, init_tracing};
use crate::utils::{
    CallbackEvent, SIGNAL_TIMEOUT_MS, SessionCall, remote_answer, settle, wait_for_call_peer,
    wait_until,
};

const REMOTE_CANDIDATE: &str = "candidate:1 1 udp 2130706431 192.168.1.20 50000 typ host";
const LOCAL_CANDIDATE: &str = "candidate:2 1 udp 2130706431 192.168.1.10 50001 typ host";

#[tokio::test]
async fn test_outgoing_call_connects() {
    init_tracing();

    let room = create_joined_room("a", &["a", "b"]).await;
    room.orchestrator.call_ids(&["b"]).expect("call_ids failed");

    let offer = wait_for_call_peer(&room.connector, "b")
        .await
        .expect("no call-peer for b");
    assert_eq!(offer.kind, SdpType::Offer);
    assert_eq!(room.orchestrator.get_session_state("b"), Some(NegotiationState::OfferSent));

    room.connector.deliver_message(IncomingEvent::MakePeerCallAnswer {
        from_id: "b".into(),
        answer: remote_answer(),
    });
    let session = room.engine.latest("b").expect("session for b");
    assert!(session.is_caller);
    assert!(
        wait_until(
            || session.calls().contains(&SessionCall::SetRemote(SdpType::Answer)),
            SIGNAL_TIMEOUT_MS
        )
        .await
    );

    session.set_state(PeerConnectionState::Connecting);
    session.set_state(PeerConnectionState::Connected);
    assert!(
        room.recorder
            .wait_for(&CallbackEvent::Connected("b".into()), SIGNAL_TIMEOUT_MS)
            .await
    );

    assert_eq!(
        session.calls()[..3],
        [
            SessionCall::CreateOffer,
            SessionCall::SetLocal(SdpType::Offer),
            SessionCall::SetRemote(SdpType::Answer),
        ]
    );
    assert!(room.orchestrator.is_rtc_connected());
    assert_eq!(room.orchestrator.get_connected_room_client_ids(), vec!["b".to_owned()]);
    assert_eq!(room.orchestrator.get_session_state("b"), Some(NegotiationState::Connected));

    let clients = room.recorder.last_room_clients().expect("room clients update");
    let b = clients.iter().find(|c| c.id == "b").expect("b in room clients");
    assert!(b.is_connected);
    assert_eq!(b.name, "B");

    // A repeated Connected report does not fire the callback again.
    session.set_state(PeerConnectionState::Connected);
    settle().await;
    assert_eq!(room.recorder.count(&CallbackEvent::Connected("b".into())), 1);
}

#[tokio::test]
async fn test_ice_candidates_flow_both_ways() {
    init_tracing();

    let room = create_joined_room("a", &["a", "b"]).await;
    room.orchestrator.call_ids(&["b"]).expect("call_ids failed");
    wait_for_call_peer(&room.connector, "b").await.expect("no call-peer");
    let session = room.engine.latest("b").expect("session for b");

    session.gather_candidate(LOCAL_CANDIDATE);
    assert!(
        wait_until(
            || !room.connector.sent_named("send-ice-candidate").is_empty(),
            SIGNAL_TIMEOUT_MS
        )
        .await
    );
    let OutgoingEvent::SendIceCandidate { to_id, candidate } =
        room.connector.sent_named("send-ice-candidate").remove(0)
    else {
        panic!("expected send-ice-candidate");
    };
    assert_eq!(to_id, "b");
    assert_eq!(candidate.candidate, LOCAL_CANDIDATE);

    room.connector.deliver_message(IncomingEvent::SendIceCandidate {
        from_id: "b".into(),
        candidate: IceCandidate {
            sdp_mid: Some("0".into()),
            sdp_m_line_index: Some(0),
            candidate: REMOTE_CANDIDATE.into(),
        },
    });
    // The end-of-candidates marker is dropped quietly.
    room.connector.deliver_message(IncomingEvent::SendIceCandidate {
        from_id: "b".into(),
        candidate: IceCandidate {
            sdp_mid: Some("0".into()),
            sdp_m_line_index: Some(0),
            candidate: String::new(),
        },
    });
    assert!(
        wait_until(
            || session.calls().contains(&SessionCall::AddIce(REMOTE_CANDIDATE.into())),
            SIGNAL_TIMEOUT_MS
        )
        .await
    );
    settle().await;

    let added = session
        .calls()
        .into_iter()
        .filter(|c| matches!(c, SessionCall::AddIce(_)))
        .count();
    assert_eq!(added, 1);
    assert!(room.recorder.errors().is_empty());
}

#[tokio::test]
async fn test_call_ids_creates_single_session() {
    init_tracing();

    let room = create_joined_room("a", &["a", "b"]).await;
    room.orchestrator.call_ids(&["b"]).expect("first call failed");
    room.orchestrator.call_ids(&["b", "a"]).expect("second call failed");
    wait_for_call_peer(&room.connector, "b").await.expect("no call-peer");
    room.orchestrator.call_ids(&["b"]).expect("third call failed");
    settle().await;

    assert_eq!(room.engine.session_count(), 1);
    assert_eq!(room.connector.sent_named("call-peer").len(), 1);
}

#[tokio::test]
async fn test_concurrent_calls_create_single_session() {
    init_tracing();

    let room = create_joined_room("a", &["a", "b"]).await;
    std::thread::scope(|scope| {
        for _ in 0..8 {
            scope.spawn(|| room.orchestrator.call_ids(&["b"]).expect("call_ids failed"));
        }
    });
    settle().await;

    assert_eq!(room.engine.session_count(), 1);
    assert_eq!(room.connector.sent_named("call-peer").len(), 1);
}

#[tokio::test]
async fn test_call_before_join_is_rejected() {
    init_tracing();

    let room = crate::integration::create_test_room();
    assert!(room.orchestrator.call_ids(&["b"]).is_err());
    assert!(room.orchestrator.call_all().is_err());
    assert_eq!(room.engine.session_count(), 0);
}

#[tokio::test]
async fn test_server_requested_calls() {
    init_tracing();

    let room = create_joined_room("a", &["a", "b", "c"]).await;
    room.connector.deliver_message(IncomingEvent::MakePeerCall {
        ids: vec!["b".into(), "c".into(), "a".into()],
    });

    wait_for_call_peer(&room.connector, "b").await.expect("no call to b");
    wait_for_call_peer(&room.connector, "c").await.expect("no call to c");
    assert_eq!(room.engine.session_count(), 2);
    assert_eq!(
        room.orchestrator.get_connected_room_client_ids(),
        vec!["b".to_owned(), "c".to_owned()]
    );
}

#[tokio::test]
async fn test_call_to_unknown_id_uses_placeholder() {
    init_tracing();

    let room = create_joined_room("a", &["a", "b"]).await;
    room.orchestrator.call_ids(&["ghost"]).expect("call_ids failed");
    wait_for_call_peer(&room.connector, "ghost").await.expect("no call to ghost");

    room.engine
        .latest("ghost")
        .expect("session for ghost")
        .set_state(PeerConnectionState::Connected);
    assert!(
        room.recorder
            .wait_for(&CallbackEvent::Connected("ghost".into()), SIGNAL_TIMEOUT_MS)
            .await
    );
    // Not in the roster, so it does not show up among the room clients.
    assert!(room.orchestrator.get_room_client("ghost").is_err());
}

#[tokio::test]
async fn test_callbacks_may_reenter_orchestrator() {
    init_tracing();

    let room = create_joined_room("a", &["a", "b"]).await;
    let seen = std::sync::Arc::new(parking_lot::Mutex::new(Vec::new()));

    let orchestrator = room.orchestrator.clone();
    let log = seen.clone();
    room.orchestrator.set_on_client_connected(move |client| {
        let flag = orchestrator
            .get_room_client(&client.id)
            .map(|c| c.is_connected)
            .unwrap_or(false);
        log.lock().push((client.id.clone(), flag));
        orchestrator.hang_up_all();
    });

    room.orchestrator.call_ids(&["b"]).expect("call_ids failed");
    wait_for_call_peer(&room.connector, "b").await.expect("no call-peer");
    room.engine
        .latest("b")
        .expect("session for b")
        .set_state(PeerConnectionState::Connected);

    assert!(
        room.recorder
            .wait_for(&CallbackEvent::Disconnected("b".into()), SIGNAL_TIMEOUT_MS)
            .await
    );
    assert_eq!(*seen.lock(), vec![("b".to_owned(), true)]);
    assert!(!room.orchestrator.is_rtc_connected());
}
