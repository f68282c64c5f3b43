use huddle_core::model::{IceCandidate, SessionDescription, SessionId};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerConnectionState {
    New,
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

/// Engine step that produced a [`EngineEventKind::Failure`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureStage {
    CreateDescription,
    SetLocalDescription,
    SetRemoteDescription,
    AddIceCandidate,
    Session,
}

impl fmt::Display for FailureStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stage = match self {
            FailureStage::CreateDescription => "create description",
            FailureStage::SetLocalDescription => "set local description",
            FailureStage::SetRemoteDescription => "set remote description",
            FailureStage::AddIceCandidate => "add ICE candidate",
            FailureStage::Session => "peer session",
        };
        f.write_str(stage)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EngineEventKind {
    LocalDescriptionCreated(SessionDescription),
    RemoteDescriptionApplied,
    IceCandidateGathered(IceCandidate),
    ConnectionStateChanged(PeerConnectionState),
    Failure { stage: FailureStage, message: String },
}

#[derive(Debug, Clone)]
pub struct EngineEvent {
    pub session_id: SessionId,
    pub peer_id: String,
    pub kind: EngineEventKind,
}

/// Posts engine notifications into the orchestrator's event loop.
///
/// Engine threads never call into the orchestrator directly. Once
/// [`close`](Self::close) is called the sender swallows everything, which
/// stops delivery for a session that is being torn down.
#[derive(Clone)]
pub struct EngineEventSender {
    session_id: SessionId,
    peer_id: String,
    tx: mpsc::UnboundedSender<EngineEvent>,
    open: Arc<AtomicBool>,
}

impl EngineEventSender {
    pub fn new(
        session_id: SessionId,
        peer_id: impl Into<String>,
        tx: mpsc::UnboundedSender<EngineEvent>,
    ) -> Self {
        Self {
            session_id,
            peer_id: peer_id.into(),
            tx,
            open: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Returns false when the event was dropped.
    pub fn emit(&self, kind: EngineEventKind) -> bool {
        if !self.is_open() {
            return false;
        }

        self.tx
            .send(EngineEvent {
                session_id: self.session_id,
                peer_id: self.peer_id.clone(),
                kind,
            })
            .is_ok()
    }

    pub fn close(&self) {
        self.open.store(false, Ordering::Release);
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    pub fn peer_id(&self) -> &str {
        &self.peer_id
    }
}
