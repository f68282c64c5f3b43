use crate::engine::EngineEventSender;
use huddle_core::model::{IceCandidate, IceServer, SessionDescription};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct EngineError(pub String);

impl EngineError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl From<anyhow::Error> for EngineError {
    fn from(error: anyhow::Error) -> Self {
        Self(format!("{error:#}"))
    }
}

/// Everything the engine needs to open one peer session.
pub struct SessionRequest {
    pub peer_id: String,
    pub is_caller: bool,
    pub ice_servers: Vec<IceServer>,
    /// Sink for the session's asynchronous notifications.
    pub events: EngineEventSender,
}

/// Factory for peer sessions. ICE, DTLS and media all live behind it.
pub trait PeerEngine: Send + Sync {
    fn create_session(&self, request: SessionRequest) -> Result<Arc<dyn PeerSession>, EngineError>;
}

/// One peer connection owned by the engine.
///
/// Every method returns immediately. Results come back through the
/// [`EngineEventSender`] given at creation, in the order the calls were made.
pub trait PeerSession: Send + Sync {
    fn create_offer(&self);

    fn create_answer(&self);

    fn set_local_description(&self, description: SessionDescription);

    fn set_remote_description(&self, description: SessionDescription);

    fn add_ice_candidate(&self, candidate: IceCandidate);

    /// Releases the connection. Further calls are ignored.
    fn close(&self);
}
