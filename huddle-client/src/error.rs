use crate::engine::EngineError;
use crate::roster::RosterError;
use crate::session::NegotiationState;
use huddle_core::ParseError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Connect failure or unexpected loss of the signaling connection.
    #[error("signaling transport error: {0}")]
    Transport(String),

    /// Malformed offer, answer or ICE candidate.
    #[error("negotiation error: {0}")]
    Negotiation(#[from] ParseError),

    #[error("room client `{0}` not found")]
    NotFound(String),

    #[error("cannot {operation} while {from}")]
    InvalidTransition {
        from: NegotiationState,
        operation: &'static str,
    },

    #[error("peer engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("invalid configuration: {0}")]
    Config(ParseError),

    #[error("a tokio runtime is required")]
    NoRuntime,
}

impl From<RosterError> for Error {
    fn from(error: RosterError) -> Self {
        match error {
            RosterError::NotFound(id) => Error::NotFound(id),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
