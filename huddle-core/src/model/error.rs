use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("empty session description")]
    EmptyDescription,

    #[error("session description must start with a version line, got `{0}`")]
    MissingVersion(String),

    #[error("malformed session description line {line}: `{content}`")]
    MalformedLine { line: usize, content: String },

    #[error("malformed ICE candidate: `{0}`")]
    MalformedCandidate(String),

    #[error("invalid signaling url `{url}`: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("malformed signaling frame: {0}")]
    MalformedFrame(String),

    #[error("unknown signaling event `{0}`")]
    UnknownEvent(String),

    #[error("invalid {event} payload: {reason}")]
    InvalidPayload { event: String, reason: String },

    #[error("{0} must not be empty")]
    EmptyField(&'static str),
}
