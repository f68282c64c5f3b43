mod client;
mod config;
mod description;
mod error;
mod session;
mod signaling;

pub use client::{Client, RoomClient};
pub use config::{IceServer, SignalingServerConfig};
pub use description::{IceCandidate, SdpType, SessionDescription};
pub use error::ParseError;
pub use session::SessionId;
pub use signaling::{IncomingEvent, OutgoingEvent};
