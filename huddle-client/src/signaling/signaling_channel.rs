use crate::error::Result;
use huddle_core::model::{IncomingEvent, OutgoingEvent, ParseError, SignalingServerConfig};
use std::sync::Arc;
use tokio::sync::mpsc;

/// What a signaling channel reports back to the orchestrator.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    /// The transport is (re)connected and ready for `join-room`.
    Opened,
    Message(IncomingEvent),
    /// A known event whose payload could not be decoded.
    Invalid(ParseError),
    /// The connection dropped. `reconnecting` tells whether the channel will
    /// try again on its own.
    Disconnected { reason: String, reconnecting: bool },
    Error { message: String, reconnecting: bool },
}

#[derive(Debug, Clone)]
pub struct ChannelEnvelope {
    pub generation: u64,
    pub event: ChannelEvent,
}

/// Delivers channel events tagged with the connection generation they
/// belong to, so events from a replaced connection can be told apart.
#[derive(Debug, Clone)]
pub struct ChannelEventSender {
    generation: u64,
    tx: mpsc::UnboundedSender<ChannelEnvelope>,
}

impl ChannelEventSender {
    pub fn new(generation: u64, tx: mpsc::UnboundedSender<ChannelEnvelope>) -> Self {
        Self { generation, tx }
    }

    /// Returns false once the receiving side is gone.
    pub fn send(&self, event: ChannelEvent) -> bool {
        self.tx
            .send(ChannelEnvelope {
                generation: self.generation,
                event,
            })
            .is_ok()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// An open, ordered, bidirectional event bus to the signaling server.
pub trait SignalingChannel: Send + Sync {
    fn send(&self, event: OutgoingEvent) -> Result<()>;

    /// Closes the connection without reporting it back.
    fn close(&self);
}

/// Opens signaling channels. Connection progress is reported through the
/// given sender, never by blocking.
pub trait SignalingConnector: Send + Sync {
    fn connect(
        &self,
        config: &SignalingServerConfig,
        events: ChannelEventSender,
    ) -> Result<Arc<dyn SignalingChannel>>;
}
