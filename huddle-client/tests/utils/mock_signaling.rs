use huddle_client::{
    ChannelEvent, ChannelEventSender, Error, Result, SignalingChannel, SignalingConnector,
};
use huddle_core::model::{IncomingEvent, OutgoingEvent, ParseError, SignalingServerConfig};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Default)]
struct ConnectorState {
    senders: Vec<ChannelEventSender>,
    sent: Vec<OutgoingEvent>,
    closed_channels: usize,
    fail_next: Option<String>,
    manual_open: bool,
}

/// Signaling connector that records outgoing events and lets the test
/// inject inbound ones.
#[derive(Clone, Default)]
pub struct MockConnector {
    state: Arc<Mutex<ConnectorState>>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Channels opened after this call wait for [`open`](Self::open).
    pub fn manual_open(&self) {
        self.state.lock().manual_open = true;
    }

    pub fn fail_next_connect(&self, message: &str) {
        self.state.lock().fail_next = Some(message.to_owned());
    }

    pub fn connect_count(&self) -> usize {
        self.state.lock().senders.len()
    }

    pub fn closed_channels(&self) -> usize {
        self.state.lock().closed_channels
    }

    /// Delivers an event on the most recent connection.
    pub fn deliver(&self, event: ChannelEvent) -> bool {
        let sender = self.state.lock().senders.last().cloned();
        sender.is_some_and(|s| s.send(event))
    }

    /// Delivers an event on the `index`-th connection ever opened.
    pub fn deliver_on(&self, index: usize, event: ChannelEvent) -> bool {
        let sender = self.state.lock().senders.get(index).cloned();
        sender.is_some_and(|s| s.send(event))
    }

    pub fn deliver_message(&self, event: IncomingEvent) -> bool {
        self.deliver(ChannelEvent::Message(event))
    }

    /// Delivers a raw text frame, decoded the way the websocket channel
    /// decodes it. Frames that are not a known event are dropped.
    pub fn deliver_frame(&self, text: &str) -> bool {
        match IncomingEvent::from_frame(text) {
            Ok(event) => self.deliver_message(event),
            Err(e @ ParseError::InvalidPayload { .. }) => self.deliver(ChannelEvent::Invalid(e)),
            Err(_) => false,
        }
    }

    pub fn open(&self) -> bool {
        self.deliver(ChannelEvent::Opened)
    }

    /// Every event sent so far, oldest first.
    pub fn sent(&self) -> Vec<OutgoingEvent> {
        self.state.lock().sent.clone()
    }

    pub fn sent_named(&self, name: &str) -> Vec<OutgoingEvent> {
        self.sent().into_iter().filter(|e| e.name() == name).collect()
    }

    pub fn clear_sent(&self) {
        self.state.lock().sent.clear();
    }
}

impl SignalingConnector for MockConnector {
    fn connect(
        &self,
        _config: &SignalingServerConfig,
        events: ChannelEventSender,
    ) -> Result<Arc<dyn SignalingChannel>> {
        let mut state = self.state.lock();
        if let Some(message) = state.fail_next.take() {
            return Err(Error::Transport(message));
        }

        tracing::debug!("[MockConnector] connect, generation {}", events.generation());
        if !state.manual_open {
            events.send(ChannelEvent::Opened);
        }
        state.senders.push(events);

        Ok(Arc::new(MockChannel {
            state: Arc::clone(&self.state),
            closed: AtomicBool::new(false),
        }))
    }
}

struct MockChannel {
    state: Arc<Mutex<ConnectorState>>,
    closed: AtomicBool,
}

impl SignalingChannel for MockChannel {
    fn send(&self, event: OutgoingEvent) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::Transport("mock channel closed".to_owned()));
        }
        tracing::debug!("[MockChannel] send {}", event.name());
        self.state.lock().sent.push(event);
        Ok(())
    }

    fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.state.lock().closed_channels += 1;
        }
    }
}
