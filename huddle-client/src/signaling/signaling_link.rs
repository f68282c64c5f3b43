use crate::error::{Error, Result};
use crate::signaling::SignalingChannel;
use huddle_core::model::OutgoingEvent;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::debug;

#[derive(Default)]
struct LinkState {
    channel: Option<Arc<dyn SignalingChannel>>,
    generation: u64,
    session_id: Option<String>,
    joined: bool,
}

/// Shared view of the current signaling connection.
///
/// The lock is a leaf: it is never held while calling into the channel or
/// anything else.
#[derive(Clone, Default)]
pub struct SignalingLink {
    state: Arc<Mutex<LinkState>>,
}

impl SignalingLink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn send(&self, event: OutgoingEvent) -> Result<()> {
        let channel = self.state.lock().channel.clone();
        match channel {
            Some(channel) => {
                debug!("Sending {} {:?}", event.name(), event.to_id());
                channel.send(event)
            }
            None => Err(Error::Transport(format!(
                "cannot send {}: signaling channel is not open",
                event.name()
            ))),
        }
    }

    pub fn has_channel(&self) -> bool {
        self.state.lock().channel.is_some()
    }

    /// Starts a new connection generation and returns it.
    pub fn next_generation(&self) -> u64 {
        let mut state = self.state.lock();
        state.generation += 1;
        state.generation
    }

    /// Installs `channel` if `generation` is still current and no other
    /// channel is attached.
    pub fn attach(&self, generation: u64, channel: Arc<dyn SignalingChannel>) -> bool {
        let mut state = self.state.lock();
        if state.generation != generation || state.channel.is_some() {
            return false;
        }
        state.channel = Some(channel);
        true
    }

    /// Drops the current channel and invalidates its generation. The caller
    /// closes the returned channel.
    pub fn detach(&self) -> Option<Arc<dyn SignalingChannel>> {
        let mut state = self.state.lock();
        state.generation += 1;
        state.joined = false;
        state.session_id = None;
        state.channel.take()
    }

    pub fn is_current(&self, generation: u64) -> bool {
        self.state.lock().generation == generation
    }

    pub fn generation(&self) -> u64 {
        self.state.lock().generation
    }

    pub fn set_joined(&self, session_id: impl Into<String>) {
        let mut state = self.state.lock();
        state.joined = true;
        state.session_id = Some(session_id.into());
    }

    /// Forgets the room membership but keeps the channel.
    pub fn leave(&self) {
        let mut state = self.state.lock();
        state.joined = false;
        state.session_id = None;
    }

    pub fn is_joined(&self) -> bool {
        self.state.lock().joined
    }

    pub fn session_id(&self) -> Option<String> {
        self.state.lock().session_id.clone()
    }
}
