use crate::engine::EngineEvent;
use crate::error::Error;
use crate::orchestrator::orchestrator_state::Inner;
use crate::session::SessionOutcome;
use crate::signaling::{ChannelEnvelope, ChannelEvent};
use std::sync::Weak;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

/// Serializes signaling and engine events into the orchestrator state.
///
/// Holds only a weak reference so dropping the last orchestrator handle
/// ends the loop.
pub(crate) async fn run(
    inner: Weak<Inner>,
    mut channel_rx: mpsc::UnboundedReceiver<ChannelEnvelope>,
    mut engine_rx: mpsc::UnboundedReceiver<EngineEvent>,
    mut stop: oneshot::Receiver<()>,
) {
    info!("Orchestrator event loop started");

    loop {
        tokio::select! {
            envelope = channel_rx.recv() => {
                let (Some(envelope), Some(inner)) = (envelope, inner.upgrade()) else {
                    break;
                };
                inner.handle_channel_event(envelope);
            }

            event = engine_rx.recv() => {
                let (Some(event), Some(inner)) = (event, inner.upgrade()) else {
                    break;
                };
                inner.handle_engine_event(event);
            }

            _ = &mut stop => break,
        }
    }

    info!("Orchestrator event loop finished");
}

impl Inner {
    fn handle_channel_event(&self, envelope: ChannelEnvelope) {
        let _state = self.lock_state();
        if !self.link.is_current(envelope.generation) {
            debug!(
                "Dropping {:?} from superseded connection {}",
                envelope.event, envelope.generation
            );
            return;
        }

        match envelope.event {
            ChannelEvent::Opened => self.on_channel_opened(),
            ChannelEvent::Message(event) => self.on_signaling_event(event, envelope.generation),
            ChannelEvent::Invalid(e) => {
                warn!("Rejected signaling payload: {}", e);
                self.callbacks.error(&Error::Negotiation(e).to_string());
            }
            ChannelEvent::Disconnected {
                reason,
                reconnecting,
            } => self.on_transport_lost(&reason, false, reconnecting),
            ChannelEvent::Error {
                message,
                reconnecting,
            } => self.on_transport_lost(&message, true, reconnecting),
        }
    }

    fn handle_engine_event(&self, event: EngineEvent) {
        let _state = self.lock_state();
        let handler = self
            .session(&event.peer_id)
            .filter(|handler| handler.session_id() == event.session_id);
        let Some(handler) = handler else {
            debug!(
                "Dropping engine event for closed session {} of {:?}",
                event.session_id, event.peer_id
            );
            return;
        };

        match handler.handle_engine_event(event.kind) {
            SessionOutcome::Keep => {}
            SessionOutcome::Connected => self.notify_room_clients(),
            SessionOutcome::Remove => {
                let removed = self.take_if_current(&handler);
                handler.close();
                if removed {
                    self.notify_room_clients();
                }
            }
            SessionOutcome::Discard => {
                self.take_if_current(&handler);
                handler.discard();
            }
        }
    }
}
