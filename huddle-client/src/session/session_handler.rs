use crate::callback::CallbackDispatcher;
use crate::engine::{
    EngineEvent, EngineEventKind, EngineEventSender, FailureStage, PeerConnectionState,
    PeerEngine, PeerSession, SessionRequest,
};
use crate::error::{Error, Result};
use crate::session::NegotiationState;
use crate::signaling::SignalingLink;
use huddle_core::model::{
    Client, IceCandidate, IceServer, OutgoingEvent, SdpType, SessionDescription, SessionId,
};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Shared collaborators every session handler needs.
#[derive(Clone)]
pub struct SessionContext {
    pub engine: Arc<dyn PeerEngine>,
    pub ice_servers: Vec<IceServer>,
    pub engine_events: mpsc::UnboundedSender<EngineEvent>,
    pub link: SignalingLink,
    pub callbacks: Arc<CallbackDispatcher>,
}

/// What the owner should do with a handler after an engine event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    Keep,
    /// The peer just connected; room client views changed.
    Connected,
    /// The session ended and already reported its disconnect.
    Remove,
    /// The session never came up; drop it without a disconnect report.
    Discard,
}

#[derive(Debug)]
struct HandlerState {
    negotiation: NegotiationState,
    disconnect_notified: bool,
    closed: bool,
}

/// Negotiation state machine for one remote peer.
///
/// The handler never holds its own lock while calling the engine, the
/// signaling link or a user callback.
pub struct SessionHandler {
    peer: Client,
    is_caller: bool,
    session: Arc<dyn PeerSession>,
    events: EngineEventSender,
    link: SignalingLink,
    callbacks: Arc<CallbackDispatcher>,
    state: Mutex<HandlerState>,
}

impl SessionHandler {
    pub fn new(peer: Client, is_caller: bool, context: &SessionContext) -> Result<Self> {
        let events = EngineEventSender::new(
            SessionId::new(),
            peer.id.clone(),
            context.engine_events.clone(),
        );

        let session = context.engine.create_session(SessionRequest {
            peer_id: peer.id.clone(),
            is_caller,
            ice_servers: context.ice_servers.clone(),
            events: events.clone(),
        })?;

        debug!(
            "Created session {} for {:?} (caller: {})",
            events.session_id(),
            peer.id,
            is_caller
        );

        Ok(Self {
            peer,
            is_caller,
            session,
            events,
            link: context.link.clone(),
            callbacks: Arc::clone(&context.callbacks),
            state: Mutex::new(HandlerState {
                negotiation: NegotiationState::Idle,
                disconnect_notified: false,
                closed: false,
            }),
        })
    }

    pub fn peer(&self) -> &Client {
        &self.peer
    }

    pub fn peer_id(&self) -> &str {
        &self.peer.id
    }

    pub fn is_caller(&self) -> bool {
        self.is_caller
    }

    pub fn session_id(&self) -> SessionId {
        self.events.session_id()
    }

    pub fn state(&self) -> NegotiationState {
        self.state.lock().negotiation
    }

    fn transition(
        &self,
        operation: &'static str,
        allowed: bool,
        from: NegotiationState,
        to: NegotiationState,
    ) -> Result<()> {
        let mut state = self.state.lock();
        if state.negotiation.is_terminal() || !allowed || state.negotiation != from {
            return Err(Error::InvalidTransition {
                from: state.negotiation,
                operation,
            });
        }
        state.negotiation = to;
        Ok(())
    }

    /// Starts the call by asking the engine for an offer.
    pub fn make_peer_call(&self) -> Result<()> {
        self.transition(
            "make a peer call",
            self.is_caller,
            NegotiationState::Idle,
            NegotiationState::OfferPending,
        )?;
        info!("Calling {:?}", self.peer.id);
        self.session.create_offer();
        Ok(())
    }

    /// Applies a remote offer. The answer follows once the engine has
    /// applied it.
    pub fn receive_peer_call(&self, sdp: &str) -> Result<()> {
        let offer = SessionDescription::offer(sdp)?;
        self.transition(
            "receive a peer call",
            !self.is_caller,
            NegotiationState::Idle,
            NegotiationState::AnswerPending,
        )?;
        info!("Answering call from {:?}", self.peer.id);
        self.session.set_remote_description(offer);
        Ok(())
    }

    pub fn receive_peer_call_answer(&self, sdp: &str) -> Result<()> {
        let answer = SessionDescription::answer(sdp)?;
        {
            let state = self.state.lock();
            if state.negotiation.is_terminal()
                || !self.is_caller
                || state.negotiation != NegotiationState::OfferSent
            {
                return Err(Error::InvalidTransition {
                    from: state.negotiation,
                    operation: "receive a peer call answer",
                });
            }
        }
        self.session.set_remote_description(answer);
        Ok(())
    }

    /// Forwards a remote ICE candidate. The empty end-of-candidates marker
    /// is ignored.
    pub fn receive_ice_candidate(
        &self,
        sdp_mid: Option<String>,
        sdp_m_line_index: Option<u16>,
        candidate: &str,
    ) -> Result<()> {
        let Some(candidate) = IceCandidate::parse(sdp_mid, sdp_m_line_index, candidate)? else {
            debug!("End of candidates from {:?}", self.peer.id);
            return Ok(());
        };
        if self.state.lock().negotiation.is_terminal() {
            return Ok(());
        }
        self.session.add_ice_candidate(candidate);
        Ok(())
    }

    pub fn handle_engine_event(&self, kind: EngineEventKind) -> SessionOutcome {
        match kind {
            EngineEventKind::LocalDescriptionCreated(description) => {
                self.on_local_description(description)
            }
            EngineEventKind::RemoteDescriptionApplied => {
                let answer_owed = {
                    let state = self.state.lock();
                    !state.closed
                        && !self.is_caller
                        && state.negotiation == NegotiationState::AnswerPending
                };
                if answer_owed {
                    self.session.create_answer();
                }
                SessionOutcome::Keep
            }
            EngineEventKind::IceCandidateGathered(candidate) => {
                if self.state.lock().closed {
                    return SessionOutcome::Keep;
                }
                let event = OutgoingEvent::SendIceCandidate {
                    to_id: self.peer.id.clone(),
                    candidate,
                };
                if let Err(e) = self.link.send(event) {
                    warn!("Dropping local ICE candidate for {:?}: {}", self.peer.id, e);
                }
                SessionOutcome::Keep
            }
            EngineEventKind::ConnectionStateChanged(state) => self.on_connection_state(state),
            EngineEventKind::Failure { stage, message } => {
                let offer_failed = {
                    let state = self.state.lock();
                    self.is_caller
                        && stage == FailureStage::CreateDescription
                        && state.negotiation == NegotiationState::OfferPending
                };
                self.callbacks
                    .error(&format!("{stage} failed for {}: {message}", self.peer.id));
                if offer_failed {
                    SessionOutcome::Discard
                } else {
                    SessionOutcome::Keep
                }
            }
        }
    }

    fn on_local_description(&self, description: SessionDescription) -> SessionOutcome {
        {
            let mut state = self.state.lock();
            if state.closed {
                return SessionOutcome::Keep;
            }
            state.negotiation = match (state.negotiation, description.kind) {
                (NegotiationState::OfferPending, SdpType::Offer) => NegotiationState::OfferSent,
                (NegotiationState::AnswerPending, SdpType::Answer) => NegotiationState::AnswerSent,
                (current, kind) => {
                    warn!(
                        "Ignoring local {:?} description for {:?} while {}",
                        kind, self.peer.id, current
                    );
                    return SessionOutcome::Keep;
                }
            };
        }

        self.session.set_local_description(description.clone());

        let to_id = self.peer.id.clone();
        let event = if self.is_caller {
            OutgoingEvent::CallPeer {
                to_id,
                offer: description,
            }
        } else {
            OutgoingEvent::MakePeerCallAnswer {
                to_id,
                answer: description,
            }
        };
        if let Err(e) = self.link.send(event) {
            self.callbacks.error(&e.to_string());
        }
        SessionOutcome::Keep
    }

    fn on_connection_state(&self, connection: PeerConnectionState) -> SessionOutcome {
        match connection {
            PeerConnectionState::Connected => {
                {
                    let mut state = self.state.lock();
                    if state.closed || state.negotiation == NegotiationState::Connected {
                        return SessionOutcome::Keep;
                    }
                    state.negotiation = NegotiationState::Connected;
                    state.disconnect_notified = false;
                }
                info!("Connected to {:?}", self.peer.id);
                self.callbacks.client_connected(&self.peer);
                SessionOutcome::Connected
            }
            PeerConnectionState::Disconnected
            | PeerConnectionState::Failed
            | PeerConnectionState::Closed => {
                let owed = {
                    let mut state = self.state.lock();
                    if state.closed {
                        return SessionOutcome::Keep;
                    }
                    state.negotiation = NegotiationState::Disconnected;
                    !std::mem::replace(&mut state.disconnect_notified, true)
                };
                info!("Connection to {:?} ended ({:?})", self.peer.id, connection);
                if owed {
                    self.callbacks.client_disconnected(&self.peer);
                }
                SessionOutcome::Remove
            }
            PeerConnectionState::New | PeerConnectionState::Connecting => SessionOutcome::Keep,
        }
    }

    /// Stops engine event delivery, releases the engine session and fires
    /// the disconnect callback if it is still owed. Idempotent.
    pub fn close(&self) {
        let owed = {
            let mut state = self.state.lock();
            if state.closed {
                return;
            }
            state.closed = true;
            state.negotiation = NegotiationState::Closed;
            !std::mem::replace(&mut state.disconnect_notified, true)
        };

        self.events.close();
        self.session.close();
        debug!("Closed session {} for {:?}", self.session_id(), self.peer.id);

        if owed {
            self.callbacks.client_disconnected(&self.peer);
        }
    }

    /// Closes a session that never came up, without a disconnect report.
    pub fn discard(&self) {
        self.state.lock().disconnect_notified = true;
        self.close();
    }
}

impl Drop for SessionHandler {
    fn drop(&mut self) {
        self.close();
    }
}
