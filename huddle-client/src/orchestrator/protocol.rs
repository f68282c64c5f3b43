use crate::orchestrator::orchestrator_state::Inner;
use crate::session::SessionHandler;
use huddle_core::model::{Client, IceCandidate, IncomingEvent, OutgoingEvent, SdpType, SessionDescription};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

impl Inner {
    /// Transport is up: ask to join the configured room.
    pub fn on_channel_opened(&self) {
        info!("Signaling channel open, joining room {:?}", self.config.room);
        let join = OutgoingEvent::JoinRoom {
            name: self.config.client_name.clone(),
            data: self.config.client_data.clone(),
            room: self.config.room.clone(),
            password: self.config.password.clone(),
        };
        if let Err(e) = self.link.send(join) {
            self.callbacks.signaling_connection_error(&e.to_string());
        }
    }

    pub fn on_signaling_event(&self, event: IncomingEvent, generation: u64) {
        debug!("Handling {}", event.name());
        match event {
            IncomingEvent::JoinRoom {
                is_joined,
                id,
                clients,
            } => self.on_join_room(is_joined, id, clients, generation),
            IncomingEvent::RoomClients(clients) => self.on_room_clients(clients),
            IncomingEvent::MakePeerCall { ids } => {
                if let Err(e) = self.call_ids(&ids) {
                    warn!("Ignoring make-peer-call: {}", e);
                }
            }
            IncomingEvent::CallPeer { from_id, offer } => {
                self.on_call_peer(from_id, offer, generation)
            }
            IncomingEvent::MakePeerCallAnswer { from_id, answer } => {
                self.on_peer_call_answer(&from_id, answer)
            }
            IncomingEvent::SendIceCandidate { from_id, candidate } => {
                self.on_ice_candidate(&from_id, candidate)
            }
            IncomingEvent::CallRejected { from_id } => self.on_call_rejected(&from_id),
            IncomingEvent::CloseAllPeerConnectionsRequest { from_id } => {
                self.on_close_all_request(&from_id)
            }
        }
    }

    fn on_join_room(
        &self,
        is_joined: bool,
        id: String,
        clients: Option<Vec<Client>>,
        generation: u64,
    ) {
        if !is_joined {
            warn!("Join of room {:?} refused", self.config.room);
            if let Some(channel) = self.link.detach() {
                channel.close();
            }
            self.callbacks.signaling_connection_error("Invalid password");
            return;
        }

        info!("Joined room {:?} as {:?}", self.config.room, id);
        self.link.set_joined(id);
        self.callbacks.signaling_connection_opened();
        if !self.is_live(generation) {
            debug!("Connection closed from the opened callback, dropping roster");
            return;
        }

        if let Some(clients) = clients {
            self.on_room_clients(clients);
        }
    }

    fn on_room_clients(&self, clients: Vec<Client>) {
        let (_sessions, roster) = self.lock_state();
        debug!("Roster update with {} client(s)", clients.len());
        roster.borrow_mut().replace(clients);
        self.notify_room_clients();
    }

    fn on_call_peer(&self, from_id: String, offer: SessionDescription, generation: u64) {
        let _state = self.lock_state();
        if self.has_session(&from_id) {
            info!("Ignoring call from {:?}: session already exists", from_id);
            return;
        }
        if offer.kind != SdpType::Offer {
            self.callbacks
                .error(&format!("call from {from_id} carried an {:?} description", offer.kind));
            return;
        }

        let peer = self.roster_client(&from_id);
        if !self.callbacks.accept_call(&peer) {
            info!("Rejecting call from {:?}", from_id);
            let rejected = OutgoingEvent::CallRejected {
                to_id: from_id.clone(),
            };
            if let Err(e) = self.link.send(rejected) {
                warn!("Failed to reject call from {:?}: {}", from_id, e);
            }
            self.callbacks.call_rejected(&peer);
            return;
        }
        if !self.is_live(generation) {
            info!("Connection closed while accepting call from {:?}", from_id);
            return;
        }
        // The acceptor may have called this peer itself.
        if self.has_session(&from_id) {
            return;
        }

        let handler = match SessionHandler::new(peer, false, &self.session_context) {
            Ok(handler) => Arc::new(handler),
            Err(e) => {
                error!("Failed to create session for {:?}: {}", from_id, e);
                self.callbacks.error(&e.to_string());
                return;
            }
        };
        if let Err(e) = handler.receive_peer_call(&offer.sdp) {
            handler.discard();
            self.callbacks.error(&e.to_string());
            return;
        }
        self.insert_session(handler);
    }

    fn on_peer_call_answer(&self, from_id: &str, answer: SessionDescription) {
        let _state = self.lock_state();
        let Some(handler) = self.session(from_id) else {
            info!("Ignoring answer from {:?}: no session", from_id);
            return;
        };
        if let Err(e) = handler.receive_peer_call_answer(&answer.sdp) {
            self.callbacks.error(&e.to_string());
        }
    }

    fn on_ice_candidate(&self, from_id: &str, candidate: IceCandidate) {
        let _state = self.lock_state();
        let Some(handler) = self.session(from_id) else {
            debug!("Ignoring ICE candidate from {:?}: no session", from_id);
            return;
        };
        let IceCandidate {
            sdp_mid,
            sdp_m_line_index,
            candidate,
        } = candidate;
        if let Err(e) = handler.receive_ice_candidate(sdp_mid, sdp_m_line_index, &candidate) {
            self.callbacks.error(&e.to_string());
        }
    }

    fn on_call_rejected(&self, from_id: &str) {
        let _state = self.lock_state();
        info!("Call to {:?} was rejected", from_id);
        let peer = match self.take_session(from_id) {
            Some(handler) => {
                let peer = handler.peer().clone();
                handler.close();
                self.notify_room_clients();
                peer
            }
            None => self.roster_client(from_id),
        };
        if self.link.is_joined() {
            self.callbacks.call_rejected(&peer);
        }
    }

    fn on_close_all_request(&self, from_id: &str) {
        let _state = self.lock_state();
        if let Some(handler) = self.take_session(from_id) {
            info!("{:?} closed all peer connections", from_id);
            handler.close();
            self.notify_room_clients();
        }
    }

    /// The transport dropped. Sessions and roster go away; the channel is
    /// kept when it is about to reconnect on its own.
    pub fn on_transport_lost(&self, reason: &str, is_error: bool, reconnecting: bool) {
        let (_sessions, roster) = self.lock_state();
        warn!(
            "Signaling transport lost: {} (reconnecting: {})",
            reason, reconnecting
        );

        self.close_sessions(self.take_all_sessions());
        roster.borrow_mut().clear();
        self.link.leave();
        if !reconnecting {
            if let Some(channel) = self.link.detach() {
                channel.close();
            }
        }

        if is_error {
            self.callbacks.signaling_connection_error(reason);
        } else {
            self.callbacks.signaling_connection_closed();
        }
    }
}
