use crate::callback::CallbackDispatcher;
use crate::error::{Error, Result};
use crate::roster::RoomRoster;
use crate::session::{SessionContext, SessionHandler};
use crate::signaling::{ChannelEnvelope, ChannelEventSender, SignalingConnector, SignalingLink};
use huddle_core::model::{Client, RoomClient, SignalingServerConfig};
use parking_lot::{ReentrantMutex, ReentrantMutexGuard};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info};

pub(crate) type SessionMap = HashMap<String, Arc<SessionHandler>>;

/// State shared by every orchestrator handle and the event loop.
///
/// Lock order: `sessions`, then `roster`, then the callback dispatcher's own
/// lock. `RefCell` borrows are never held across a call into a handler or a
/// user callback.
pub(crate) struct Inner {
    pub config: SignalingServerConfig,
    pub connector: Arc<dyn SignalingConnector>,
    pub runtime: Handle,
    pub link: SignalingLink,
    pub sessions: ReentrantMutex<RefCell<SessionMap>>,
    pub roster: ReentrantMutex<RefCell<RoomRoster>>,
    pub callbacks: Arc<CallbackDispatcher>,
    pub session_context: SessionContext,
    pub channel_tx: mpsc::UnboundedSender<ChannelEnvelope>,
    /// Dropping it stops the event loop.
    pub _stop: oneshot::Sender<()>,
}

pub(crate) type StateGuard<'a> = (
    ReentrantMutexGuard<'a, RefCell<SessionMap>>,
    ReentrantMutexGuard<'a, RefCell<RoomRoster>>,
);

impl Inner {
    pub fn lock_state(&self) -> StateGuard<'_> {
        let sessions = self.sessions.lock();
        let roster = self.roster.lock();
        (sessions, roster)
    }

    pub fn session(&self, peer_id: &str) -> Option<Arc<SessionHandler>> {
        let sessions = self.sessions.lock();
        let handler = sessions.borrow().get(peer_id).cloned();
        handler
    }

    pub fn has_session(&self, peer_id: &str) -> bool {
        let sessions = self.sessions.lock();
        let found = sessions.borrow().contains_key(peer_id);
        found
    }

    /// Panics if the peer already has a session.
    pub fn insert_session(&self, handler: Arc<SessionHandler>) {
        let sessions = self.sessions.lock();
        let mut map = sessions.borrow_mut();
        let peer_id = handler.peer_id().to_owned();
        assert!(
            !map.contains_key(&peer_id),
            "duplicate session for peer {peer_id:?}"
        );
        map.insert(peer_id, handler);
    }

    pub fn take_session(&self, peer_id: &str) -> Option<Arc<SessionHandler>> {
        let sessions = self.sessions.lock();
        let handler = sessions.borrow_mut().remove(peer_id);
        handler
    }

    /// Removes `handler` unless its peer has been given a newer session.
    pub fn take_if_current(&self, handler: &Arc<SessionHandler>) -> bool {
        let sessions = self.sessions.lock();
        let mut map = sessions.borrow_mut();
        match map.get(handler.peer_id()) {
            Some(current) if Arc::ptr_eq(current, handler) => {
                map.remove(handler.peer_id());
                true
            }
            _ => false,
        }
    }

    pub fn take_all_sessions(&self) -> Vec<Arc<SessionHandler>> {
        let sessions = self.sessions.lock();
        let taken = std::mem::take(&mut *sessions.borrow_mut());
        taken.into_values().collect()
    }

    /// Closes the handlers, firing each owed disconnect callback. Returns
    /// whether there was anything to close.
    pub fn close_sessions(&self, handlers: Vec<Arc<SessionHandler>>) -> bool {
        let closed_any = !handlers.is_empty();
        for handler in handlers {
            handler.close();
        }
        closed_any
    }

    pub fn connected_ids(&self) -> HashSet<String> {
        let sessions = self.sessions.lock();
        let ids = sessions.borrow().keys().cloned().collect();
        ids
    }

    pub fn room_clients(&self) -> Vec<RoomClient> {
        let (_sessions, roster) = self.lock_state();
        let connected = self.connected_ids();
        let local_id = self.link.session_id();
        let view = roster.borrow().view(&connected, local_id.as_deref());
        view
    }

    pub fn room_client(&self, id: &str) -> Result<RoomClient> {
        let (_sessions, roster) = self.lock_state();
        let connected = self.connected_ids();
        let local_id = self.link.session_id();
        let client = roster.borrow().room_client(id, &connected, local_id.as_deref())?;
        Ok(client)
    }

    pub fn notify_room_clients(&self) {
        let _state = self.lock_state();
        if !self.link.is_joined() {
            debug!("Not joined, skipping room clients notification");
            return;
        }
        let view = self.room_clients();
        self.callbacks.room_clients_changed(&view);
    }

    /// The connection `generation` is still attached and joined to the room.
    /// User callbacks may reenter `close_sync`, so handlers re-check this
    /// after every callback before touching state again.
    pub fn is_live(&self, generation: u64) -> bool {
        self.link.is_current(generation) && self.link.is_joined()
    }

    /// Roster entry for `id`, or a placeholder when the roster does not know it.
    pub fn roster_client(&self, id: &str) -> Client {
        let roster = self.roster.lock();
        let client = roster.borrow().get(id).cloned().unwrap_or_else(|_| Client::unknown(id));
        client
    }

    pub fn connect(&self) {
        let _state = self.lock_state();
        if self.link.has_channel() {
            info!("Signaling channel already open, ignoring connect");
            return;
        }

        let generation = self.link.next_generation();
        let events = ChannelEventSender::new(generation, self.channel_tx.clone());
        info!("Connecting to {} (generation {})", self.config.url, generation);

        match self.connector.connect(&self.config, events) {
            Ok(channel) => {
                if !self.link.attach(generation, Arc::clone(&channel)) {
                    debug!("Connection generation {} superseded", generation);
                    channel.close();
                }
            }
            Err(e) => {
                error!("Failed to open signaling channel: {}", e);
                self.callbacks.signaling_connection_error(&e.to_string());
            }
        }
    }

    pub fn call_ids<S: AsRef<str>>(&self, ids: &[S]) -> Result<()> {
        let _state = self.lock_state();
        let local_id = match self.link.session_id() {
            Some(id) if self.link.is_joined() => id,
            _ => return Err(Error::Transport("not joined to a room".to_owned())),
        };

        for id in ids {
            // An error callback may have closed the orchestrator.
            if !self.link.is_joined() {
                break;
            }
            let id = id.as_ref();
            if id == local_id || self.has_session(id) {
                debug!("Not calling {:?}: local client or session exists", id);
                continue;
            }

            let handler = match SessionHandler::new(self.roster_client(id), true, &self.session_context) {
                Ok(handler) => Arc::new(handler),
                Err(e) => {
                    error!("Failed to create session for {:?}: {}", id, e);
                    self.callbacks.error(&e.to_string());
                    continue;
                }
            };
            self.insert_session(Arc::clone(&handler));

            if let Err(e) = handler.make_peer_call() {
                self.take_if_current(&handler);
                handler.discard();
                self.callbacks.error(&e.to_string());
            }
        }
        Ok(())
    }

    pub fn call_all(&self) -> Result<()> {
        let _state = self.lock_state();
        let ids = self.roster.lock().borrow().ids();
        self.call_ids(&ids)
    }

    pub fn hang_up_all(&self) {
        let _state = self.lock_state();
        let handlers = self.take_all_sessions();
        info!("Hanging up {} session(s)", handlers.len());
        if self.close_sessions(handlers) {
            self.notify_room_clients();
        }
    }

    /// Tears down the channel, every session and the roster.
    ///
    /// With `expected_generation` set, nothing happens if a newer connection
    /// has been started since.
    pub fn shutdown(&self, expected_generation: Option<u64>) {
        let (_sessions, roster) = self.lock_state();
        if let Some(generation) = expected_generation {
            if !self.link.is_current(generation) {
                debug!("Skipping close of superseded generation {}", generation);
                return;
            }
        }

        let channel = self.link.detach();
        if let Some(channel) = &channel {
            channel.close();
        }
        self.close_sessions(self.take_all_sessions());
        roster.borrow_mut().clear();

        if channel.is_some() {
            info!("Signaling channel closed");
            self.callbacks.signaling_connection_closed();
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(channel) = self.link.detach() {
            channel.close();
        }
        // Dropped without close: release everything silently.
        let handlers = std::mem::take(self.sessions.get_mut().get_mut());
        for handler in handlers.into_values() {
            handler.discard();
        }
    }
}
