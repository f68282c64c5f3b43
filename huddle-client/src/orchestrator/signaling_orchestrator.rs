use crate::callback::CallbackDispatcher;
use crate::engine::PeerEngine;
use crate::error::{Error, Result};
use crate::orchestrator::event_loop;
use crate::orchestrator::orchestrator_state::Inner;
use crate::roster::RoomRoster;
use crate::session::{NegotiationState, SessionContext};
use crate::signaling::{SignalingConnector, SignalingLink};
use huddle_core::model::{Client, OutgoingEvent, RoomClient, SignalingServerConfig};
use parking_lot::ReentrantMutex;
use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use tracing::info;

/// Client side of a signaling room.
///
/// Joins a room through a [`SignalingConnector`], keeps the roster, and runs
/// one negotiation per remote peer on a [`PeerEngine`]. Results are reported
/// through the callbacks registered with the `set_*` methods; they run
/// synchronously on whichever thread triggered them and may call back into
/// the orchestrator.
///
/// The handle is cheap to clone. It must be created inside a tokio runtime.
#[derive(Clone)]
pub struct SignalingOrchestrator {
    inner: Arc<Inner>,
}

impl SignalingOrchestrator {
    pub fn new(
        config: SignalingServerConfig,
        engine: Arc<dyn PeerEngine>,
        connector: Arc<dyn SignalingConnector>,
    ) -> Result<Self> {
        config.validate().map_err(Error::Config)?;
        let runtime = Handle::try_current().map_err(|_| Error::NoRuntime)?;

        let (channel_tx, channel_rx) = mpsc::unbounded_channel();
        let (engine_tx, engine_rx) = mpsc::unbounded_channel();
        let (stop_tx, stop_rx) = oneshot::channel();

        let link = SignalingLink::new();
        let callbacks = Arc::new(CallbackDispatcher::new());
        let session_context = SessionContext {
            engine,
            ice_servers: config.ice_servers.clone(),
            engine_events: engine_tx,
            link: link.clone(),
            callbacks: Arc::clone(&callbacks),
        };

        let inner = Arc::new(Inner {
            config,
            connector,
            runtime: runtime.clone(),
            link,
            sessions: ReentrantMutex::new(RefCell::new(HashMap::new())),
            roster: ReentrantMutex::new(RefCell::new(RoomRoster::new())),
            callbacks,
            session_context,
            channel_tx,
            _stop: stop_tx,
        });

        runtime.spawn(event_loop::run(
            Arc::downgrade(&inner),
            channel_rx,
            engine_rx,
            stop_rx,
        ));

        Ok(Self { inner })
    }

    pub fn config(&self) -> &SignalingServerConfig {
        &self.inner.config
    }

    /// Opens the signaling channel and joins the room. Returns immediately;
    /// the outcome arrives through the connection callbacks.
    pub fn connect(&self) {
        self.inner.connect();
    }

    /// Tears everything down in the background.
    ///
    /// A connection opened by a later [`connect`](Self::connect) is left
    /// alone.
    pub fn close(&self) {
        let generation = self.inner.link.generation();
        let inner = Arc::clone(&self.inner);
        self.inner
            .runtime
            .spawn_blocking(move || inner.shutdown(Some(generation)));
    }

    /// Tears everything down before returning. Disconnect and
    /// connection-closed callbacks fire on this thread; none fire afterwards
    /// until the next [`connect`](Self::connect).
    pub fn close_sync(&self) {
        self.inner.shutdown(None);
    }

    /// Calls every room client that has no session yet.
    pub fn call_all(&self) -> Result<()> {
        self.inner.call_all()
    }

    /// Calls the given clients, skipping ourselves and peers that already
    /// have a session. Ids missing from the roster are called anyway.
    pub fn call_ids<S: AsRef<str>>(&self, ids: &[S]) -> Result<()> {
        self.inner.call_ids(ids)
    }

    /// Ends every peer session but stays in the room.
    pub fn hang_up_all(&self) {
        self.inner.hang_up_all();
    }

    /// Asks every room client to drop its session with us, then hangs up.
    pub fn close_all_room_peer_connections(&self) -> Result<()> {
        let _state = self.inner.lock_state();
        info!("Closing all room peer connections");
        let sent = self
            .inner
            .link
            .send(OutgoingEvent::CloseAllPeerConnectionsRequest {});
        self.inner.hang_up_all();
        sent
    }

    /// Whether the room has been joined.
    pub fn is_connected(&self) -> bool {
        self.inner.link.is_joined()
    }

    /// Whether at least one peer session exists.
    pub fn is_rtc_connected(&self) -> bool {
        !self.inner.connected_ids().is_empty()
    }

    /// Our id in the room, once joined.
    pub fn id(&self) -> Option<String> {
        self.inner.link.session_id()
    }

    pub fn get_connected_room_client_ids(&self) -> Vec<String> {
        let mut ids: Vec<_> = self.inner.connected_ids().into_iter().collect();
        ids.sort();
        ids
    }

    pub fn get_room_client(&self, id: &str) -> Result<RoomClient> {
        self.inner.room_client(id)
    }

    pub fn get_room_clients(&self) -> Vec<RoomClient> {
        self.inner.room_clients()
    }

    pub fn get_session_state(&self, id: &str) -> Option<NegotiationState> {
        self.inner.session(id).map(|handler| handler.state())
    }

    pub fn set_on_signaling_connection_opened(&self, callback: impl Fn() + Send + Sync + 'static) {
        self.inner
            .callbacks
            .set_on_signaling_connection_opened(Arc::new(callback));
    }

    pub fn set_on_signaling_connection_closed(&self, callback: impl Fn() + Send + Sync + 'static) {
        self.inner
            .callbacks
            .set_on_signaling_connection_closed(Arc::new(callback));
    }

    pub fn set_on_signaling_connection_error(
        &self,
        callback: impl Fn(&str) + Send + Sync + 'static,
    ) {
        self.inner
            .callbacks
            .set_on_signaling_connection_error(Arc::new(callback));
    }

    pub fn set_on_room_clients_changed(
        &self,
        callback: impl Fn(&[RoomClient]) + Send + Sync + 'static,
    ) {
        self.inner
            .callbacks
            .set_on_room_clients_changed(Arc::new(callback));
    }

    /// Decides whether to answer an incoming call. Without one, every call
    /// is accepted.
    pub fn set_call_acceptor(&self, acceptor: impl Fn(&Client) -> bool + Send + Sync + 'static) {
        self.inner.callbacks.set_call_acceptor(Arc::new(acceptor));
    }

    pub fn set_on_call_rejected(&self, callback: impl Fn(&Client) + Send + Sync + 'static) {
        self.inner.callbacks.set_on_call_rejected(Arc::new(callback));
    }

    pub fn set_on_client_connected(&self, callback: impl Fn(&Client) + Send + Sync + 'static) {
        self.inner
            .callbacks
            .set_on_client_connected(Arc::new(callback));
    }

    pub fn set_on_client_disconnected(&self, callback: impl Fn(&Client) + Send + Sync + 'static) {
        self.inner
            .callbacks
            .set_on_client_disconnected(Arc::new(callback));
    }

    pub fn set_on_error(&self, callback: impl Fn(&str) + Send + Sync + 'static) {
        self.inner.callbacks.set_on_error(Arc::new(callback));
    }
}
