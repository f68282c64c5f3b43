use huddle_core::model::{Client, RoomClient};
use parking_lot::ReentrantMutex;
use std::cell::RefCell;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use tracing::warn;

pub type ConnectionCallback = Arc<dyn Fn() + Send + Sync>;
pub type ErrorCallback = Arc<dyn Fn(&str) + Send + Sync>;
pub type RoomClientsCallback = Arc<dyn Fn(&[RoomClient]) + Send + Sync>;
pub type CallAcceptor = Arc<dyn Fn(&Client) -> bool + Send + Sync>;
pub type ClientCallback = Arc<dyn Fn(&Client) + Send + Sync>;

#[derive(Default)]
struct Slots {
    signaling_connection_opened: Option<ConnectionCallback>,
    signaling_connection_closed: Option<ConnectionCallback>,
    signaling_connection_error: Option<ErrorCallback>,
    room_clients_changed: Option<RoomClientsCallback>,
    call_acceptor: Option<CallAcceptor>,
    call_rejected: Option<ClientCallback>,
    client_connected: Option<ClientCallback>,
    client_disconnected: Option<ClientCallback>,
    error: Option<ErrorCallback>,
}

/// Holds the user callbacks, one slot per kind.
///
/// Every invocation runs synchronously on the calling thread while the
/// reentrant callback lock is held. The callback is cloned out of its slot
/// before it runs, so it may register callbacks or call back into the
/// orchestrator.
#[derive(Default)]
pub struct CallbackDispatcher {
    slots: ReentrantMutex<RefCell<Slots>>,
}

impl CallbackDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    fn set(&self, assign: impl FnOnce(&mut Slots)) {
        let guard = self.slots.lock();
        assign(&mut guard.borrow_mut());
    }

    fn slot<T>(&self, select: impl FnOnce(&Slots) -> Option<T>) -> Option<T> {
        let guard = self.slots.lock();
        let slot = select(&guard.borrow());
        slot
    }

    pub fn set_on_signaling_connection_opened(&self, callback: ConnectionCallback) {
        self.set(|s| s.signaling_connection_opened = Some(callback));
    }

    pub fn set_on_signaling_connection_closed(&self, callback: ConnectionCallback) {
        self.set(|s| s.signaling_connection_closed = Some(callback));
    }

    pub fn set_on_signaling_connection_error(&self, callback: ErrorCallback) {
        self.set(|s| s.signaling_connection_error = Some(callback));
    }

    pub fn set_on_room_clients_changed(&self, callback: RoomClientsCallback) {
        self.set(|s| s.room_clients_changed = Some(callback));
    }

    pub fn set_call_acceptor(&self, callback: CallAcceptor) {
        self.set(|s| s.call_acceptor = Some(callback));
    }

    pub fn set_on_call_rejected(&self, callback: ClientCallback) {
        self.set(|s| s.call_rejected = Some(callback));
    }

    pub fn set_on_client_connected(&self, callback: ClientCallback) {
        self.set(|s| s.client_connected = Some(callback));
    }

    pub fn set_on_client_disconnected(&self, callback: ClientCallback) {
        self.set(|s| s.client_disconnected = Some(callback));
    }

    pub fn set_on_error(&self, callback: ErrorCallback) {
        self.set(|s| s.error = Some(callback));
    }

    pub fn signaling_connection_opened(&self) {
        let _guard = self.slots.lock();
        if let Some(callback) = self.slot(|s| s.signaling_connection_opened.clone()) {
            callback();
        }
    }

    pub fn signaling_connection_closed(&self) {
        let _guard = self.slots.lock();
        if let Some(callback) = self.slot(|s| s.signaling_connection_closed.clone()) {
            callback();
        }
    }

    pub fn signaling_connection_error(&self, error: &str) {
        let _guard = self.slots.lock();
        if let Some(callback) = self.slot(|s| s.signaling_connection_error.clone()) {
            callback(error);
        }
    }

    pub fn room_clients_changed(&self, clients: &[RoomClient]) {
        let _guard = self.slots.lock();
        if let Some(callback) = self.slot(|s| s.room_clients_changed.clone()) {
            callback(clients);
        }
    }

    pub fn call_rejected(&self, client: &Client) {
        let _guard = self.slots.lock();
        if let Some(callback) = self.slot(|s| s.call_rejected.clone()) {
            callback(client);
        }
    }

    pub fn client_connected(&self, client: &Client) {
        let _guard = self.slots.lock();
        if let Some(callback) = self.slot(|s| s.client_connected.clone()) {
            callback(client);
        }
    }

    pub fn client_disconnected(&self, client: &Client) {
        let _guard = self.slots.lock();
        if let Some(callback) = self.slot(|s| s.client_disconnected.clone()) {
            callback(client);
        }
    }

    pub fn error(&self, error: &str) {
        let _guard = self.slots.lock();
        if let Some(callback) = self.slot(|s| s.error.clone()) {
            callback(error);
        }
    }

    /// Asks the call acceptor about an incoming call. Without an acceptor
    /// every call is accepted; a panicking acceptor counts as a rejection.
    pub fn accept_call(&self, client: &Client) -> bool {
        let _guard = self.slots.lock();
        let Some(acceptor) = self.slot(|s| s.call_acceptor.clone()) else {
            return true;
        };

        catch_unwind(AssertUnwindSafe(|| acceptor(client))).unwrap_or_else(|_| {
            warn!("Call acceptor panicked for {:?}, rejecting the call", client.id);
            false
        })
    }
}
