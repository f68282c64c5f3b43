use huddle_core::model::{Client, RoomClient};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RosterError {
    #[error("room client `{0}` not found")]
    NotFound(String),
}

/// Current membership of the room as last announced by the signaling server.
///
/// The roster is replaced wholesale on every update and knows nothing about
/// peer sessions; connection flags are derived at read time from the set of
/// ids the caller passes in.
#[derive(Debug, Default, Clone)]
pub struct RoomRoster {
    clients: Vec<Client>,
    index: HashMap<String, usize>,
}

impl RoomRoster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the whole roster. The first occurrence of a repeated id wins.
    pub fn replace(&mut self, clients: Vec<Client>) {
        let mut index = HashMap::with_capacity(clients.len());
        let mut kept = Vec::with_capacity(clients.len());

        for client in clients {
            if index.contains_key(&client.id) {
                continue;
            }
            index.insert(client.id.clone(), kept.len());
            kept.push(client);
        }

        self.clients = kept;
        self.index = index;
    }

    pub fn get(&self, id: &str) -> Result<&Client, RosterError> {
        self.index
            .get(id)
            .map(|&i| &self.clients[i])
            .ok_or_else(|| RosterError::NotFound(id.to_owned()))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn ids(&self) -> Vec<String> {
        self.clients.iter().map(|c| c.id.clone()).collect()
    }

    /// Room clients in roster order, flagged connected when they have a live
    /// session or are the local client.
    pub fn view(&self, connected: &HashSet<String>, local_id: Option<&str>) -> Vec<RoomClient> {
        self.clients
            .iter()
            .map(|c| RoomClient::new(c, is_connected(&c.id, connected, local_id)))
            .collect()
    }

    pub fn room_client(
        &self,
        id: &str,
        connected: &HashSet<String>,
        local_id: Option<&str>,
    ) -> Result<RoomClient, RosterError> {
        let client = self.get(id)?;
        Ok(RoomClient::new(client, is_connected(id, connected, local_id)))
    }

    pub fn clear(&mut self) {
        self.clients.clear();
        self.index.clear();
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

fn is_connected(id: &str, connected: &HashSet<String>, local_id: Option<&str>) -> bool {
    connected.contains(id) || local_id == Some(id)
}
