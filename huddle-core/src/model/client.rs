use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A room participant as reported by the signaling server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Client {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub data: Value,
}

impl Client {
    pub fn new(id: impl Into<String>, name: impl Into<String>, data: Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            data,
        }
    }

    /// Stand-in for an id the roster does not know (yet).
    pub fn unknown(id: impl Into<String>) -> Self {
        Self::new(id, String::new(), Value::Null)
    }
}

/// A [`Client`] together with whether a peer session exists for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomClient {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub data: Value,
    pub is_connected: bool,
}

impl RoomClient {
    pub fn new(client: &Client, is_connected: bool) -> Self {
        Self {
            id: client.id.clone(),
            name: client.name.clone(),
            data: client.data.clone(),
            is_connected,
        }
    }

    pub fn client(&self) -> Client {
        Client::new(self.id.clone(), self.name.clone(), self.data.clone())
    }
}
