use crate::model::ParseError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceServer {
    pub urls: Vec<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub credential: Option<String>,
}

impl IceServer {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            urls: vec![url.into()],
            username: None,
            credential: None,
        }
    }

    pub fn with_credentials(
        urls: Vec<String>,
        username: impl Into<String>,
        credential: impl Into<String>,
    ) -> Self {
        Self {
            urls,
            username: Some(username.into()),
            credential: Some(credential.into()),
        }
    }
}

/// Where and as whom to join a room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalingServerConfig {
    pub url: String,
    pub client_name: String,
    #[serde(default)]
    pub client_data: Value,
    pub room: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub ice_servers: Vec<IceServer>,
}

impl SignalingServerConfig {
    pub fn new(
        url: impl Into<String>,
        client_name: impl Into<String>,
        room: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            client_name: client_name.into(),
            client_data: Value::Null,
            room: room.into(),
            password: String::new(),
            ice_servers: Vec::new(),
        }
    }

    pub fn with_client_data(mut self, client_data: Value) -> Self {
        self.client_data = client_data;
        self
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = password.into();
        self
    }

    pub fn with_ice_servers(mut self, ice_servers: Vec<IceServer>) -> Self {
        self.ice_servers = ice_servers;
        self
    }

    pub fn validate(&self) -> Result<(), ParseError> {
        let url = Url::parse(&self.url).map_err(|e| ParseError::InvalidUrl {
            url: self.url.clone(),
            reason: e.to_string(),
        })?;
        if !matches!(url.scheme(), "ws" | "wss" | "http" | "https") {
            return Err(ParseError::InvalidUrl {
                url: self.url.clone(),
                reason: format!("unsupported scheme `{}`", url.scheme()),
            });
        }
        if self.client_name.is_empty() {
            return Err(ParseError::EmptyField("client name"));
        }
        if self.room.is_empty() {
            return Err(ParseError::EmptyField("room"));
        }
        Ok(())
    }
}
