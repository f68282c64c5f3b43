use crate::model::{Client, IceCandidate, ParseError, SessionDescription};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Events sent by the client to the signaling server.
///
/// On the wire each event is `{"event": "<kebab-case name>", "data": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "kebab-case",
    rename_all_fields = "camelCase"
)]
pub enum OutgoingEvent {
    JoinRoom {
        name: String,
        data: Value,
        room: String,
        password: String,
    },
    CallPeer {
        to_id: String,
        offer: SessionDescription,
    },
    MakePeerCallAnswer {
        to_id: String,
        answer: SessionDescription,
    },
    SendIceCandidate {
        to_id: String,
        candidate: IceCandidate,
    },
    CallRejected {
        to_id: String,
    },
    CloseAllPeerConnectionsRequest {},
}

impl OutgoingEvent {
    pub fn name(&self) -> &'static str {
        match self {
            OutgoingEvent::JoinRoom { .. } => "join-room",
            OutgoingEvent::CallPeer { .. } => "call-peer",
            OutgoingEvent::MakePeerCallAnswer { .. } => "make-peer-call-answer",
            OutgoingEvent::SendIceCandidate { .. } => "send-ice-candidate",
            OutgoingEvent::CallRejected { .. } => "call-rejected",
            OutgoingEvent::CloseAllPeerConnectionsRequest {} => "close-all-peer-connections-request",
        }
    }

    /// Peer the event is addressed to, if it is peer-to-peer.
    pub fn to_id(&self) -> Option<&str> {
        match self {
            OutgoingEvent::CallPeer { to_id, .. }
            | OutgoingEvent::MakePeerCallAnswer { to_id, .. }
            | OutgoingEvent::SendIceCandidate { to_id, .. }
            | OutgoingEvent::CallRejected { to_id } => Some(to_id),
            _ => None,
        }
    }
}

/// Events delivered by the signaling server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "kebab-case",
    rename_all_fields = "camelCase"
)]
pub enum IncomingEvent {
    /// Acknowledgement of `join-room`.
    JoinRoom {
        is_joined: bool,
        #[serde(default)]
        id: String,
        #[serde(default)]
        clients: Option<Vec<Client>>,
    },
    RoomClients(Vec<Client>),
    MakePeerCall {
        ids: Vec<String>,
    },
    CallPeer {
        from_id: String,
        offer: SessionDescription,
    },
    MakePeerCallAnswer {
        from_id: String,
        answer: SessionDescription,
    },
    SendIceCandidate {
        from_id: String,
        /// A `null` candidate ends gathering.
        #[serde(default, deserialize_with = "null_as_end_of_candidates")]
        candidate: IceCandidate,
    },
    CallRejected {
        from_id: String,
    },
    CloseAllPeerConnectionsRequest {
        from_id: String,
    },
}

fn null_as_end_of_candidates<'de, D>(deserializer: D) -> Result<IceCandidate, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<IceCandidate>::deserialize(deserializer)?.unwrap_or_default())
}

impl IncomingEvent {
    pub const NAMES: [&'static str; 8] = [
        "join-room",
        "room-clients",
        "make-peer-call",
        "call-peer",
        "make-peer-call-answer",
        "send-ice-candidate",
        "call-rejected",
        "close-all-peer-connections-request",
    ];

    /// Decodes one text frame.
    ///
    /// A frame naming a known event with an undecodable payload yields
    /// [`ParseError::InvalidPayload`], so callers can tell a broken
    /// negotiation message apart from noise on the wire.
    pub fn from_frame(text: &str) -> Result<Self, ParseError> {
        let value: Value =
            serde_json::from_str(text).map_err(|e| ParseError::MalformedFrame(e.to_string()))?;
        let event = value
            .get("event")
            .and_then(Value::as_str)
            .ok_or_else(|| ParseError::MalformedFrame("missing event name".to_owned()))?
            .to_owned();
        if !Self::NAMES.contains(&event.as_str()) {
            return Err(ParseError::UnknownEvent(event));
        }

        serde_json::from_value(value).map_err(|e| ParseError::InvalidPayload {
            event,
            reason: e.to_string(),
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            IncomingEvent::JoinRoom { .. } => "join-room",
            IncomingEvent::RoomClients(_) => "room-clients",
            IncomingEvent::MakePeerCall { .. } => "make-peer-call",
            IncomingEvent::CallPeer { .. } => "call-peer",
            IncomingEvent::MakePeerCallAnswer { .. } => "make-peer-call-answer",
            IncomingEvent::SendIceCandidate { .. } => "send-ice-candidate",
            IncomingEvent::CallRejected { .. } => "call-rejected",
            IncomingEvent::CloseAllPeerConnectionsRequest { .. } => {
                "close-all-peer-connections-request"
            }
        }
    }
}
