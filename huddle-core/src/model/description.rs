use crate::model::ParseError;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SdpType {
    Offer,
    Answer,
}

impl fmt::Display for SdpType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SdpType::Offer => f.write_str("offer"),
            SdpType::Answer => f.write_str("answer"),
        }
    }
}

/// SDP offer or answer, as carried by `call-peer` and `make-peer-call-answer`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescription {
    #[serde(rename = "type")]
    pub kind: SdpType,
    pub sdp: String,
}

impl SessionDescription {
    /// Structural check of an SDP blob. Full parsing is the engine's job,
    /// this only rejects payloads that cannot possibly be SDP.
    pub fn parse(kind: SdpType, sdp: impl Into<String>) -> Result<Self, ParseError> {
        let sdp = sdp.into();
        let mut lines = sdp.lines().enumerate().filter(|(_, l)| !l.trim().is_empty());

        let Some((_, first)) = lines.next() else {
            return Err(ParseError::EmptyDescription);
        };
        if !first.starts_with("v=") {
            return Err(ParseError::MissingVersion(first.to_owned()));
        }

        for (index, line) in lines {
            let bytes = line.as_bytes();
            if bytes.len() < 2 || !bytes[0].is_ascii_alphabetic() || bytes[1] != b'=' {
                return Err(ParseError::MalformedLine {
                    line: index + 1,
                    content: line.to_owned(),
                });
            }
        }

        Ok(Self { kind, sdp })
    }

    pub fn offer(sdp: impl Into<String>) -> Result<Self, ParseError> {
        Self::parse(SdpType::Offer, sdp)
    }

    pub fn answer(sdp: impl Into<String>) -> Result<Self, ParseError> {
        Self::parse(SdpType::Answer, sdp)
    }
}

/// Trickle ICE candidate as exchanged through `send-ice-candidate`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceCandidate {
    #[serde(rename = "sdpMid", default)]
    pub sdp_mid: Option<String>,
    #[serde(rename = "sdpMLineIndex", default)]
    pub sdp_m_line_index: Option<u16>,
    /// Empty, or `null` on the wire, marks the end of candidates.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub candidate: String,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

impl IceCandidate {
    /// Returns `Ok(None)` for the empty end-of-candidates marker.
    pub fn parse(
        sdp_mid: Option<String>,
        sdp_m_line_index: Option<u16>,
        candidate: &str,
    ) -> Result<Option<Self>, ParseError> {
        let trimmed = candidate.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }

        let line = trimmed.strip_prefix("a=").unwrap_or(trimmed);
        let Some(attributes) = line.strip_prefix("candidate:") else {
            return Err(ParseError::MalformedCandidate(candidate.to_owned()));
        };
        // foundation, component, transport, priority, address, port, "typ", type
        if attributes.split_whitespace().count() < 8 {
            return Err(ParseError::MalformedCandidate(candidate.to_owned()));
        }

        Ok(Some(Self {
            sdp_mid,
            sdp_m_line_index,
            candidate: line.to_owned(),
        }))
    }
}
