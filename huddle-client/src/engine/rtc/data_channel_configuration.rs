use serde::{Deserialize, Serialize};
use webrtc::data_channel::data_channel_init::RTCDataChannelInit;

/// Reliability settings for the data channel a caller opens.
///
/// `max_packet_life_time` and `max_retransmits` are mutually exclusive;
/// setting one through its builder clears the other.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataChannelConfiguration {
    pub ordered: bool,
    pub max_packet_life_time: Option<u16>,
    pub max_retransmits: Option<u16>,
    pub protocol: String,
}

impl Default for DataChannelConfiguration {
    fn default() -> Self {
        Self {
            ordered: true,
            max_packet_life_time: None,
            max_retransmits: None,
            protocol: String::new(),
        }
    }
}

impl DataChannelConfiguration {
    pub fn with_ordered(mut self, ordered: bool) -> Self {
        self.ordered = ordered;
        self
    }

    /// Milliseconds a message may stay unacknowledged before it is dropped.
    pub fn with_max_packet_life_time(mut self, millis: u16) -> Self {
        self.max_packet_life_time = Some(millis);
        self.max_retransmits = None;
        self
    }

    pub fn with_max_retransmits(mut self, retransmits: u16) -> Self {
        self.max_retransmits = Some(retransmits);
        self.max_packet_life_time = None;
        self
    }

    pub fn with_protocol(mut self, protocol: impl Into<String>) -> Self {
        self.protocol = protocol.into();
        self
    }
}

impl From<&DataChannelConfiguration> for RTCDataChannelInit {
    fn from(config: &DataChannelConfiguration) -> Self {
        RTCDataChannelInit {
            ordered: Some(config.ordered),
            max_packet_life_time: config.max_packet_life_time,
            max_retransmits: config.max_retransmits,
            protocol: (!config.protocol.is_empty()).then(|| config.protocol.clone()),
            ..Default::default()
        }
    }
}
