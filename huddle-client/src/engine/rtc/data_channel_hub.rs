use anyhow::{Context, Result};
use bytes::Bytes;
use dashmap::DashMap;
use huddle_core::model::SessionId;
use std::sync::Arc;
use tracing::error;
use webrtc::data_channel::RTCDataChannel;

/// Open data channels, one per connected peer.
///
/// Cheap to clone and safe to share between threads.
#[derive(Clone, Default)]
pub struct DataChannelHub {
    channels: Arc<DashMap<String, (SessionId, Arc<RTCDataChannel>)>>,
}

impl DataChannelHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&self, peer_id: &str, session_id: SessionId, channel: Arc<RTCDataChannel>) {
        self.channels.insert(peer_id.to_owned(), (session_id, channel));
    }

    /// Forgets the peer's channel if it still belongs to `session_id`.
    pub(crate) fn remove(&self, peer_id: &str, session_id: SessionId) {
        self.channels.remove_if(peer_id, |_, (owner, _)| *owner == session_id);
    }

    /// Sends a binary message to one peer.
    pub async fn send(&self, peer_id: &str, data: Bytes) -> Result<()> {
        // The map guard must not live across the await.
        let channel = self
            .channels
            .get(peer_id)
            .map(|entry| Arc::clone(&entry.value().1))
            .with_context(|| format!("no open data channel to {peer_id:?}"))?;

        channel
            .send(&data)
            .await
            .with_context(|| format!("failed to send to {peer_id:?}"))?;
        Ok(())
    }

    /// Sends a binary message to every peer with an open channel.
    pub async fn broadcast(&self, data: Bytes) {
        let channels: Vec<_> = self
            .channels
            .iter()
            .map(|entry| (entry.key().clone(), Arc::clone(&entry.value().1)))
            .collect();

        for (peer_id, channel) in channels {
            if let Err(e) = channel.send(&data).await {
                error!("Broadcast to {:?} failed: {}", peer_id, e);
            }
        }
    }

    pub fn peer_ids(&self) -> Vec<String> {
        let mut ids: Vec<_> = self.channels.iter().map(|entry| entry.key().clone()).collect();
        ids.sort();
        ids
    }

    pub fn contains(&self, peer_id: &str) -> bool {
        self.channels.contains_key(peer_id)
    }
}
