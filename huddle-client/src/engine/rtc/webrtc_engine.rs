use super::session_worker::{SessionCommand, SessionWorker};
use crate::engine::{DataChannelConfiguration, DataChannelHub, EngineError, PeerEngine, PeerSession, SessionRequest};
use anyhow::{Context, Result};
use bytes::Bytes;
use huddle_core::model::{IceCandidate, SessionDescription};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::info;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::{API, APIBuilder};
use webrtc::interceptor::registry::Registry;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebRtcEngineConfig {
    /// Channel the caller opens so its offer carries an application section.
    /// `None` negotiates without a data channel.
    pub data_channel: Option<DataChannelConfiguration>,
    pub data_channel_label: String,
}

impl Default for WebRtcEngineConfig {
    fn default() -> Self {
        Self {
            data_channel: Some(DataChannelConfiguration::default()),
            data_channel_label: "data".to_owned(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DataChannelEvent {
    Open { peer_id: String },
    Message { peer_id: String, data: Bytes },
    Closed { peer_id: String },
}

/// [`PeerEngine`] backed by the `webrtc` crate.
///
/// Every session runs as its own task on the runtime the engine was created
/// in and owns one `RTCPeerConnection`.
pub struct WebRtcEngine {
    api: Arc<API>,
    config: WebRtcEngineConfig,
    runtime: Handle,
    hub: DataChannelHub,
    data_events: Option<mpsc::UnboundedSender<DataChannelEvent>>,
}

impl WebRtcEngine {
    pub fn new(config: WebRtcEngineConfig) -> Result<Self> {
        let runtime = Handle::try_current().context("WebRtcEngine needs a tokio runtime")?;

        let mut media = MediaEngine::default();
        media.register_default_codecs()?;
        let registry = register_default_interceptors(Registry::new(), &mut media)?;

        let api = APIBuilder::new()
            .with_media_engine(media)
            .with_interceptor_registry(registry)
            .build();

        Ok(Self {
            api: Arc::new(api),
            config,
            runtime,
            hub: DataChannelHub::new(),
            data_events: None,
        })
    }

    /// Like [`new`](Self::new), also surfacing data channel traffic.
    pub fn with_data_events(
        config: WebRtcEngineConfig,
    ) -> Result<(Self, mpsc::UnboundedReceiver<DataChannelEvent>)> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut engine = Self::new(config)?;
        engine.data_events = Some(tx);
        Ok((engine, rx))
    }

    pub fn data_channels(&self) -> DataChannelHub {
        self.hub.clone()
    }
}

impl PeerEngine for WebRtcEngine {
    fn create_session(&self, request: SessionRequest) -> Result<Arc<dyn PeerSession>, EngineError> {
        let (commands, command_rx) = mpsc::unbounded_channel();

        info!(
            "Opening peer session {} for {:?} (caller: {})",
            request.events.session_id(),
            request.peer_id,
            request.is_caller
        );

        let worker = SessionWorker {
            api: Arc::clone(&self.api),
            peer_id: request.peer_id,
            is_caller: request.is_caller,
            ice_servers: request.ice_servers,
            events: request.events,
            data_channel: self.config.data_channel.clone(),
            data_channel_label: self.config.data_channel_label.clone(),
            hub: self.hub.clone(),
            data_events: self.data_events.clone(),
        };
        self.runtime.spawn(worker.run(command_rx));

        Ok(Arc::new(WebRtcSession {
            commands,
            closed: AtomicBool::new(false),
        }))
    }
}

struct WebRtcSession {
    commands: mpsc::UnboundedSender<SessionCommand>,
    closed: AtomicBool,
}

impl WebRtcSession {
    fn submit(&self, command: SessionCommand) {
        if self.closed.load(Ordering::Acquire) {
            return;
        }
        let _ = self.commands.send(command);
    }
}

impl PeerSession for WebRtcSession {
    fn create_offer(&self) {
        self.submit(SessionCommand::CreateOffer);
    }

    fn create_answer(&self) {
        self.submit(SessionCommand::CreateAnswer);
    }

    fn set_local_description(&self, description: SessionDescription) {
        self.submit(SessionCommand::SetLocalDescription(description));
    }

    fn set_remote_description(&self, description: SessionDescription) {
        self.submit(SessionCommand::SetRemoteDescription(description));
    }

    fn add_ice_candidate(&self, candidate: IceCandidate) {
        self.submit(SessionCommand::AddIceCandidate(candidate));
    }

    fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            let _ = self.commands.send(SessionCommand::Close);
        }
    }
}
