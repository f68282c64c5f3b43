use super::DataChannelEvent;
use crate::engine::{
    DataChannelConfiguration, DataChannelHub, EngineEventKind, EngineEventSender, FailureStage,
    PeerConnectionState,
};
use anyhow::{Result, bail};
use bytes::Bytes;
use huddle_core::model::{IceCandidate, IceServer, SdpType, SessionDescription, SessionId};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use webrtc::api::API;
use webrtc::data_channel::RTCDataChannel;
use webrtc::data_channel::data_channel_init::RTCDataChannelInit;
use webrtc::data_channel::data_channel_message::DataChannelMessage;
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::sdp_type::RTCSdpType;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;

#[derive(Debug)]
pub(super) enum SessionCommand {
    CreateOffer,
    CreateAnswer,
    SetLocalDescription(SessionDescription),
    SetRemoteDescription(SessionDescription),
    AddIceCandidate(IceCandidate),
    Close,
}

pub(super) struct SessionWorker {
    pub api: Arc<API>,
    pub peer_id: String,
    pub is_caller: bool,
    pub ice_servers: Vec<IceServer>,
    pub events: EngineEventSender,
    pub data_channel: Option<DataChannelConfiguration>,
    pub data_channel_label: String,
    pub hub: DataChannelHub,
    pub data_events: Option<mpsc::UnboundedSender<DataChannelEvent>>,
}

impl SessionWorker {
    /// Applies commands in order until the session is closed or its handle
    /// is dropped, then releases the peer connection.
    pub async fn run(self, mut commands: mpsc::UnboundedReceiver<SessionCommand>) {
        let peer_connection = match self.open().await {
            Ok(pc) => pc,
            Err(e) => {
                self.fail(FailureStage::Session, e);
                return;
            }
        };

        while let Some(command) = commands.recv().await {
            debug!("Session {} for {:?}: {:?}", self.session_id(), self.peer_id, command);

            match command {
                SessionCommand::CreateOffer => {
                    match peer_connection.create_offer(None).await {
                        Ok(offer) => self.emit_local(offer),
                        Err(e) => self.fail(FailureStage::CreateDescription, e.into()),
                    }
                }
                SessionCommand::CreateAnswer => {
                    match peer_connection.create_answer(None).await {
                        Ok(answer) => self.emit_local(answer),
                        Err(e) => self.fail(FailureStage::CreateDescription, e.into()),
                    }
                }
                SessionCommand::SetLocalDescription(description) => {
                    let result = match to_rtc(&description) {
                        Ok(desc) => peer_connection
                            .set_local_description(desc)
                            .await
                            .map_err(Into::into),
                        Err(e) => Err(e),
                    };
                    if let Err(e) = result {
                        self.fail(FailureStage::SetLocalDescription, e);
                    }
                }
                SessionCommand::SetRemoteDescription(description) => {
                    let result = match to_rtc(&description) {
                        Ok(desc) => peer_connection
                            .set_remote_description(desc)
                            .await
                            .map_err(Into::into),
                        Err(e) => Err(e),
                    };
                    match result {
                        Ok(()) => {
                            self.events.emit(EngineEventKind::RemoteDescriptionApplied);
                        }
                        Err(e) => self.fail(FailureStage::SetRemoteDescription, e),
                    }
                }
                SessionCommand::AddIceCandidate(candidate) => {
                    let init = RTCIceCandidateInit {
                        candidate: candidate.candidate,
                        sdp_mid: candidate.sdp_mid,
                        sdp_mline_index: candidate.sdp_m_line_index,
                        ..Default::default()
                    };
                    if let Err(e) = peer_connection.add_ice_candidate(init).await {
                        self.fail(FailureStage::AddIceCandidate, e.into());
                    }
                }
                SessionCommand::Close => break,
            }
        }

        self.hub.remove(&self.peer_id, self.session_id());
        if let Err(e) = peer_connection.close().await {
            warn!("Closing peer connection for {:?} failed: {}", self.peer_id, e);
        }
        info!("Peer session {} for {:?} finished", self.session_id(), self.peer_id);
    }

    async fn open(&self) -> Result<Arc<RTCPeerConnection>> {
        let rtc_config = RTCConfiguration {
            ice_servers: self
                .ice_servers
                .iter()
                .map(|server| RTCIceServer {
                    urls: server.urls.clone(),
                    username: server.username.clone().unwrap_or_default(),
                    credential: server.credential.clone().unwrap_or_default(),
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        };

        let peer_connection = Arc::new(self.api.new_peer_connection(rtc_config).await?);

        let state_events = self.events.clone();
        peer_connection.on_peer_connection_state_change(Box::new(
            move |s: RTCPeerConnectionState| {
                debug!("Peer connection state for {:?}: {:?}", state_events.peer_id(), s);
                if let Some(state) = connection_state(s) {
                    state_events.emit(EngineEventKind::ConnectionStateChanged(state));
                }
                Box::pin(async {})
            },
        ));

        let ice_events = self.events.clone();
        peer_connection.on_ice_candidate(Box::new(move |c: Option<RTCIceCandidate>| {
            let events = ice_events.clone();
            Box::pin(async move {
                let Some(candidate) = c else { return };
                let Ok(init) = candidate.to_json() else {
                    return;
                };
                events.emit(EngineEventKind::IceCandidateGathered(IceCandidate {
                    sdp_mid: init.sdp_mid,
                    sdp_m_line_index: init.sdp_mline_index,
                    candidate: init.candidate,
                }));
            })
        }));

        if self.is_caller {
            if let Some(config) = &self.data_channel {
                let channel = peer_connection
                    .create_data_channel(&self.data_channel_label, Some(RTCDataChannelInit::from(config)))
                    .await?;
                self.watch_data_channel(channel);
            }
        } else {
            let watcher = self.channel_watcher();
            peer_connection.on_data_channel(Box::new(move |channel: Arc<RTCDataChannel>| {
                watcher.clone().watch(channel);
                Box::pin(async {})
            }));
        }

        Ok(peer_connection)
    }

    fn emit_local(&self, description: RTCSessionDescription) {
        match from_rtc(description) {
            Ok(description) => {
                self.events
                    .emit(EngineEventKind::LocalDescriptionCreated(description));
            }
            Err(e) => self.fail(FailureStage::CreateDescription, e),
        }
    }

    fn fail(&self, stage: FailureStage, error: anyhow::Error) {
        warn!("{} failed for {:?}: {:#}", stage, self.peer_id, error);
        self.events.emit(EngineEventKind::Failure {
            stage,
            message: format!("{error:#}"),
        });
    }

    fn session_id(&self) -> SessionId {
        self.events.session_id()
    }

    fn channel_watcher(&self) -> ChannelWatcher {
        ChannelWatcher {
            peer_id: self.peer_id.clone(),
            session_id: self.session_id(),
            hub: self.hub.clone(),
            data_events: self.data_events.clone(),
        }
    }

    fn watch_data_channel(&self, channel: Arc<RTCDataChannel>) {
        self.channel_watcher().watch(channel);
    }
}

/// Registers data channel callbacks that feed the hub and the optional
/// data event stream.
#[derive(Clone)]
struct ChannelWatcher {
    peer_id: String,
    session_id: SessionId,
    hub: DataChannelHub,
    data_events: Option<mpsc::UnboundedSender<DataChannelEvent>>,
}

impl ChannelWatcher {
    fn publish(&self, event: DataChannelEvent) {
        if let Some(tx) = &self.data_events {
            let _ = tx.send(event);
        }
    }

    fn watch(self, channel: Arc<RTCDataChannel>) {
        debug!("Data channel {:?} for {:?}", channel.label(), self.peer_id);

        let on_open = self.clone();
        let opened = Arc::clone(&channel);
        channel.on_open(Box::new(move || {
            info!("Data channel open for {:?}", on_open.peer_id);
            on_open.hub.insert(&on_open.peer_id, on_open.session_id, opened);
            on_open.publish(DataChannelEvent::Open {
                peer_id: on_open.peer_id.clone(),
            });
            Box::pin(async {})
        }));

        let on_message = self.clone();
        channel.on_message(Box::new(move |msg: DataChannelMessage| {
            on_message.publish(DataChannelEvent::Message {
                peer_id: on_message.peer_id.clone(),
                data: Bytes::from(msg.data.to_vec()),
            });
            Box::pin(async {})
        }));

        let on_close = self;
        channel.on_close(Box::new(move || {
            on_close.hub.remove(&on_close.peer_id, on_close.session_id);
            on_close.publish(DataChannelEvent::Closed {
                peer_id: on_close.peer_id.clone(),
            });
            Box::pin(async {})
        }));
    }
}

fn connection_state(state: RTCPeerConnectionState) -> Option<PeerConnectionState> {
    match state {
        RTCPeerConnectionState::New => Some(PeerConnectionState::New),
        RTCPeerConnectionState::Connecting => Some(PeerConnectionState::Connecting),
        RTCPeerConnectionState::Connected => Some(PeerConnectionState::Connected),
        RTCPeerConnectionState::Disconnected => Some(PeerConnectionState::Disconnected),
        RTCPeerConnectionState::Failed => Some(PeerConnectionState::Failed),
        RTCPeerConnectionState::Closed => Some(PeerConnectionState::Closed),
        RTCPeerConnectionState::Unspecified => None,
    }
}

fn to_rtc(description: &SessionDescription) -> Result<RTCSessionDescription> {
    let desc = match description.kind {
        SdpType::Offer => RTCSessionDescription::offer(description.sdp.clone())?,
        SdpType::Answer => RTCSessionDescription::answer(description.sdp.clone())?,
    };
    Ok(desc)
}

fn from_rtc(description: RTCSessionDescription) -> Result<SessionDescription> {
    let kind = match description.sdp_type {
        RTCSdpType::Offer => SdpType::Offer,
        RTCSdpType::Answer => SdpType::Answer,
        other => bail!("unsupported local description type {other:?}"),
    };
    Ok(SessionDescription {
        kind,
        sdp: description.sdp,
    })
}
