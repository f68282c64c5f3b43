use crate::error::{Error, Result};
use crate::signaling::{ChannelEvent, ChannelEventSender, SignalingChannel, SignalingConnector};
use futures::{SinkExt, StreamExt};
use huddle_core::ParseError;
use huddle_core::model::{IncomingEvent, OutgoingEvent, SignalingServerConfig};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, warn};
use url::Url;

/// How often and how fast a dropped signaling connection is retried.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconnectPolicy {
    /// Consecutive attempts after a drop; 0 disables reconnection.
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(1),
        }
    }
}

impl ReconnectPolicy {
    pub fn disabled() -> Self {
        Self {
            max_attempts: 0,
            ..Self::default()
        }
    }
}

/// Signaling over a WebSocket: one JSON text frame per event.
#[derive(Debug, Clone, Default)]
pub struct WebSocketConnector {
    policy: ReconnectPolicy,
}

impl WebSocketConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reconnect_policy(mut self, policy: ReconnectPolicy) -> Self {
        self.policy = policy;
        self
    }
}

impl SignalingConnector for WebSocketConnector {
    fn connect(
        &self,
        config: &SignalingServerConfig,
        events: ChannelEventSender,
    ) -> Result<Arc<dyn SignalingChannel>> {
        let url = websocket_url(&config.url)?;
        let runtime = Handle::try_current().map_err(|_| Error::NoRuntime)?;

        let (commands, command_rx) = mpsc::unbounded_channel();
        runtime.spawn(run_connection(url, self.policy.clone(), command_rx, events));

        Ok(Arc::new(WebSocketChannel { commands }))
    }
}

#[derive(Debug)]
enum ChannelCommand {
    Send(OutgoingEvent),
    Close,
}

struct WebSocketChannel {
    commands: mpsc::UnboundedSender<ChannelCommand>,
}

impl SignalingChannel for WebSocketChannel {
    fn send(&self, event: OutgoingEvent) -> Result<()> {
        self.commands
            .send(ChannelCommand::Send(event))
            .map_err(|_| Error::Transport("signaling connection is closed".to_owned()))
    }

    fn close(&self) {
        let _ = self.commands.send(ChannelCommand::Close);
    }
}

impl Drop for WebSocketChannel {
    fn drop(&mut self) {
        let _ = self.commands.send(ChannelCommand::Close);
    }
}

enum PumpExit {
    Closed,
    Lost(String),
}

async fn run_connection(
    url: Url,
    policy: ReconnectPolicy,
    mut commands: mpsc::UnboundedReceiver<ChannelCommand>,
    events: ChannelEventSender,
) {
    let mut attempts = 0u32;

    loop {
        let connected = tokio::select! {
            result = connect_async(url.as_str()) => result,
            _ = closed(&mut commands) => return,
        };

        let lost = match connected {
            Ok((stream, _)) => {
                attempts = 0;
                info!("Signaling connection to {} open", url);
                events.send(ChannelEvent::Opened);

                match pump(stream, &mut commands, &events).await {
                    PumpExit::Closed => {
                        info!("Signaling connection to {} closed", url);
                        return;
                    }
                    PumpExit::Lost(reason) => ChannelEvent::Disconnected {
                        reason,
                        reconnecting: policy.max_attempts > 0,
                    },
                }
            }
            Err(e) => ChannelEvent::Error {
                message: format!("failed to connect to {url}: {e}"),
                reconnecting: attempts < policy.max_attempts,
            },
        };

        let reconnecting = matches!(
            lost,
            ChannelEvent::Disconnected { reconnecting: true, .. }
                | ChannelEvent::Error { reconnecting: true, .. }
        );
        warn!("Signaling connection to {} lost: {:?}", url, lost);
        if !events.send(lost) || !reconnecting {
            return;
        }

        attempts += 1;
        tokio::select! {
            _ = tokio::time::sleep(policy.delay) => {}
            _ = closed(&mut commands) => return,
        }
        debug!("Reconnecting to {} (attempt {})", url, attempts);
    }
}

/// Moves frames both ways until the connection drops or is closed locally.
async fn pump(
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    commands: &mut mpsc::UnboundedReceiver<ChannelCommand>,
    events: &ChannelEventSender,
) -> PumpExit {
    let (mut write, mut read) = stream.split();

    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(ChannelCommand::Send(event)) => match serde_json::to_string(&event) {
                    Ok(text) => {
                        if let Err(e) = write.send(Message::Text(text)).await {
                            return PumpExit::Lost(e.to_string());
                        }
                    }
                    Err(e) => warn!("Failed to encode {}: {}", event.name(), e),
                },
                Some(ChannelCommand::Close) | None => {
                    let _ = write.send(Message::Close(None)).await;
                    return PumpExit::Closed;
                }
            },

            frame = read.next() => match frame {
                Some(Ok(Message::Text(text))) => match IncomingEvent::from_frame(&text) {
                    Ok(event) => {
                        debug!("Received {}", event.name());
                        events.send(ChannelEvent::Message(event));
                    }
                    Err(e @ ParseError::InvalidPayload { .. }) => {
                        warn!("Invalid signaling payload: {}", e);
                        events.send(ChannelEvent::Invalid(e));
                    }
                    Err(e) => warn!("Ignoring signaling frame: {}", e),
                },
                Some(Ok(Message::Close(frame))) => {
                    let reason = frame
                        .map(|f| f.reason.to_string())
                        .filter(|r| !r.is_empty())
                        .unwrap_or_else(|| "closed by server".to_owned());
                    return PumpExit::Lost(reason);
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => return PumpExit::Lost(e.to_string()),
                None => return PumpExit::Lost("connection reset".to_owned()),
            },
        }
    }
}

/// Resolves once the channel is closed locally. Sends issued while
/// disconnected are dropped.
async fn closed(commands: &mut mpsc::UnboundedReceiver<ChannelCommand>) {
    while let Some(command) = commands.recv().await {
        match command {
            ChannelCommand::Close => return,
            ChannelCommand::Send(event) => {
                warn!("Dropping {} while disconnected", event.name());
            }
        }
    }
}

/// Accepts `ws`, `wss`, `http` and `https` URLs, mapping the latter two to
/// their WebSocket schemes.
pub fn websocket_url(raw: &str) -> Result<Url> {
    let invalid = |reason: String| {
        Error::Config(ParseError::InvalidUrl {
            url: raw.to_owned(),
            reason,
        })
    };

    let mut url = Url::parse(raw).map_err(|e| invalid(e.to_string()))?;
    let scheme = match url.scheme() {
        "ws" | "http" => "ws",
        "wss" | "https" => "wss",
        other => return Err(invalid(format!("unsupported scheme `{other}`"))),
    };
    if url.scheme() != scheme && url.set_scheme(scheme).is_err() {
        return Err(invalid(format!("cannot use scheme `{scheme}`")));
    }
    Ok(url)
}
