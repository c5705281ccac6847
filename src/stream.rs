//! Feed connection supervisor
//!
//! Owns one logical streaming session to the upstream feed at a time and
//! recovers from any disconnection. The session moves through
//! `Disconnected -> Connecting -> Open -> Closing -> Disconnected`, looping
//! until the process stops. All timers of a session are locals of
//! [`Supervisor::drive_session`], so leaving `Open` cancels them.

use std::fmt;
use std::future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::net::TcpStream;
use tokio::time::{self, Instant, MissedTickBehavior, Sleep};
use tokio_tungstenite::{
    connect_async,
    tungstenite::{self, Message},
    MaybeTlsStream, WebSocketStream,
};
use tracing::{debug, error, info, warn};

use crate::{config::StreamConfig, errors::AisTrackerError, models::POSITION_REPORT};

/// Whole world as `[[lat_sw, lon_sw], [lat_ne, lon_ne]]`
const GLOBAL_BOUNDING_BOX: [[f64; 2]; 2] = [[-90.0, -180.0], [90.0, 180.0]];

/// Subscription request sent right after the handshake
#[derive(Debug, Serialize)]
pub struct Subscription<'a> {
    #[serde(rename = "APIKey")]
    pub api_key: &'a str,
    #[serde(rename = "BoundingBoxes")]
    pub bounding_boxes: Vec<[[f64; 2]; 2]>,
    #[serde(rename = "FilterMessageTypes")]
    pub filter_message_types: Vec<&'a str>,
}

impl<'a> Subscription<'a> {
    /// Position reports for the whole world
    pub fn global(api_key: &'a str) -> Self {
        Self {
            api_key,
            bounding_boxes: vec![GLOBAL_BOUNDING_BOX],
            filter_message_types: vec![POSITION_REPORT],
        }
    }
}

/// Inbound transport event
#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    /// Application message, text or binary
    Frame(Vec<u8>),
    /// Acknowledgment of a liveness probe, echoing the probe payload
    Pong(Vec<u8>),
    /// Close frame from the remote end
    Closed { code: Option<u16>, reason: String },
}

/// Opens sessions to the feed
#[async_trait]
pub trait FeedConnector: Send + Sync {
    type Session: FeedSession;

    async fn connect(&self) -> Result<Self::Session, AisTrackerError>;
}

/// One open streaming session
#[async_trait]
pub trait FeedSession: Send {
    async fn send_text(&mut self, text: String) -> Result<(), AisTrackerError>;

    /// Send a liveness probe carrying `payload`
    async fn send_ping(&mut self, payload: Vec<u8>) -> Result<(), AisTrackerError>;

    /// Wait for the next inbound event, `None` once the transport is exhausted.
    ///
    /// Must be cancel safe: it is raced against the heartbeat timers.
    async fn next_event(&mut self) -> Option<Result<FeedEvent, AisTrackerError>>;

    async fn close(&mut self);
}

/// Callback receiving every inbound application message, in arrival order
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle_message(&self, payload: &[u8]);
}

/// WebSocket connector backed by tokio-tungstenite
pub struct WsConnector {
    url: String,
}

impl WsConnector {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

pub struct WsSession {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl FeedConnector for WsConnector {
    type Session = WsSession;

    async fn connect(&self) -> Result<WsSession, AisTrackerError> {
        match connect_async(self.url.as_str()).await {
            Ok((stream, response)) => {
                debug!("WebSocket handshake completed: {}", response.status());
                Ok(WsSession { stream })
            }
            Err(tungstenite::Error::Http(response)) => Err(AisTrackerError::HandshakeRejected {
                status: response.status().as_u16(),
            }),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl FeedSession for WsSession {
    async fn send_text(&mut self, text: String) -> Result<(), AisTrackerError> {
        self.stream.send(Message::text(text)).await?;
        Ok(())
    }

    async fn send_ping(&mut self, payload: Vec<u8>) -> Result<(), AisTrackerError> {
        self.stream.send(Message::Ping(payload.into())).await?;
        Ok(())
    }

    async fn next_event(&mut self) -> Option<Result<FeedEvent, AisTrackerError>> {
        loop {
            let message = match self.stream.next().await? {
                Ok(message) => message,
                Err(e) => return Some(Err(e.into())),
            };

            match message {
                Message::Text(text) => {
                    return Some(Ok(FeedEvent::Frame(text.as_str().as_bytes().to_vec())))
                }
                Message::Binary(data) => return Some(Ok(FeedEvent::Frame(data.to_vec()))),
                Message::Pong(data) => return Some(Ok(FeedEvent::Pong(data.to_vec()))),
                Message::Close(frame) => {
                    let (code, reason) = match frame {
                        Some(frame) => (Some(u16::from(frame.code)), frame.reason.as_str().to_string()),
                        None => (None, String::new()),
                    };
                    return Some(Ok(FeedEvent::Closed { code, reason }));
                }
                // tungstenite queues the pong reply itself
                Message::Ping(_) | Message::Frame(_) => continue,
            }
        }
    }

    async fn close(&mut self) {
        if let Err(e) = self.stream.close(None).await {
            debug!("Error while closing WebSocket: {}", e);
        }
    }
}

/// Lifecycle state of the supervised session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Open,
    Closing,
}

/// Why a session ended
#[derive(Debug)]
pub enum CloseReason {
    ConnectFailed(AisTrackerError),
    Transport(AisTrackerError),
    Remote { code: Option<u16>, reason: String },
    PongTimeout,
    StreamEnded,
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloseReason::ConnectFailed(e) => write!(f, "connect failed: {}", e),
            CloseReason::Transport(e) => write!(f, "transport error: {}", e),
            CloseReason::Remote { code, reason } => {
                write!(f, "closed by remote, code {:?}, reason '{}'", code, reason)
            }
            CloseReason::PongTimeout => write!(f, "no pong within timeout"),
            CloseReason::StreamEnded => write!(f, "stream ended"),
        }
    }
}

/// Connection supervisor for the upstream feed
pub struct Supervisor<C: FeedConnector> {
    connector: C,
    handler: Arc<dyn MessageHandler>,
    config: StreamConfig,
    state: SessionState,
}

impl<C: FeedConnector> Supervisor<C> {
    pub fn new(connector: C, handler: Arc<dyn MessageHandler>, config: StreamConfig) -> Self {
        Self {
            connector,
            handler,
            config,
            state: SessionState::Disconnected,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Run sessions forever, waiting `reconnect_delay` after each closure
    pub async fn run(mut self) {
        info!("Starting feed supervisor for {}", self.config.url);
        loop {
            let reason = self.run_session().await;
            match &reason {
                CloseReason::ConnectFailed(_) | CloseReason::Transport(_) => {
                    error!("Feed session ended: {}", reason)
                }
                CloseReason::PongTimeout => warn!("Feed session ended: {}", reason),
                CloseReason::Remote { .. } | CloseReason::StreamEnded => {
                    info!("Feed session ended: {}", reason)
                }
            }

            info!("Reconnecting in {:?}", self.config.reconnect_delay);
            time::sleep(self.config.reconnect_delay).await;
        }
    }

    /// One pass from `Connecting` back to `Disconnected`
    async fn run_session(&mut self) -> CloseReason {
        self.transition(SessionState::Connecting);

        let connect = time::timeout(self.config.connect_timeout, self.connector.connect()).await;
        let mut session = match connect {
            Ok(Ok(session)) => session,
            Ok(Err(e)) => {
                self.transition(SessionState::Disconnected);
                return CloseReason::ConnectFailed(e);
            }
            Err(_) => {
                self.transition(SessionState::Disconnected);
                return CloseReason::ConnectFailed(AisTrackerError::ConnectTimeout);
            }
        };

        let reason = self.drive_session(&mut session).await;
        self.force_close(&mut session).await;
        reason
    }

    /// Subscribe, then pump events until the session dies
    async fn drive_session(&mut self, session: &mut C::Session) -> CloseReason {
        self.transition(SessionState::Open);

        let subscription = match serde_json::to_string(&Subscription::global(&self.config.api_key))
        {
            Ok(subscription) => subscription,
            Err(e) => return CloseReason::Transport(e.into()),
        };
        if let Err(e) = session.send_text(subscription).await {
            error!("Failed to send subscription: {}", e);
            return CloseReason::Transport(e);
        }
        info!("Subscribed to {} messages", POSITION_REPORT);

        let period = self.config.heartbeat_interval;
        let mut heartbeat = time::interval_at(Instant::now() + period, period);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut probe_seq: u64 = 0;
        let mut outstanding: Option<Probe> = None;

        loop {
            tokio::select! {
                event = session.next_event() => match event {
                    Some(Ok(FeedEvent::Frame(payload))) => {
                        let timeout = self.config.handler_timeout;
                        if time::timeout(timeout, self.handler.handle_message(&payload))
                            .await
                            .is_err()
                        {
                            warn!(
                                "Message handler timed out after {:?}, message skipped",
                                timeout
                            );
                        }
                    }
                    Some(Ok(FeedEvent::Pong(payload))) => {
                        if outstanding.as_ref().is_some_and(|probe| probe.payload == payload) {
                            debug!("Pong received");
                            outstanding = None;
                        } else {
                            debug!("Ignoring unsolicited pong");
                        }
                    }
                    Some(Ok(FeedEvent::Closed { code, reason })) => {
                        return CloseReason::Remote { code, reason };
                    }
                    Some(Err(e)) => return CloseReason::Transport(e),
                    None => return CloseReason::StreamEnded,
                },
                _ = heartbeat.tick() => {
                    // An outstanding probe keeps its first deadline
                    if outstanding.is_none() {
                        probe_seq += 1;
                        let payload = probe_seq.to_be_bytes().to_vec();
                        debug!("Sending ping {}", probe_seq);
                        if let Err(e) = session.send_ping(payload.clone()).await {
                            return CloseReason::Transport(e);
                        }
                        outstanding = Some(Probe {
                            payload,
                            deadline: Box::pin(time::sleep(self.config.pong_timeout)),
                        });
                    }
                }
                _ = expired(&mut outstanding) => {
                    return CloseReason::PongTimeout;
                }
            }
        }
    }

    /// Close the session; a no-op once closing has started
    async fn force_close(&mut self, session: &mut C::Session) {
        if matches!(
            self.state,
            SessionState::Closing | SessionState::Disconnected
        ) {
            return;
        }

        self.transition(SessionState::Closing);
        if time::timeout(self.config.connect_timeout, session.close())
            .await
            .is_err()
        {
            warn!("Timed out closing feed session");
        }
        self.transition(SessionState::Disconnected);
    }

    fn transition(&mut self, next: SessionState) {
        debug!("Feed session {:?} -> {:?}", self.state, next);
        self.state = next;
    }
}

/// Unanswered liveness probe
struct Probe {
    payload: Vec<u8>,
    deadline: Pin<Box<Sleep>>,
}

/// Resolves when the outstanding probe's deadline fires, never without one
async fn expired(probe: &mut Option<Probe>) {
    match probe {
        Some(probe) => probe.deadline.as_mut().await,
        None => future::pending().await,
    }
}
