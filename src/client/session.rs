//! Connection slot, reconnect loop and inbound pump.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{header::AUTHORIZATION, HeaderValue};
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::client::reconnect::reconnect_delay;
use crate::client::ClientConfig;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Upper bound for delivering our close frame on the way out.
const CLOSE_WAIT: Duration = Duration::from_secs(1);

/// Notifications delivered to the caller, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    Connected,
    Disconnected,
    /// A text payload exactly as the hub sent it.
    Incoming(String),
}

/// Result of a single connection attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectOutcome {
    Connected,
    /// A connection was already live; nothing was dialed.
    AlreadyConnected,
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Unsupported URL scheme {0:?}, expected ws or wss")]
    UnsupportedScheme(String),

    #[error("Hub rejected the handshake with status {0}")]
    Rejected(u16),

    #[error("WebSocket handshake failed: {0}")]
    Handshake(#[source] Box<tungstenite::Error>),

    #[error("Credentials cannot be sent as a header")]
    InvalidHeader,

    #[error("Connect did not complete within {0:?}")]
    ConnectTimeout(Duration),

    #[error("Client has been shut down")]
    Closed,
}

impl From<tungstenite::Error> for ClientError {
    fn from(e: tungstenite::Error) -> Self {
        match e {
            tungstenite::Error::Http(response) => Self::Rejected(response.status().as_u16()),
            other => Self::Handshake(Box::new(other)),
        }
    }
}

struct ActiveConnection {
    id: u64,
    sink: SplitSink<WsStream, Message>,
}

struct Shared {
    config: ClientConfig,
    slot: Mutex<Option<ActiveConnection>>,
    reader: Mutex<Option<JoinHandle<()>>>,
    events: mpsc::Sender<ClientEvent>,
    stop: watch::Sender<bool>,
    next_id: AtomicU64,
}

/// Auto-reconnecting subscriber.
///
/// Dropping the handle leaves the background loop running until the event
/// receiver is dropped; call [`Client::shutdown`] to stop it explicitly.
pub struct Client {
    shared: Arc<Shared>,
    task: JoinHandle<()>,
}

impl Client {
    /// Start the reconnect loop. The first attempt happens immediately.
    pub fn spawn(config: ClientConfig) -> (Self, mpsc::Receiver<ClientEvent>) {
        let (events, rx) = mpsc::channel(config.event_capacity.max(1));
        let (stop, _) = watch::channel(false);
        let shared = Arc::new(Shared {
            config,
            slot: Mutex::new(None),
            reader: Mutex::new(None),
            events,
            stop,
            next_id: AtomicU64::new(1),
        });

        let task = tokio::spawn(reconnect_loop(Arc::clone(&shared)));
        (Self { shared, task }, rx)
    }

    pub async fn is_connected(&self) -> bool {
        self.shared.slot.lock().await.is_some()
    }

    /// Dial now unless a connection is already live.
    pub async fn connect_once(&self) -> Result<ConnectOutcome, ClientError> {
        if *self.shared.stop.borrow() {
            return Err(ClientError::Closed);
        }
        self.shared.connect_once().await
    }

    /// Stop reconnecting, close the live connection and wait for its
    /// `Disconnected` event to be queued.
    pub async fn shutdown(self) {
        self.shared.stop.send_replace(true);
        if let Err(e) = self.task.await {
            tracing::error!(error = %e, "Reconnect loop failed");
        }

        let reader = self.shared.reader.lock().await.take();
        if let Some(reader) = reader {
            if let Err(e) = reader.await {
                tracing::error!(error = %e, "Inbound pump failed");
            }
        }
        tracing::info!(url = %self.shared.config.url, "Client stopped");
    }
}

impl Shared {
    async fn connect_once(self: &Arc<Self>) -> Result<ConnectOutcome, ClientError> {
        let mut slot = self.slot.lock().await;
        if slot.is_some() {
            return Ok(ConnectOutcome::AlreadyConnected);
        }

        let socket = dial(&self.config).await?;
        let (sink, stream) = socket.split();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        *slot = Some(ActiveConnection { id, sink });
        tracing::info!(url = %self.config.url, connection = id, "Connected to hub");

        // Emitted under the slot lock so it precedes this connection's Disconnected.
        let mut stop = self.stop.subscribe();
        let _ = self.emit(ClientEvent::Connected, &mut stop).await;

        let reader = tokio::spawn(read_pump(Arc::clone(self), stream, id, stop));
        *self.reader.lock().await = Some(reader);
        Ok(ConnectOutcome::Connected)
    }

    /// Queue an event for the caller, giving up once the client is stopped.
    ///
    /// Returns the reason when the event was not delivered.
    async fn emit(&self, event: ClientEvent, stop: &mut watch::Receiver<bool>) -> Result<(), &'static str> {
        tokio::select! {
            sent = self.events.send(event) => sent.map_err(|_| "receiver_dropped"),
            _ = stopped(stop) => Err("shutdown"),
        }
    }

    /// Take the slot if it still holds connection `id`.
    async fn release(&self, id: u64) -> Option<ActiveConnection> {
        let mut slot = self.slot.lock().await;
        match slot.as_ref() {
            Some(active) if active.id == id => slot.take(),
            _ => None,
        }
    }
}

async fn dial(config: &ClientConfig) -> Result<WsStream, ClientError> {
    let mut request = config.url.as_str().into_client_request()?;
    if let Some(credentials) = config.credentials() {
        let value = HeaderValue::from_str(&credentials.header_value()).map_err(|_| ClientError::InvalidHeader)?;
        request.headers_mut().insert(AUTHORIZATION, value);
    }

    match time::timeout(config.connect_timeout, connect_async(request)).await {
        Ok(Ok((socket, _response))) => Ok(socket),
        Ok(Err(e)) => Err(ClientError::from(e)),
        Err(_) => Err(ClientError::ConnectTimeout(config.connect_timeout)),
    }
}

async fn reconnect_loop(shared: Arc<Shared>) {
    let mut stop = shared.stop.subscribe();
    tracing::info!(
        url = %shared.config.url,
        interval_ms = shared.config.reconnect_interval.as_millis() as u64,
        "Client starting"
    );

    loop {
        match shared.connect_once().await {
            Ok(ConnectOutcome::Connected) => {}
            Ok(ConnectOutcome::AlreadyConnected) => {
                tracing::trace!("Connection still live, skipping attempt");
            }
            Err(e) => {
                tracing::warn!(url = %shared.config.url, error = %e, "Connection attempt failed");
            }
        }

        let delay = reconnect_delay(shared.config.reconnect_interval, shared.config.reconnect_jitter);
        tokio::select! {
            _ = time::sleep(delay) => {}
            _ = stopped(&mut stop) => break,
            _ = shared.events.closed() => {
                tracing::info!("Event receiver dropped, stopping client");
                shared.stop.send_replace(true);
                break;
            }
        }
    }
}

async fn read_pump(
    shared: Arc<Shared>,
    mut stream: SplitStream<WsStream>,
    id: u64,
    mut stop: watch::Receiver<bool>,
) {
    let read_timeout = shared.config.read_timeout;

    let reason = loop {
        tokio::select! {
            _ = stopped(&mut stop) => break "shutdown",
            next = time::timeout(read_timeout, stream.next()) => match next {
                Err(_) => break "read_timeout",
                Ok(None) => break "eof",
                Ok(Some(Err(e))) => {
                    tracing::debug!(connection = id, error = %e, "Read failed");
                    break "read_error";
                }
                Ok(Some(Ok(Message::Text(text)))) => {
                    let event = ClientEvent::Incoming(text.as_str().to_owned());
                    if let Err(reason) = shared.emit(event, &mut stop).await {
                        break reason;
                    }
                }
                Ok(Some(Ok(Message::Close(_)))) => break "server_closed",
                Ok(Some(Ok(_))) => {}
            }
        }
    };

    if let Some(mut active) = shared.release(id).await {
        let _ = time::timeout(CLOSE_WAIT, active.sink.close()).await;
    }
    tracing::info!(url = %shared.config.url, connection = id, reason, "Disconnected from hub");

    if reason == "shutdown" {
        let _ = shared.events.try_send(ClientEvent::Disconnected);
    } else {
        let _ = shared.emit(ClientEvent::Disconnected, &mut stop).await;
    }
}

async fn stopped(stop: &mut watch::Receiver<bool>) {
    let _ = stop.wait_for(|stopped| *stopped).await;
}
