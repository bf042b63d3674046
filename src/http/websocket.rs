//! Subscriber connection pumps.
//!
//! # Responsibilities
//! - Join the hub once the upgrade completes
//! - Outbound pump: drain the member queue, ping on a fixed period
//! - Inbound pump: discard client payloads, enforce the liveness deadline
//! - Tear down in one place: leave the hub, close, release the transport
//!
//! # Data Flow
//! ```text
//! hub queue ──→ write_pump ──→ socket sink      (frames, pings, close)
//! socket stream ──→ read_pump                    (pongs refresh the deadline)
//!
//! read_pump ends  → hub.leave → queue closes → write_pump sends close → exit
//! write_pump ends → writer_done fires        → read_pump returns → hub.leave
//! hub shuts down  → queue closes             → write_pump sends close → exit
//! ```
//!
//! # Design Decisions
//! - Exactly one writer per socket: only the outbound task touches the sink
//! - Pings from the client are answered by the WebSocket layer itself
//! - Pumps are generic over `Stream`/`Sink` so they run without a socket

use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::ws::{close_code, CloseFrame, Message, Utf8Bytes, WebSocket};
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{self, Instant};

use crate::config::ConnectionConfig;
use crate::hub::Hub;
use crate::net::{ConnectionGuard, ConnectionId, ConnectionState};
use crate::wire::Frame;

/// Per-connection timing and size limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionSettings {
    pub write_wait: Duration,
    pub pong_wait: Duration,
    pub ping_period: Duration,
    pub max_message_size: usize,
}

impl From<&ConnectionConfig> for ConnectionSettings {
    fn from(config: &ConnectionConfig) -> Self {
        Self {
            write_wait: config.write_wait(),
            pong_wait: config.pong_wait(),
            ping_period: config.ping_period(),
            max_message_size: config.max_message_size,
        }
    }
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self::from(&ConnectionConfig::default())
    }
}

/// Why the outbound pump stopped early.
#[derive(Debug, Error)]
pub enum PumpError {
    #[error("Write did not complete within {0:?}")]
    WriteTimeout(Duration),

    #[error("WebSocket transport error: {0}")]
    Transport(#[from] axum::Error),
}

/// Why the inbound pump stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    /// The client sent a close frame.
    PeerClosed,
    /// The stream ended without a close frame.
    PeerGone,
    /// Nothing arrived within the liveness deadline.
    Timeout,
    /// Reading failed, including oversized messages.
    ReadError,
    /// The outbound pump exited first.
    WriterStopped,
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::PeerClosed => "peer_closed",
            Self::PeerGone => "peer_gone",
            Self::Timeout => "timeout",
            Self::ReadError => "read_error",
            Self::WriterStopped => "writer_stopped",
        };
        f.write_str(s)
    }
}

/// Run a subscriber connection from a completed upgrade until it closes.
pub async fn serve_connection(
    mut socket: WebSocket,
    hub: Hub,
    settings: ConnectionSettings,
    guard: ConnectionGuard,
    peer: Option<SocketAddr>,
) {
    let id = guard.id();
    let mut state = ConnectionState::PendingHandshake;

    let subscription = match hub.join(id).await {
        Ok(subscription) => subscription,
        Err(e) => {
            tracing::warn!(connection_id = %id, error = %e, "Hub unavailable, closing new connection");
            let _ = socket.close().await;
            return;
        }
    };
    state.advance(ConnectionState::Active, id);
    tracing::info!(
        connection_id = %id,
        peer = ?peer,
        "Subscriber connected"
    );

    let (sink, stream) = socket.split();
    let (writer_done_tx, writer_done_rx) = oneshot::channel();
    let writer = tokio::spawn(write_pump(sink, subscription.into_queue(), settings, id, writer_done_tx));

    let reason = read_pump(stream, settings.pong_wait, id, writer_done_rx).await;
    state.advance(ConnectionState::Closing, id);

    if hub.leave(id).await.is_err() {
        tracing::debug!(connection_id = %id, "Hub already stopped");
    }

    match writer.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::debug!(connection_id = %id, error = %e, "Outbound pump failed"),
        Err(e) => tracing::error!(connection_id = %id, error = %e, "Outbound pump task failed"),
    }

    state.advance(ConnectionState::Closed, id);
    tracing::info!(connection_id = %id, reason = %reason, "Subscriber disconnected");
    drop(guard);
}

/// Forward queued frames to the sink and keep the peer alive with pings.
///
/// Sends a normal close frame once the queue closes. Dropping
/// `writer_done` on return wakes the inbound pump.
pub async fn write_pump<K>(
    mut sink: K,
    mut queue: mpsc::Receiver<Frame>,
    settings: ConnectionSettings,
    id: ConnectionId,
    writer_done: oneshot::Sender<()>,
) -> Result<(), PumpError>
where
    K: Sink<Message, Error = axum::Error> + Unpin,
{
    let _writer_done = writer_done;
    let mut ping = time::interval_at(Instant::now() + settings.ping_period, settings.ping_period);

    loop {
        tokio::select! {
            frame = queue.recv() => match frame {
                Some(frame) => send(&mut sink, Message::Text(frame), settings.write_wait).await?,
                None => {
                    tracing::debug!(connection_id = %id, "Queue closed, sending close frame");
                    let close = Message::Close(Some(CloseFrame {
                        code: close_code::NORMAL,
                        reason: Utf8Bytes::from_static(""),
                    }));
                    if let Err(e) = send(&mut sink, close, settings.write_wait).await {
                        tracing::debug!(connection_id = %id, error = %e, "Close frame not delivered");
                    }
                    return Ok(());
                }
            },
            _ = ping.tick() => {
                tracing::trace!(connection_id = %id, "Sending ping");
                send(&mut sink, Message::Ping(Bytes::new()), settings.write_wait).await?;
            }
        }
    }
}

/// Read and discard client messages until the connection ends.
///
/// Every received message, pongs included, pushes the liveness deadline
/// out by `pong_wait`.
pub async fn read_pump<S>(
    mut stream: S,
    pong_wait: Duration,
    id: ConnectionId,
    mut writer_done: oneshot::Receiver<()>,
) -> DisconnectReason
where
    S: Stream<Item = Result<Message, axum::Error>> + Unpin,
{
    loop {
        tokio::select! {
            _ = &mut writer_done => return DisconnectReason::WriterStopped,
            next = time::timeout(pong_wait, stream.next()) => match next {
                Err(_) => {
                    tracing::debug!(connection_id = %id, pong_wait_ms = pong_wait.as_millis() as u64, "Liveness deadline passed");
                    return DisconnectReason::Timeout;
                }
                Ok(None) => return DisconnectReason::PeerGone,
                Ok(Some(Err(e))) => {
                    tracing::debug!(connection_id = %id, error = %e, "Read failed");
                    return DisconnectReason::ReadError;
                }
                Ok(Some(Ok(Message::Close(_)))) => return DisconnectReason::PeerClosed,
                Ok(Some(Ok(Message::Text(_) | Message::Binary(_)))) => {
                    tracing::trace!(connection_id = %id, "Discarding client message");
                }
                Ok(Some(Ok(_))) => {}
            }
        }
    }
}

async fn send<K>(sink: &mut K, message: Message, write_wait: Duration) -> Result<(), PumpError>
where
    K: Sink<Message, Error = axum::Error> + Unpin,
{
    match time::timeout(write_wait, sink.send(message)).await {
        Ok(result) => result.map_err(PumpError::from),
        Err(_) => Err(PumpError::WriteTimeout(write_wait)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;

    fn settings() -> ConnectionSettings {
        ConnectionSettings {
            write_wait: Duration::from_millis(200),
            pong_wait: Duration::from_millis(50),
            ping_period: Duration::from_secs(60),
            max_message_size: 512,
        }
    }

    /// A sink that forwards every message into a channel.
    fn recording_sink(
        tx: mpsc::UnboundedSender<Message>,
    ) -> impl Sink<Message, Error = axum::Error> + Unpin {
        Box::pin(futures_util::sink::unfold(
            tx,
            |tx: mpsc::UnboundedSender<Message>, message: Message| async move {
                let _ = tx.send(message);
                Ok::<_, axum::Error>(tx)
            },
        ))
    }

    #[tokio::test]
    async fn test_write_pump_forwards_in_order_then_closes() {
        let (out_tx, mut out_rx) = mpsc::unbounded_channel();
        let (queue_tx, queue_rx) = mpsc::channel(4);
        let (done_tx, mut done_rx) = oneshot::channel();

        queue_tx.send(Utf8Bytes::from_static("{}")).await.unwrap();
        queue_tx.send(Utf8Bytes::from_static(r#"{"metrics":{}}"#)).await.unwrap();
        drop(queue_tx);

        write_pump(recording_sink(out_tx), queue_rx, settings(), ConnectionId::new(), done_tx)
            .await
            .unwrap();

        assert_eq!(out_rx.recv().await, Some(Message::Text(Utf8Bytes::from_static("{}"))));
        assert_eq!(
            out_rx.recv().await,
            Some(Message::Text(Utf8Bytes::from_static(r#"{"metrics":{}}"#)))
        );
        match out_rx.recv().await {
            Some(Message::Close(Some(frame))) => assert_eq!(frame.code, close_code::NORMAL),
            other => panic!("expected close frame, got {other:?}"),
        }
        // Dropping the sender signals the inbound pump.
        assert!((&mut done_rx).await.is_err());
    }

    #[tokio::test]
    async fn test_write_pump_pings_on_period() {
        let (out_tx, mut out_rx) = mpsc::unbounded_channel();
        let (queue_tx, queue_rx) = mpsc::channel::<Frame>(4);
        let (done_tx, _done_rx) = oneshot::channel();
        let settings = ConnectionSettings {
            ping_period: Duration::from_millis(20),
            ..settings()
        };

        let pump = tokio::spawn(write_pump(
            recording_sink(out_tx),
            queue_rx,
            settings,
            ConnectionId::new(),
            done_tx,
        ));

        let first = time::timeout(Duration::from_secs(2), out_rx.recv()).await.unwrap();
        assert!(matches!(first, Some(Message::Ping(_))));

        drop(queue_tx);
        pump.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_read_pump_times_out_on_silence() {
        let (_done_tx, done_rx) = oneshot::channel();
        let silent = stream::pending::<Result<Message, axum::Error>>();

        let reason = read_pump(silent, Duration::from_millis(30), ConnectionId::new(), done_rx).await;
        assert_eq!(reason, DisconnectReason::Timeout);
    }

    #[tokio::test]
    async fn test_read_pump_discards_payloads_until_close() {
        let (_done_tx, done_rx) = oneshot::channel();
        let messages = stream::iter(vec![
            Ok(Message::Text(Utf8Bytes::from_static("ignored"))),
            Ok(Message::Pong(Bytes::new())),
            Ok(Message::Close(None)),
        ]);

        let reason = read_pump(messages, Duration::from_secs(1), ConnectionId::new(), done_rx).await;
        assert_eq!(reason, DisconnectReason::PeerClosed);
    }

    #[tokio::test]
    async fn test_read_pump_stops_when_writer_exits() {
        let (done_tx, done_rx) = oneshot::channel::<()>();
        drop(done_tx);
        let silent = stream::pending::<Result<Message, axum::Error>>();

        let reason = read_pump(silent, Duration::from_secs(5), ConnectionId::new(), done_rx).await;
        assert_eq!(reason, DisconnectReason::WriterStopped);
    }
}
