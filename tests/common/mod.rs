//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::StreamExt;
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{header::AUTHORIZATION, HeaderValue};
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use metronome::config::MetronomeConfig;
use metronome::http::Credentials;
use metronome::plugins::{MetricPlugin, PluginError};
use metronome::wire::Snapshot;
use metronome::{PluginRegistry, Service};

pub type Ws = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Plugin that always reports the same value.
pub struct StaticPlugin {
    pub name: &'static str,
    pub value: Value,
}

impl MetricPlugin for StaticPlugin {
    fn name(&self) -> &str {
        self.name
    }

    fn snapshot(&self) -> Result<Snapshot, PluginError> {
        Ok(Snapshot::Value(self.value.clone()))
    }
}

/// Plugin that always fails.
pub struct BrokenPlugin(pub &'static str);

impl MetricPlugin for BrokenPlugin {
    fn name(&self) -> &str {
        self.0
    }

    fn snapshot(&self) -> Result<Snapshot, PluginError> {
        Err(PluginError::Other("sensor offline".into()))
    }
}

/// Ephemeral port, rounds far apart so tests drive publishing themselves.
pub fn test_config() -> MetronomeConfig {
    let mut config = MetronomeConfig::default();
    config.server.bind_address = "127.0.0.1:0".into();
    config.server.update_interval_ms = 3_600_000;
    config.server.shutdown_grace_ms = 1_000;
    config
}

pub fn static_registry() -> PluginRegistry {
    let mut registry = PluginRegistry::new();
    registry
        .register(StaticPlugin {
            name: "static",
            value: json!({"answer": 42}),
        })
        .unwrap();
    registry
}

pub async fn start_service(config: MetronomeConfig) -> Service {
    Service::start(config, static_registry()).await.unwrap()
}

pub fn stats_url(addr: SocketAddr) -> String {
    format!("ws://{addr}/stats")
}

/// Open a raw WebSocket subscriber, optionally with Basic credentials.
pub async fn ws_connect(addr: SocketAddr, credentials: Option<(&str, &str)>) -> Result<Ws, tungstenite::Error> {
    let mut request = stats_url(addr).into_client_request()?;
    if let Some((username, password)) = credentials {
        let value = Credentials::new(username, password).header_value();
        request
            .headers_mut()
            .insert(AUTHORIZATION, HeaderValue::from_str(&value).unwrap());
    }
    let (ws, _) = connect_async(request).await?;
    Ok(ws)
}

/// Next text payload, skipping control frames. Panics after five seconds.
pub async fn next_text(ws: &mut Ws) -> String {
    loop {
        let message = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("stream ended")
            .expect("read failed");
        match message {
            Message::Text(text) => return text.as_str().to_owned(),
            Message::Ping(_) | Message::Pong(_) => continue,
            other => panic!("unexpected message: {other:?}"),
        }
    }
}
