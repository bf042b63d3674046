//! Client configuration.

use std::time::Duration;

use url::Url;

use crate::client::ClientError;
use crate::http::Credentials;

/// Settings for a [`Client`](crate::client::Client).
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// WebSocket endpoint, e.g. `ws://127.0.0.1:8999/stats`.
    pub url: Url,

    /// Basic Authentication username. Empty with an empty password sends
    /// no `Authorization` header.
    pub username: String,

    pub password: String,

    /// Time between connection attempts.
    pub reconnect_interval: Duration,

    /// Upper bound of the random extra added to each reconnect delay.
    pub reconnect_jitter: Duration,

    /// Deadline for the TCP connect plus WebSocket handshake.
    pub connect_timeout: Duration,

    /// Silence after which a connection is considered dead.
    pub read_timeout: Duration,

    /// Capacity of the event channel handed to the caller.
    pub event_capacity: usize,
}

impl ClientConfig {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            username: String::new(),
            password: String::new(),
            reconnect_interval: Duration::from_secs(10),
            reconnect_jitter: Duration::ZERO,
            connect_timeout: Duration::from_secs(10),
            read_timeout: Duration::from_secs(90),
            event_capacity: 64,
        }
    }

    /// Parse and check a `ws://` or `wss://` endpoint.
    pub fn parse(url: &str) -> Result<Self, ClientError> {
        let url = Url::parse(url)?;
        match url.scheme() {
            "ws" | "wss" => Ok(Self::new(url)),
            other => Err(ClientError::UnsupportedScheme(other.to_string())),
        }
    }

    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = username.into();
        self.password = password.into();
        self
    }

    pub fn with_reconnect_interval(mut self, interval: Duration) -> Self {
        self.reconnect_interval = interval;
        self
    }

    /// Credentials to send, if any.
    pub fn credentials(&self) -> Option<Credentials> {
        if self.username.is_empty() && self.password.is_empty() {
            None
        } else {
            Some(Credentials::new(&self.username, &self.password))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_accepts_websocket_schemes() {
        let config = ClientConfig::parse("ws://127.0.0.1:8999/stats").unwrap();
        assert_eq!(config.url.path(), "/stats");
        assert_eq!(config.reconnect_interval, Duration::from_secs(10));
        assert!(config.credentials().is_none());

        assert!(ClientConfig::parse("wss://metrics.example.com/stats").is_ok());
    }

    #[test]
    fn test_parse_rejects_other_schemes() {
        assert!(matches!(
            ClientConfig::parse("http://127.0.0.1:8999/stats"),
            Err(ClientError::UnsupportedScheme(s)) if s == "http"
        ));
        assert!(matches!(
            ClientConfig::parse("not a url"),
            Err(ClientError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_password_alone_enables_credentials() {
        let config = ClientConfig::parse("ws://localhost/stats")
            .unwrap()
            .with_credentials("", "secret");
        let creds = config.credentials().unwrap();
        assert_eq!(creds.username, "");
        assert_eq!(creds.password, "secret");
    }
}
