//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from the TOML file.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the metrics hub.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct MetronomeConfig {
    /// Listener, credentials and collection cadence.
    pub server: ServerConfig,

    /// Per-subscriber connection tuning.
    pub connection: ConnectionConfig,

    /// Logging and metrics settings.
    pub observability: ObservabilityConfig,

    /// Built-in plugins to register.
    pub plugins: PluginsConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address: "127.0.0.1:8999", "localhost:8999" or ":8999" for
    /// every interface.
    pub bind_address: String,

    /// Basic Authentication username. Empty with an empty password
    /// disables authentication.
    pub username: String,

    /// Basic Authentication password.
    pub password: String,

    /// Time between two collection rounds in milliseconds.
    pub update_interval_ms: u64,

    /// Upper bound for a single plugin snapshot in milliseconds.
    pub plugin_timeout_ms: u64,

    /// Timeout for plain HTTP requests in seconds.
    pub request_timeout_secs: u64,

    /// Grace period for open connections on shutdown in milliseconds.
    pub shutdown_grace_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8999".to_string(),
            username: String::new(),
            password: String::new(),
            update_interval_ms: 5_000,
            plugin_timeout_ms: 2_000,
            request_timeout_secs: 30,
            shutdown_grace_ms: 5_000,
        }
    }
}

impl ServerConfig {
    pub fn update_interval(&self) -> Duration {
        Duration::from_millis(self.update_interval_ms)
    }

    pub fn plugin_timeout(&self) -> Duration {
        Duration::from_millis(self.plugin_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }

    /// Address handed to the listener. A bare `:port` means every
    /// interface.
    pub fn bind_target(&self) -> String {
        if self.bind_address.starts_with(':') {
            format!("0.0.0.0{}", self.bind_address)
        } else {
            self.bind_address.clone()
        }
    }

    /// True when a username or password is configured.
    pub fn auth_enabled(&self) -> bool {
        !self.username.is_empty() || !self.password.is_empty()
    }
}

/// Subscriber connection configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Capacity of each subscriber's outbound queue (frames).
    pub queue_capacity: usize,

    /// Deadline for writing a single frame in milliseconds.
    pub write_wait_ms: u64,

    /// Silence after which a subscriber is considered dead, in milliseconds.
    pub pong_wait_ms: u64,

    /// Interval between liveness pings in milliseconds. Must be shorter
    /// than `pong_wait_ms`.
    pub ping_period_ms: u64,

    /// Largest message accepted from a subscriber, in bytes.
    pub max_message_size: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 256,
            write_wait_ms: 10_000,
            pong_wait_ms: 60_000,
            ping_period_ms: 54_000,
            max_message_size: 512,
        }
    }
}

impl ConnectionConfig {
    pub fn write_wait(&self) -> Duration {
        Duration::from_millis(self.write_wait_ms)
    }

    pub fn pong_wait(&self) -> Duration {
        Duration::from_millis(self.pong_wait_ms)
    }

    pub fn ping_period(&self) -> Duration {
        Duration::from_millis(self.ping_period_ms)
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Optional log file. Logs go to stdout when unset.
    pub log_file: Option<String>,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_file: None,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

/// Built-in plugin selection.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PluginsConfig {
    pub loadavg: bool,
    pub mem: bool,
    pub swap: bool,
}

impl Default for PluginsConfig {
    fn default() -> Self {
        Self {
            loadavg: true,
            mem: true,
            swap: true,
        }
    }
}
