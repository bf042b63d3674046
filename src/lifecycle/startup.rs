//! Startup orchestration.
//!
//! # Responsibilities
//! - Validate configuration and refuse an empty plugin registry
//! - Bind the listener before any background task starts
//! - Start the hub, the updater and the HTTP server in dependency order
//! - Stop everything in reverse order and drain open connections
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - The metrics exporter is optional; failing to install it only logs

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::config::{validate_config, MetronomeConfig, ValidationError};
use crate::http::HttpServer;
use crate::hub::Hub;
use crate::lifecycle::signals::wait_for_signal;
use crate::lifecycle::Shutdown;
use crate::net::ConnectionTracker;
use crate::observability::metrics;
use crate::plugins::PluginRegistry;
use crate::updater::Updater;

/// Errors that abort startup.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("No metric plugins registered")]
    NoPlugins,

    #[error("Invalid configuration: {}", .0.iter().map(ToString::to_string).collect::<Vec<_>>().join(", "))]
    InvalidConfig(Vec<ValidationError>),

    #[error("Failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A running hub process: listener, hub loop, updater and HTTP server.
pub struct Service {
    local_addr: SocketAddr,
    hub: Hub,
    shutdown: Shutdown,
    connections: ConnectionTracker,
    server: JoinHandle<Result<(), std::io::Error>>,
    tasks: Vec<JoinHandle<()>>,
    grace: Duration,
}

impl Service {
    /// Validate, bind and start every subsystem.
    pub async fn start(config: MetronomeConfig, registry: PluginRegistry) -> Result<Self, StartupError> {
        validate_config(&config).map_err(StartupError::InvalidConfig)?;
        if registry.is_empty() {
            return Err(StartupError::NoPlugins);
        }

        let listener = TcpListener::bind(config.server.bind_target())
            .await
            .map_err(|source| StartupError::Bind {
                address: config.server.bind_address.clone(),
                source,
            })?;
        let local_addr = listener.local_addr()?;

        if config.observability.metrics_enabled {
            match config.observability.metrics_address.parse() {
                Ok(addr) => {
                    if let Err(e) = metrics::init_metrics(addr) {
                        tracing::error!(error = %e, "Failed to install metrics exporter");
                    }
                }
                Err(_) => tracing::error!(
                    metrics_address = %config.observability.metrics_address,
                    "Failed to parse metrics address"
                ),
            }
        }

        let shutdown = Shutdown::new();

        let (hub, hub_task) = Hub::spawn(config.connection.queue_capacity, shutdown.subscribe());

        let updater = Updater::new(Arc::new(registry), hub.clone(), &config.server);
        let updater_task = tokio::spawn(updater.run(shutdown.subscribe()));

        let server = HttpServer::new(&config, hub.clone());
        let connections = server.connections();
        let server_task = tokio::spawn(server.run(listener, shutdown.subscribe()));

        tracing::info!(
            address = %local_addr,
            auth = config.server.auth_enabled(),
            update_interval_ms = config.server.update_interval_ms,
            "Metrics hub started"
        );

        Ok(Self {
            local_addr,
            hub,
            shutdown,
            connections,
            server: server_task,
            tasks: vec![hub_task, updater_task],
            grace: config.server.shutdown_grace(),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn hub(&self) -> &Hub {
        &self.hub
    }

    /// Number of WebSocket connections still open.
    pub fn open_connections(&self) -> u64 {
        self.connections.active_count()
    }

    /// Trigger shutdown and wait for every task, bounded by the grace period
    /// for connections.
    pub async fn stop(self) {
        tracing::info!("Stopping metrics hub");
        self.shutdown.trigger();

        match self.server.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!(error = %e, "HTTP server exited with error"),
            Err(e) => tracing::error!(error = %e, "HTTP server task failed"),
        }

        for task in self.tasks {
            if let Err(e) = task.await {
                tracing::error!(error = %e, "Background task failed");
            }
        }

        let remaining = self.connections.wait_for_drain(self.grace).await;
        if remaining > 0 {
            tracing::warn!(remaining, "Grace period elapsed with connections still open");
        }
        tracing::info!("Shutdown complete");
    }
}

/// Start the hub and run until SIGINT or SIGTERM.
pub async fn run(config: MetronomeConfig, registry: PluginRegistry) -> Result<(), StartupError> {
    let service = Service::start(config, registry).await?;
    wait_for_signal().await;
    service.stop().await;
    Ok(())
}
