//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with both endpoints
//! - Wire up middleware (Basic auth, request timeout, tracing)
//! - Hand upgraded `/stats` connections to the subscriber pumps
//! - Serve until the shutdown signal fires

use std::net::SocketAddr;

use axum::{
    extract::{
        ws::{rejection::WebSocketUpgradeRejection, WebSocketUpgrade},
        ConnectInfo, State,
    },
    http::StatusCode,
    middleware,
    response::{IntoResponse, Json, Response},
    routing::get,
    Extension, Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::MetronomeConfig;
use crate::http::auth::{basic_auth_middleware, AuthState};
use crate::http::websocket::{serve_connection, ConnectionSettings};
use crate::hub::Hub;
use crate::net::ConnectionTracker;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub hub: Hub,
    pub settings: ConnectionSettings,
    pub connections: ConnectionTracker,
}

/// HTTP front of the metrics hub.
pub struct HttpServer {
    router: Router,
    connections: ConnectionTracker,
}

impl HttpServer {
    pub fn new(config: &MetronomeConfig, hub: Hub) -> Self {
        let connections = ConnectionTracker::new();
        let state = AppState {
            hub,
            settings: ConnectionSettings::from(&config.connection),
            connections: connections.clone(),
        };
        let auth = AuthState::from_config(&config.server);

        let router = Self::build_router(config, state, auth);
        Self { router, connections }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &MetronomeConfig, state: AppState, auth: AuthState) -> Router {
        Router::new()
            .route("/", get(home_handler))
            .route("/stats", get(stats_handler))
            .with_state(state)
            .layer(middleware::from_fn_with_state(auth, basic_auth_middleware))
            .layer(TimeoutLayer::new(config.server.request_timeout()))
            .layer(TraceLayer::new_for_http())
    }

    /// A copy of the router, for driving requests without a listener.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Tracker of upgraded subscriber connections.
    pub fn connections(&self) -> ConnectionTracker {
        self.connections.clone()
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("HTTP server received shutdown signal");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// `GET /`: a fixed empty JSON object.
async fn home_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({}))
}

/// `GET /stats`: upgrade to a WebSocket and subscribe to the hub.
async fn stats_handler(
    State(state): State<AppState>,
    peer: Option<Extension<ConnectInfo<SocketAddr>>>,
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let peer = peer.map(|Extension(ConnectInfo(addr))| addr);

    let upgrade = match upgrade {
        Ok(upgrade) => upgrade,
        Err(rejection) => {
            tracing::debug!(peer = ?peer, error = %rejection, "Rejected non-WebSocket request to /stats");
            return (StatusCode::BAD_REQUEST, "Not a websocket handshake").into_response();
        }
    };

    let guard = state.connections.track();
    tracing::debug!(connection_id = %guard.id(), peer = ?peer, "Upgrading subscriber connection");

    let AppState { hub, settings, .. } = state;
    upgrade
        .max_message_size(settings.max_message_size)
        .on_failed_upgrade(move |e| {
            tracing::warn!(peer = ?peer, error = %e, "WebSocket upgrade failed");
        })
        .on_upgrade(move |socket| serve_connection(socket, hub, settings, guard, peer))
}
