//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, tracing, timeout)
//!     → auth.rs (Basic credentials, when configured)
//!     → GET /       → `{}`
//!     → GET /stats  → WebSocket upgrade
//!         → websocket.rs (hub membership, read and write pumps)
//! ```

pub mod auth;
pub mod server;
pub mod websocket;

pub use auth::{AuthState, Credentials};
pub use server::{AppState, HttpServer};
pub use websocket::{ConnectionSettings, DisconnectReason};
