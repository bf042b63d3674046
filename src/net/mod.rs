//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Upgrade request on /stats
//!     → connection.rs (id allocation, live-connection tracking)
//!     → http/websocket.rs (pumps)
//!
//! Connection States:
//!     PendingHandshake → Active → Closing → Closed
//! ```
//!
//! # Design Decisions
//! - Ids are process-unique and never reused
//! - Each connection is tracked until its transport is released, so
//!   shutdown can wait for subscribers to drain

pub mod connection;

pub use connection::{ConnectionGuard, ConnectionId, ConnectionState, ConnectionTracker};
