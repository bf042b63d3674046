//! Subscriber-side client.
//!
//! # Data Flow
//! ```text
//! reconnect loop (every reconnect_interval [+ jitter])
//!     → connect_once: slot empty? dial with Basic credentials
//!         → slot = Some(connection) → Connected
//!         → inbound pump: text frames → Incoming(payload)
//!         → error / close / EOF / read timeout → slot = None → Disconnected
//! ```
//!
//! # Design Decisions
//! - Fixed cadence, no exponential backoff, never gives up
//! - At most one live connection; the slot lock covers check, dial and store
//! - `Connected` is always emitted before the matching `Disconnected`
//! - The client stops on `shutdown()` or when the event receiver is dropped

pub mod config;
pub mod reconnect;
pub mod session;

pub use config::ClientConfig;
pub use reconnect::reconnect_delay;
pub use session::{Client, ClientError, ClientEvent, ConnectOutcome};
