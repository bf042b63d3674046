//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Validate config → check registry → bind listener
//!     → spawn hub → spawn updater → serve HTTP
//!
//! Shutdown (shutdown.rs):
//!     Signal received → hub closes every subscriber queue
//!     → outbound pumps send close frames → connections drain → exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Fail fast: an empty registry or a bind failure is fatal
//! - Listener binds before any background task starts
//! - Draining open connections is bounded by a grace period

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use startup::{run, Service, StartupError};
