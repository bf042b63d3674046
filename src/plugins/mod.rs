//! Metric plugin subsystem.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     [plugins] config section / embedding code
//!     → registry.rs (ordered, unique names)
//!     → Arc<PluginRegistry> handed to the updater (read-only from here on)
//!
//! Every update tick:
//!     updater → MetricPlugin::snapshot() on the blocking pool
//!     → Snapshot (see wire::status)
//! ```
//!
//! # Built-in plugins
//! - `loadavg`: system load averages (`/proc/loadavg`)
//! - `mem`: physical memory usage (`/proc/meminfo`)
//! - `swap`: swap usage (`/proc/meminfo`)
//!
//! # Design Decisions
//! - Plugins are plain synchronous objects; the updater bounds each call
//!   with a timeout, so a plugin may block on file or network I/O
//! - A failing plugin only loses its own key for that round

pub mod loadavg;
pub mod mem;
pub mod procfs;
pub mod registry;
pub mod swap;

use thiserror::Error;

use crate::wire::Snapshot;

pub use loadavg::LoadAvgPlugin;
pub use mem::MemPlugin;
pub use registry::{PluginRegistry, RegistryError};
pub use swap::SwapPlugin;

/// A source of one named metric snapshot per collection round.
pub trait MetricPlugin: Send + Sync {
    /// Key under which the snapshot is published. Must be stable for the
    /// lifetime of the process and unique within a registry.
    fn name(&self) -> &str;

    /// Take a snapshot of the watched resource.
    fn snapshot(&self) -> Result<Snapshot, PluginError>;
}

/// Errors reported by a plugin for a single round.
#[derive(Debug, Error)]
pub enum PluginError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed {path}: {detail}")]
    Parse { path: String, detail: String },

    #[error("{0}")]
    Other(String),
}
