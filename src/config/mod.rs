//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! metronomed.toml
//!     → loader.rs (read & deserialize)
//!     → command-line overrides (main.rs)
//!     → validation.rs (semantic checks)
//!     → MetronomeConfig (validated, immutable)
//!     → copied into the hub, updater and HTTP server at startup
//! ```
//!
//! # Design Decisions
//! - Every section and field has a default, an empty file is valid
//! - Durations are stored as integer milliseconds for readable TOML
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{ConnectionConfig, MetronomeConfig, ObservabilityConfig, PluginsConfig, ServerConfig};
pub use validation::{validate_config, ValidationError};
