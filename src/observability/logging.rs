//! Structured logging setup.
//!
//! # Responsibilities
//! - Initialize the global tracing subscriber
//! - Route output to stdout or to an append-only log file
//!
//! # Design Decisions
//! - `RUST_LOG` wins over the configured level
//! - File output is written without ANSI colours

use std::fs::OpenOptions;
use std::sync::Mutex;

use thiserror::Error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::ObservabilityConfig;

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Cannot open log file {path:?}: {source}")]
    LogFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Logging already initialized: {0}")]
    Init(#[from] tracing_subscriber::util::TryInitError),
}

/// Default filter directive for a configured log level.
pub fn default_directive(level: &str) -> String {
    format!("metronome={level},tower_http={level}", level = level.to_ascii_lowercase())
}

/// Install the global subscriber described by the configuration.
pub fn init_logging(config: &ObservabilityConfig) -> Result<(), LoggingError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_directive(&config.log_level).into());

    let (stdout_layer, file_layer) = match &config.log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|source| LoggingError::LogFile {
                    path: path.clone(),
                    source,
                })?;
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(file));
            (None, Some(layer))
        }
        None => (Some(tracing_subscriber::fmt::layer()), None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stdout_layer)
        .with(file_layer)
        .try_init()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directive() {
        assert_eq!(default_directive("DEBUG"), "metronome=debug,tower_http=debug");
    }

    #[test]
    fn test_unwritable_log_file() {
        let config = ObservabilityConfig {
            log_file: Some("/nonexistent/dir/metronome.log".into()),
            ..ObservabilityConfig::default()
        };
        assert!(matches!(init_logging(&config), Err(LoggingError::LogFile { .. })));
    }
}
