//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (intervals > 0, capacities > 0)
//! - Validate addresses before anything binds to them
//!
//! # Design Decisions
//! - Returns all validation errors, not just the first
//! - Pure function: MetronomeConfig → Result<(), Vec<ValidationError>>

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::MetronomeConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field} is not a valid socket address: {value:?}")]
    InvalidAddress { field: &'static str, value: String },

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("connection.ping_period_ms ({ping_period_ms}) must be shorter than connection.pong_wait_ms ({pong_wait_ms})")]
    PingPeriodTooLong { ping_period_ms: u64, pong_wait_ms: u64 },

    #[error("observability.log_level {0:?} is not one of trace, debug, info, warn, error")]
    UnknownLogLevel(String),
}

/// Check a configuration for semantic errors.
pub fn validate_config(config: &MetronomeConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if !is_bind_address(&config.server.bind_target()) {
        errors.push(ValidationError::InvalidAddress {
            field: "server.bind_address",
            value: config.server.bind_address.clone(),
        });
    }

    let positive = [
        ("server.update_interval_ms", config.server.update_interval_ms),
        ("server.plugin_timeout_ms", config.server.plugin_timeout_ms),
        ("server.request_timeout_secs", config.server.request_timeout_secs),
        ("connection.write_wait_ms", config.connection.write_wait_ms),
        ("connection.pong_wait_ms", config.connection.pong_wait_ms),
        ("connection.ping_period_ms", config.connection.ping_period_ms),
        ("connection.queue_capacity", config.connection.queue_capacity as u64),
        ("connection.max_message_size", config.connection.max_message_size as u64),
    ];
    for (field, value) in positive {
        if value == 0 {
            errors.push(ValidationError::Zero(field));
        }
    }

    let connection = &config.connection;
    if connection.ping_period_ms > 0 && connection.ping_period_ms >= connection.pong_wait_ms {
        errors.push(ValidationError::PingPeriodTooLong {
            ping_period_ms: connection.ping_period_ms,
            pong_wait_ms: connection.pong_wait_ms,
        });
    }

    let level = config.observability.log_level.to_ascii_lowercase();
    if !matches!(level.as_str(), "trace" | "debug" | "info" | "warn" | "error") {
        errors.push(ValidationError::UnknownLogLevel(
            config.observability.log_level.clone(),
        ));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidAddress {
            field: "observability.metrics_address",
            value: config.observability.metrics_address.clone(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// `host:port` with a numeric port. Hostnames are resolved at bind time.
fn is_bind_address(address: &str) -> bool {
    if address.parse::<SocketAddr>().is_ok() {
        return true;
    }
    match address.rsplit_once(':') {
        Some((host, port)) => {
            !host.is_empty() && !host.contains(':') && port.parse::<u16>().is_ok()
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&MetronomeConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_every_error() {
        let mut config = MetronomeConfig::default();
        config.server.bind_address = "not-an-address".into();
        config.server.update_interval_ms = 0;
        config.connection.queue_capacity = 0;

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(errors.contains(&ValidationError::Zero("server.update_interval_ms")));
        assert!(errors.contains(&ValidationError::Zero("connection.queue_capacity")));
    }

    #[test]
    fn test_bind_address_forms() {
        let mut config = MetronomeConfig::default();
        for accepted in ["127.0.0.1:8999", "[::1]:8999", "localhost:8999", ":8999"] {
            config.server.bind_address = accepted.into();
            assert!(validate_config(&config).is_ok(), "{accepted}");
        }
        for rejected in ["localhost", "localhost:http", "host:99999", ""] {
            config.server.bind_address = rejected.into();
            assert!(validate_config(&config).is_err(), "{rejected}");
        }
    }

    #[test]
    fn test_ping_must_precede_liveness_deadline() {
        let mut config = MetronomeConfig::default();
        config.connection.ping_period_ms = 60_000;
        config.connection.pong_wait_ms = 60_000;

        let errors = validate_config(&config).unwrap_err();
        assert!(matches!(errors[0], ValidationError::PingPeriodTooLong { .. }));
    }

    #[test]
    fn test_metrics_address_checked_only_when_enabled() {
        let mut config = MetronomeConfig::default();
        config.observability.metrics_address = "nope".into();
        assert!(validate_config(&config).is_ok());

        config.observability.metrics_enabled = true;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_unknown_log_level() {
        let mut config = MetronomeConfig::default();
        config.observability.log_level = "loud".into();
        assert_eq!(
            validate_config(&config).unwrap_err(),
            vec![ValidationError::UnknownLogLevel("loud".into())]
        );
    }
}
