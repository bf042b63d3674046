//! HTTP Basic authentication.
//!
//! With no credentials configured every request passes. Otherwise a
//! request without a usable `Authorization: Basic` header gets 401 with a
//! challenge, and one with the wrong pair gets 403. The check runs before
//! the WebSocket upgrade, so a rejected client never reaches the hub.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use thiserror::Error;

use crate::config::ServerConfig;

/// `WWW-Authenticate` value sent with every 401.
pub const CHALLENGE: &str = r#"Basic realm="metronome""#;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("Authorization scheme is not Basic")]
    NotBasic,

    #[error("Credentials are not valid base64")]
    InvalidEncoding,

    #[error("Credentials are missing the ':' separator")]
    MissingSeparator,
}

/// A username/password pair.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Credentials required by the server, or `None` when both fields are
    /// empty and authentication is off.
    pub fn from_config(config: &ServerConfig) -> Option<Self> {
        if config.auth_enabled() {
            Some(Self::new(&config.username, &config.password))
        } else {
            None
        }
    }

    /// Encode as an `Authorization` header value.
    pub fn header_value(&self) -> String {
        let token = STANDARD.encode(format!("{}:{}", self.username, self.password));
        format!("Basic {token}")
    }

    /// Parse an `Authorization` header value.
    pub fn parse_basic(value: &str) -> Result<Self, AuthError> {
        let (scheme, token) = value.trim().split_once(' ').ok_or(AuthError::NotBasic)?;
        if !scheme.eq_ignore_ascii_case("basic") {
            return Err(AuthError::NotBasic);
        }

        let decoded = STANDARD
            .decode(token.trim())
            .map_err(|_| AuthError::InvalidEncoding)?;
        let decoded = String::from_utf8(decoded).map_err(|_| AuthError::InvalidEncoding)?;

        // Passwords may contain ':'; usernames may not.
        let (username, password) = decoded.split_once(':').ok_or(AuthError::MissingSeparator)?;
        Ok(Self::new(username, password))
    }
}

/// State handed to [`basic_auth_middleware`].
#[derive(Debug, Clone, Default)]
pub struct AuthState {
    credentials: Option<Arc<Credentials>>,
}

impl AuthState {
    pub fn new(credentials: Option<Credentials>) -> Self {
        Self {
            credentials: credentials.map(Arc::new),
        }
    }

    pub fn from_config(config: &ServerConfig) -> Self {
        Self::new(Credentials::from_config(config))
    }

    pub fn enabled(&self) -> bool {
        self.credentials.is_some()
    }
}

pub async fn basic_auth_middleware(
    State(auth): State<AuthState>,
    request: Request,
    next: Next,
) -> Response {
    let Some(expected) = auth.credentials.as_deref() else {
        return next.run(request).await;
    };

    let presented = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(Credentials::parse_basic);

    match presented {
        Some(Ok(credentials)) if credentials == *expected => next.run(request).await,
        Some(Ok(credentials)) => {
            tracing::warn!(
                username = %credentials.username,
                path = %request.uri().path(),
                "Rejected request with wrong credentials"
            );
            StatusCode::FORBIDDEN.into_response()
        }
        Some(Err(e)) => {
            tracing::debug!(error = %e, path = %request.uri().path(), "Unusable Authorization header");
            challenge()
        }
        None => {
            tracing::debug!(path = %request.uri().path(), "Request without credentials");
            challenge()
        }
    }
}

fn challenge() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        [(header::WWW_AUTHENTICATE, HeaderValue::from_static(CHALLENGE))],
    )
        .into_response()
}
