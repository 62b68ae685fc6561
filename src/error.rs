// src/error.rs

//! Unified error handling for discovery and polling.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::models::DiscoverySignal;

/// Result type alias for modem-auth operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Why an authentication attempt was rejected.
///
/// Lockout and reboot-required are kept apart from bad credentials because
/// the user has to do something different to recover from each.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailureKind {
    /// The device rejected the username or password.
    InvalidCredentials,
    /// Too many failed attempts; the device refuses logins for a while.
    LockedOut,
    /// The device will not accept logins until it is power cycled.
    RebootRequired,
    /// The strategy needs credentials but none were supplied.
    MissingCredentials,
    /// Login was accepted but the data fetch still served a login page.
    SessionRejected,
}

impl AuthFailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthFailureKind::InvalidCredentials => "invalid credentials",
            AuthFailureKind::LockedOut => "device locked out further logins",
            AuthFailureKind::RebootRequired => "device requires a reboot before login",
            AuthFailureKind::MissingCredentials => "credentials required but not supplied",
            AuthFailureKind::SessionRejected => "session rejected after re-login",
        }
    }
}

impl fmt::Display for AuthFailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// Timeout, DNS failure, connection refused. Always retryable later.
    #[error("Connectivity error: {0}")]
    Connectivity(String),

    /// The device rejected the login.
    #[error("Authentication failed: {kind}")]
    Authentication { kind: AuthFailureKind },

    /// Discovery ran out of candidate strategies.
    #[error("No matching authentication strategy ({} signals collected)", signals.len())]
    NoMatchingStrategy { signals: Vec<DiscoverySignal> },

    /// The session was invalidated by the device. Consumed inside one poll cycle.
    #[error("Session expired")]
    SessionExpired,

    /// A content extractor failed on the fetched body.
    #[error("Extraction failed in '{extractor}': {message}")]
    Extraction { extractor: String, message: String },

    /// Polling is paused after repeated failures.
    #[error("Circuit open, retry in {}s", retry_in.as_secs())]
    CircuitOpen { retry_in: Duration },

    /// A persisted strategy tag this build does not know.
    #[error("Unsupported strategy: {0}")]
    UnsupportedStrategy(String),

    /// The poll cycle was cancelled between or during network calls.
    #[error("Operation cancelled")]
    Cancelled,

    /// The device answered with something the protocol does not allow.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization failed
    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Anything that should not happen. Always logged with context.
    #[error("Unexpected error in {context}: {message}")]
    Unexpected { context: String, message: String },
}

impl AppError {
    /// Create a connectivity error.
    pub fn connectivity(message: impl fmt::Display) -> Self {
        Self::Connectivity(message.to_string())
    }

    /// Create an authentication error.
    pub fn auth(kind: AuthFailureKind) -> Self {
        Self::Authentication { kind }
    }

    /// Create a protocol error.
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol(message.into())
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create an extraction error attributed to one extractor.
    pub fn extraction(extractor: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Extraction {
            extractor: extractor.into(),
            message: message.to_string(),
        }
    }

    /// Create the fallback error. Logs the context immediately.
    pub fn unexpected(context: impl Into<String>, message: impl fmt::Display) -> Self {
        let context = context.into();
        let message = message.to_string();
        log::error!("Unexpected error in {}: {}", context, message);
        Self::Unexpected { context, message }
    }

    /// Authentication failure kind, if this is an authentication error.
    pub fn auth_kind(&self) -> Option<AuthFailureKind> {
        match self {
            Self::Authentication { kind } => Some(*kind),
            _ => None,
        }
    }

    /// Whether a later attempt may succeed without user action.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Connectivity(_) | Self::CircuitOpen { .. } | Self::Cancelled
        )
    }

    /// Whether this outcome counts toward the circuit breaker's failure streak.
    /// Every failed cycle does, except cancellation, an already open circuit
    /// and extractor errors raised after the fetch succeeded.
    pub fn counts_as_poll_failure(&self) -> bool {
        !matches!(
            self,
            Self::Cancelled | Self::CircuitOpen { .. } | Self::Extraction { .. }
        )
    }
}

impl From<reqwest::Error> for AppError {
    fn from(error: reqwest::Error) -> Self {
        // The URL may carry an embedded login token.
        let error = error.without_url();
        if error.is_timeout() {
            Self::Connectivity(format!("request timed out: {error}"))
        } else if error.is_connect() {
            Self::Connectivity(format!("connection failed: {error}"))
        } else if error.is_builder() {
            Self::unexpected("http client", error)
        } else {
            Self::Connectivity(error.to_string())
        }
    }
}
