//! Error types surfaced by the matching and dispatch engine.

use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Coarse classification of a [`ProxyError`], used for metrics labels,
/// the `x-decoy-error` response header and HTTP status mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    SchemaError,
    NoMatch,
    MiddlewareUnavailable,
    MiddlewareTimeout,
    MiddlewareInvalidOutput,
    UpstreamUnavailable,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::SchemaError => "schema_error",
            ErrorKind::NoMatch => "no_match",
            ErrorKind::MiddlewareUnavailable => "middleware_unavailable",
            ErrorKind::MiddlewareTimeout => "middleware_timeout",
            ErrorKind::MiddlewareInvalidOutput => "middleware_invalid_output",
            ErrorKind::UpstreamUnavailable => "upstream_unavailable",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum ProxyError {
    /// Malformed simulation document; the import is rejected wholesale.
    #[error("Invalid simulation: {0}")]
    Schema(String),

    /// No pair matched the request in a simulating mode.
    #[error("No match found{}", closest_miss_suffix(.closest_miss))]
    NoMatch { closest_miss: Option<String> },

    #[error("Middleware unavailable: {0}")]
    MiddlewareUnavailable(String),

    #[error("Middleware timed out after {}ms", .0.as_millis())]
    MiddlewareTimeout(Duration),

    #[error("Middleware produced invalid output: {0}")]
    MiddlewareInvalidOutput(String),

    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),
}

fn closest_miss_suffix(closest_miss: &Option<String>) -> String {
    match closest_miss {
        Some(miss) => format!(" (closest miss: {miss})"),
        None => String::new(),
    }
}

impl ProxyError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ProxyError::Schema(_) => ErrorKind::SchemaError,
            ProxyError::NoMatch { .. } => ErrorKind::NoMatch,
            ProxyError::MiddlewareUnavailable(_) => ErrorKind::MiddlewareUnavailable,
            ProxyError::MiddlewareTimeout(_) => ErrorKind::MiddlewareTimeout,
            ProxyError::MiddlewareInvalidOutput(_) => ErrorKind::MiddlewareInvalidOutput,
            ProxyError::UpstreamUnavailable(_) => ErrorKind::UpstreamUnavailable,
        }
    }

    /// HTTP status used when this error is turned into a client response.
    ///
    /// `no_match_status` is the operator-configured status for simulation misses.
    pub fn status_code(&self, no_match_status: u16) -> u16 {
        match self.kind() {
            ErrorKind::NoMatch => no_match_status,
            ErrorKind::UpstreamUnavailable => 502,
            ErrorKind::SchemaError => 400,
            ErrorKind::MiddlewareUnavailable
            | ErrorKind::MiddlewareTimeout
            | ErrorKind::MiddlewareInvalidOutput => 503,
        }
    }
}
