//! Transport error types.

use std::time::Duration;
use thiserror::Error;

/// Errors surfaced by the transport layer.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Request could not be sent or the connection failed mid-flight.
    #[error("request failed: {0}")]
    Request(String),

    /// Server answered with an unexpected status code.
    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    /// A retried request failed authentication again after a refresh.
    #[error("authentication failed after credential refresh")]
    AuthFailed,

    /// The credential refresh itself failed.
    #[error("credential refresh failed: {0}")]
    RefreshFailed(String),

    /// The idle watchdog elapsed with no event received.
    #[error("no event received for {0:?}")]
    IdleTimeout(Duration),

    /// The run was cancelled by the caller.
    #[error("cancelled")]
    Cancelled,

    /// Response body could not be decoded.
    #[error("decode failed: {0}")]
    Decode(String),

    /// Client-side configuration problem (bad header value, bad URL).
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        TransportError::Request(e.to_string())
    }
}
