//! Error types for the session pool.

use crate::SessionState;
use thiserror::Error;

/// Errors raised by room session lifecycle operations.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The requested transition is not allowed from the current state.
    #[error("invalid session transition from {from:?} to {to:?}")]
    InvalidTransition {
        from: SessionState,
        to: SessionState,
    },

    /// The session was disposed and can no longer be used.
    #[error("session {server_id}/{room_id} is disposed")]
    Disposed { server_id: String, room_id: String },

    /// The run itself failed.
    #[error(transparent)]
    Run(#[from] strand_thread::ThreadError),
}

/// Errors raised by the connection registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// A server id was registered twice.
    #[error("server {server_id} is already registered")]
    DuplicateServer { server_id: String },

    /// No connection is registered for the server id.
    #[error("unknown server: {server_id}")]
    UnknownServer { server_id: String },
}
