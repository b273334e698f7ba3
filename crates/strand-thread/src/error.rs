//! Error types for the thread engine.

use thiserror::Error;

/// Protocol state faults raised by the streaming buffers.
///
/// These indicate a genuine desynchronization between sender and
/// receiver, so they surface loudly instead of being swallowed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BufferError {
    /// `start` was called while a message was already streaming.
    #[error("message {message_id} already active; call complete or reset first")]
    MessageAlreadyActive { message_id: String },

    /// `append`/`complete` was called with no active message.
    #[error("no active message; call start first")]
    NoActiveMessage,

    /// A tool call id was started twice.
    #[error("tool call {call_id} already active")]
    DuplicateToolCall { call_id: String },

    /// A tool call id was referenced before being started.
    #[error("unknown tool call: {call_id}")]
    UnknownToolCall { call_id: String },
}

impl BufferError {
    /// Create a message-already-active fault.
    pub fn message_already_active(message_id: impl Into<String>) -> Self {
        BufferError::MessageAlreadyActive {
            message_id: message_id.into(),
        }
    }

    /// Create a duplicate-tool-call fault.
    pub fn duplicate_tool_call(call_id: impl Into<String>) -> Self {
        BufferError::DuplicateToolCall {
            call_id: call_id.into(),
        }
    }

    /// Create an unknown-tool-call fault.
    pub fn unknown_tool_call(call_id: impl Into<String>) -> Self {
        BufferError::UnknownToolCall {
            call_id: call_id.into(),
        }
    }
}

/// Tool registry registration errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ToolRegistryError {
    /// A tool name was registered twice without an unregister in between.
    #[error("tool {name} is already registered; unregister it first")]
    DuplicateTool { name: String },
}

/// Tool execution errors.
#[derive(Debug, Clone, Error)]
pub enum ToolError {
    #[error("execution failed: {0}")]
    ExecutionFailed(String),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Errors surfaced by [`crate::AgentThread`] runs.
#[derive(Debug, Error)]
pub enum ThreadError {
    /// `run` was called while another run was in flight.
    #[error("a run is already in progress on this thread")]
    RunInProgress,

    /// A protocol state fault escaped the buffers (see [`BufferError`]).
    #[error(transparent)]
    Buffer(#[from] BufferError),

    /// The underlying stream failed.
    #[error(transparent)]
    Transport(#[from] strand_transport::TransportError),
}
