//! Single-slot accumulator for the one in-flight streamed text message.

use crate::BufferError;
use strand_protocol_ag_ui::{ChatMessage, Role};

struct ActiveMessage {
    message_id: String,
    role: Role,
    content: String,
}

/// Accumulates at most one streaming text message at a time.
///
/// Misuse is a protocol state fault, not a silent no-op: `start` while
/// active and `append`/`complete` while inactive both fault without
/// mutating the buffer.
#[derive(Default)]
pub struct TextMessageBuffer {
    active: Option<ActiveMessage>,
}

impl TextMessageBuffer {
    /// Create an inactive buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin accumulating a message.
    pub fn start(
        &mut self,
        message_id: impl Into<String>,
        role: Role,
    ) -> Result<(), BufferError> {
        if let Some(active) = &self.active {
            return Err(BufferError::message_already_active(&active.message_id));
        }
        self.active = Some(ActiveMessage {
            message_id: message_id.into(),
            role,
            content: String::new(),
        });
        Ok(())
    }

    /// Append a content delta to the active message.
    pub fn append(&mut self, delta: &str) -> Result<(), BufferError> {
        let active = self.active.as_mut().ok_or(BufferError::NoActiveMessage)?;
        active.content.push_str(delta);
        Ok(())
    }

    /// Finalize the active message and deactivate the buffer.
    ///
    /// The buffer is immediately reusable for the next message.
    pub fn complete(&mut self) -> Result<ChatMessage, BufferError> {
        let active = self.active.take().ok_or(BufferError::NoActiveMessage)?;
        Ok(ChatMessage::text(
            active.message_id,
            active.role,
            active.content,
        ))
    }

    /// Discard any active accumulation.
    pub fn reset(&mut self) {
        self.active = None;
    }

    /// Whether a message is currently streaming.
    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// The active message's id, if any.
    pub fn current_message_id(&self) -> Option<&str> {
        self.active.as_ref().map(|a| a.message_id.as_str())
    }
}
