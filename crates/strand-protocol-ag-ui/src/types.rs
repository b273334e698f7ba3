//! Conversation data model built from the event stream.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::hash::{Hash, Hasher};
use uuid::Uuid;

/// Role of a conversation participant.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    #[default]
    Assistant,
    System,
}

impl Role {
    /// Parse a wire role string. Unrecognized strings default to assistant.
    pub fn parse(raw: &str) -> Role {
        match raw {
            "user" => Role::User,
            "system" => Role::System,
            _ => Role::Assistant,
        }
    }
}

/// Presentation kind of a chat message.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum MessageKind {
    #[default]
    Text,
    Error,
    ToolCall,
    GenUi,
    Loading,
}

/// Lifecycle status of a tool call.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ToolCallStatus {
    #[default]
    Pending,
    Executing,
    Completed,
    Failed,
}

/// One tool call tracked across its streaming lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCallInfo {
    /// Stable call identifier.
    pub id: String,
    /// Tool name.
    pub name: String,
    /// Accumulated raw argument text (expected to be JSON).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arguments: Option<String>,
    /// Current lifecycle status.
    pub status: ToolCallStatus,
    /// Execution result, once available.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    /// Unix-epoch millis when the call started streaming.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<u64>,
    /// Unix-epoch millis when the result arrived.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<u64>,
}

impl ToolCallInfo {
    /// Create a freshly started tool call.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments: None,
            status: ToolCallStatus::Pending,
            result: None,
            started_at: Some(now_ms()),
            completed_at: None,
        }
    }
}

/// One message in a conversation thread.
///
/// Identity is the `id` alone: two messages with the same id are the same
/// logical message regardless of content, which supports replace-in-place
/// while a message is still streaming.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Stable message identifier.
    pub id: String,
    /// Author role.
    pub role: Role,
    /// Presentation kind.
    pub kind: MessageKind,
    /// Text content, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Whether text content is still streaming.
    pub is_streaming: bool,
    /// Reasoning text, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thinking_text: Option<String>,
    /// Whether reasoning text is still streaming.
    pub is_thinking_streaming: bool,
    /// Tool calls attached to this message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCallInfo>>,
    /// Error detail for error-kind messages.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Unix-epoch millis when the message was created.
    pub created_at: u64,
}

impl ChatMessage {
    /// Create a finalized text message.
    pub fn text(id: impl Into<String>, role: Role, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role,
            kind: MessageKind::Text,
            text: Some(text.into()),
            is_streaming: false,
            thinking_text: None,
            is_thinking_streaming: false,
            tool_calls: None,
            error_message: None,
            created_at: now_ms(),
        }
    }

    /// Create an error message.
    pub fn error(id: impl Into<String>, error_message: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role: Role::Assistant,
            kind: MessageKind::Error,
            text: None,
            is_streaming: false,
            thinking_text: None,
            is_thinking_streaming: false,
            tool_calls: None,
            error_message: Some(error_message.into()),
            created_at: now_ms(),
        }
    }

    /// Create a tool-call message carrying one call.
    pub fn tool_call(id: impl Into<String>, call: ToolCallInfo) -> Self {
        Self {
            id: id.into(),
            role: Role::Assistant,
            kind: MessageKind::ToolCall,
            text: None,
            is_streaming: false,
            thinking_text: None,
            is_thinking_streaming: false,
            tool_calls: Some(vec![call]),
            error_message: None,
            created_at: now_ms(),
        }
    }

    /// Parse one MESSAGES_SNAPSHOT entry defensively.
    ///
    /// Returns `None` when the entry is not an object or lacks a string
    /// `id`; unrecognized role strings default to assistant.
    pub fn from_snapshot_entry(raw: &Value) -> Option<ChatMessage> {
        let obj = raw.as_object()?;
        let id = obj.get("id").and_then(Value::as_str)?;
        if id.is_empty() {
            return None;
        }
        let role = obj
            .get("role")
            .or_else(|| obj.get("user"))
            .and_then(Value::as_str)
            .map(Role::parse)
            .unwrap_or_default();
        let text = obj
            .get("content")
            .or_else(|| obj.get("text"))
            .and_then(Value::as_str)
            .map(str::to_string);
        Some(ChatMessage {
            id: id.to_string(),
            role,
            kind: MessageKind::Text,
            text,
            is_streaming: false,
            thinking_text: None,
            is_thinking_streaming: false,
            tool_calls: None,
            error_message: None,
            created_at: now_ms(),
        })
    }
}

impl PartialEq for ChatMessage {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ChatMessage {}

impl Hash for ChatMessage {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// Body of the run request POSTed to the agent endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunAgentInput {
    /// The user's message for this run.
    pub message: String,
    /// Optional initial state for the run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<Value>,
}

impl RunAgentInput {
    /// Create a run input from a user message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            state: None,
        }
    }

    /// Set the initial state.
    pub fn with_state(mut self, state: Value) -> Self {
        self.state = Some(state);
        self
    }
}

/// Current unix-epoch time in milliseconds.
pub fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map_or(0, |d| d.as_millis().min(u128::from(u64::MAX)) as u64)
}

/// Generate a fresh message id.
pub fn gen_message_id() -> String {
    format!("msg_{}", Uuid::new_v4().simple())
}
