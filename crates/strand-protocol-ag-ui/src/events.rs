//! AG-UI protocol event model.
//!
//! One closed variant set, tagged by the wire `type` string. Decoding is
//! total: unknown type strings produce [`Event::Unknown`] with the raw
//! envelope preserved, and missing fields within known variants default
//! to empty values. Backends are allowed to omit optional detail, so the
//! model favors resilience over strictness.

use serde::Serialize;
use serde_json::Value;

/// AG-UI Protocol Event Types.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type")]
pub enum Event {
    // ========================================================================
    // Lifecycle Events
    // ========================================================================
    /// Signals the start of an agent run.
    #[serde(rename = "RUN_STARTED")]
    RunStarted { thread_id: String, run_id: String },

    /// Signals successful completion of an agent run.
    #[serde(rename = "RUN_FINISHED")]
    RunFinished {
        thread_id: String,
        run_id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        result: Option<Value>,
    },

    /// Indicates an error occurred during the run.
    #[serde(rename = "RUN_ERROR")]
    RunError {
        thread_id: String,
        run_id: String,
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        code: Option<String>,
    },

    /// Marks the beginning of a step within a run.
    #[serde(rename = "STEP_STARTED")]
    StepStarted { step_name: String },

    /// Marks the completion of a step.
    #[serde(rename = "STEP_FINISHED")]
    StepFinished { step_name: String },

    // ========================================================================
    // Text Message Events
    // ========================================================================
    /// Indicates the beginning of a text message stream.
    #[serde(rename = "TEXT_MESSAGE_START")]
    TextMessageStart { message_id: String },

    /// Contains incremental text content.
    #[serde(rename = "TEXT_MESSAGE_CONTENT")]
    TextMessageContent { message_id: String, delta: String },

    /// Indicates the end of a text message stream.
    #[serde(rename = "TEXT_MESSAGE_END")]
    TextMessageEnd { message_id: String },

    // ========================================================================
    // Tool Call Events
    // ========================================================================
    /// Signals the start of a tool call.
    #[serde(rename = "TOOL_CALL_START")]
    ToolCallStart {
        tool_call_id: String,
        tool_call_name: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        parent_message_id: Option<String>,
    },

    /// Contains incremental tool arguments.
    #[serde(rename = "TOOL_CALL_ARGS")]
    ToolCallArgs { tool_call_id: String, delta: String },

    /// Signals the end of tool argument streaming.
    #[serde(rename = "TOOL_CALL_END")]
    ToolCallEnd { tool_call_id: String },

    /// Contains the result of a tool execution.
    #[serde(rename = "TOOL_CALL_RESULT")]
    ToolCallResult {
        message_id: String,
        tool_call_id: String,
        content: String,
    },

    // ========================================================================
    // State Management Events
    // ========================================================================
    /// Provides a complete state snapshot.
    #[serde(rename = "STATE_SNAPSHOT")]
    StateSnapshot { snapshot: Value },

    /// Contains incremental state changes (JSON Patch operations).
    #[serde(rename = "STATE_DELTA")]
    StateDelta { delta: Vec<Value> },

    /// Provides a complete message history snapshot.
    #[serde(rename = "MESSAGES_SNAPSHOT")]
    MessagesSnapshot { messages: Vec<Value> },

    // ========================================================================
    // Activity Events
    // ========================================================================
    /// Provides an activity snapshot.
    #[serde(rename = "ACTIVITY_SNAPSHOT")]
    ActivitySnapshot {
        message_id: String,
        activity_type: String,
        content: Value,
    },

    /// Contains incremental activity changes (JSON Patch operations).
    #[serde(rename = "ACTIVITY_DELTA")]
    ActivityDelta {
        message_id: String,
        activity_type: String,
        patch: Vec<Value>,
    },

    // ========================================================================
    // Special Events
    // ========================================================================
    /// Custom application-defined event.
    #[serde(rename = "CUSTOM")]
    Custom { name: String, data: Value },

    /// Fallback for unrecognized type strings. Carries the raw type and
    /// the full raw envelope; decoding never fails the stream.
    #[serde(rename = "UNKNOWN")]
    Unknown { raw_type: String, raw: Value },
}

impl Event {
    /// Decode one wire envelope into an event.
    ///
    /// Total: unrecognized `type` strings (or a missing/non-string type
    /// field) decode to [`Event::Unknown`]; missing expected fields in
    /// known variants default to empty string / empty list / null.
    pub fn decode(raw: &Value) -> Event {
        let Some(event_type) = raw.get("type").and_then(Value::as_str) else {
            return Event::Unknown {
                raw_type: String::new(),
                raw: raw.clone(),
            };
        };

        match event_type {
            "RUN_STARTED" => Event::RunStarted {
                thread_id: str_field(raw, &["thread_id", "threadId"]),
                run_id: str_field(raw, &["run_id", "runId"]),
            },
            "RUN_FINISHED" => Event::RunFinished {
                thread_id: str_field(raw, &["thread_id", "threadId"]),
                run_id: str_field(raw, &["run_id", "runId"]),
                result: raw.get("result").cloned(),
            },
            "RUN_ERROR" => Event::RunError {
                thread_id: str_field(raw, &["thread_id", "threadId"]),
                run_id: str_field(raw, &["run_id", "runId"]),
                message: str_field(raw, &["message"]),
                code: opt_str_field(raw, &["code"]),
            },
            "STEP_STARTED" => Event::StepStarted {
                step_name: str_field(raw, &["step_name", "stepName"]),
            },
            "STEP_FINISHED" => Event::StepFinished {
                step_name: str_field(raw, &["step_name", "stepName"]),
            },
            "TEXT_MESSAGE_START" => Event::TextMessageStart {
                message_id: str_field(raw, &["message_id", "messageId"]),
            },
            "TEXT_MESSAGE_CONTENT" => Event::TextMessageContent {
                message_id: str_field(raw, &["message_id", "messageId"]),
                delta: str_field(raw, &["delta"]),
            },
            "TEXT_MESSAGE_END" => Event::TextMessageEnd {
                message_id: str_field(raw, &["message_id", "messageId"]),
            },
            "TOOL_CALL_START" => Event::ToolCallStart {
                tool_call_id: str_field(raw, &["tool_call_id", "toolCallId"]),
                tool_call_name: str_field(raw, &["tool_call_name", "toolCallName"]),
                parent_message_id: opt_str_field(raw, &["parent_message_id", "parentMessageId"]),
            },
            "TOOL_CALL_ARGS" => Event::ToolCallArgs {
                tool_call_id: str_field(raw, &["tool_call_id", "toolCallId"]),
                delta: str_field(raw, &["delta"]),
            },
            "TOOL_CALL_END" => Event::ToolCallEnd {
                tool_call_id: str_field(raw, &["tool_call_id", "toolCallId"]),
            },
            "TOOL_CALL_RESULT" => Event::ToolCallResult {
                message_id: str_field(raw, &["message_id", "messageId"]),
                tool_call_id: str_field(raw, &["tool_call_id", "toolCallId"]),
                content: str_field(raw, &["content"]),
            },
            "STATE_SNAPSHOT" => Event::StateSnapshot {
                snapshot: value_field(raw, "snapshot"),
            },
            "STATE_DELTA" => Event::StateDelta {
                delta: list_field(raw, "delta"),
            },
            "MESSAGES_SNAPSHOT" => Event::MessagesSnapshot {
                messages: list_field(raw, "messages"),
            },
            "ACTIVITY_SNAPSHOT" => Event::ActivitySnapshot {
                message_id: str_field(raw, &["message_id", "messageId"]),
                activity_type: str_field(raw, &["activity_type", "activityType"]),
                content: value_field(raw, "content"),
            },
            "ACTIVITY_DELTA" => Event::ActivityDelta {
                message_id: str_field(raw, &["message_id", "messageId"]),
                activity_type: str_field(raw, &["activity_type", "activityType"]),
                patch: list_field(raw, "patch"),
            },
            "CUSTOM" => Event::Custom {
                name: str_field(raw, &["name"]),
                data: value_field(raw, "data"),
            },
            other => Event::Unknown {
                raw_type: other.to_string(),
                raw: raw.clone(),
            },
        }
    }

    /// The wire type string for this event.
    pub fn event_type(&self) -> &str {
        match self {
            Event::RunStarted { .. } => "RUN_STARTED",
            Event::RunFinished { .. } => "RUN_FINISHED",
            Event::RunError { .. } => "RUN_ERROR",
            Event::StepStarted { .. } => "STEP_STARTED",
            Event::StepFinished { .. } => "STEP_FINISHED",
            Event::TextMessageStart { .. } => "TEXT_MESSAGE_START",
            Event::TextMessageContent { .. } => "TEXT_MESSAGE_CONTENT",
            Event::TextMessageEnd { .. } => "TEXT_MESSAGE_END",
            Event::ToolCallStart { .. } => "TOOL_CALL_START",
            Event::ToolCallArgs { .. } => "TOOL_CALL_ARGS",
            Event::ToolCallEnd { .. } => "TOOL_CALL_END",
            Event::ToolCallResult { .. } => "TOOL_CALL_RESULT",
            Event::StateSnapshot { .. } => "STATE_SNAPSHOT",
            Event::StateDelta { .. } => "STATE_DELTA",
            Event::MessagesSnapshot { .. } => "MESSAGES_SNAPSHOT",
            Event::ActivitySnapshot { .. } => "ACTIVITY_SNAPSHOT",
            Event::ActivityDelta { .. } => "ACTIVITY_DELTA",
            Event::Custom { .. } => "CUSTOM",
            Event::Unknown { raw_type, .. } => raw_type,
        }
    }

    // ========================================================================
    // Factory Methods
    // ========================================================================

    /// Create a run-started event.
    pub fn run_started(thread_id: impl Into<String>, run_id: impl Into<String>) -> Self {
        Self::RunStarted {
            thread_id: thread_id.into(),
            run_id: run_id.into(),
        }
    }

    /// Create a run-finished event.
    pub fn run_finished(thread_id: impl Into<String>, run_id: impl Into<String>) -> Self {
        Self::RunFinished {
            thread_id: thread_id.into(),
            run_id: run_id.into(),
            result: None,
        }
    }

    /// Create a run-error event.
    pub fn run_error(
        thread_id: impl Into<String>,
        run_id: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::RunError {
            thread_id: thread_id.into(),
            run_id: run_id.into(),
            message: message.into(),
            code: None,
        }
    }

    /// Create a step-started event.
    pub fn step_started(step_name: impl Into<String>) -> Self {
        Self::StepStarted {
            step_name: step_name.into(),
        }
    }

    /// Create a step-finished event.
    pub fn step_finished(step_name: impl Into<String>) -> Self {
        Self::StepFinished {
            step_name: step_name.into(),
        }
    }

    /// Create a text-message-start event.
    pub fn text_message_start(message_id: impl Into<String>) -> Self {
        Self::TextMessageStart {
            message_id: message_id.into(),
        }
    }

    /// Create a text-message-content event.
    pub fn text_message_content(message_id: impl Into<String>, delta: impl Into<String>) -> Self {
        Self::TextMessageContent {
            message_id: message_id.into(),
            delta: delta.into(),
        }
    }

    /// Create a text-message-end event.
    pub fn text_message_end(message_id: impl Into<String>) -> Self {
        Self::TextMessageEnd {
            message_id: message_id.into(),
        }
    }

    /// Create a tool-call-start event.
    pub fn tool_call_start(
        tool_call_id: impl Into<String>,
        tool_call_name: impl Into<String>,
        parent_message_id: Option<String>,
    ) -> Self {
        Self::ToolCallStart {
            tool_call_id: tool_call_id.into(),
            tool_call_name: tool_call_name.into(),
            parent_message_id,
        }
    }

    /// Create a tool-call-args event.
    pub fn tool_call_args(tool_call_id: impl Into<String>, delta: impl Into<String>) -> Self {
        Self::ToolCallArgs {
            tool_call_id: tool_call_id.into(),
            delta: delta.into(),
        }
    }

    /// Create a tool-call-end event.
    pub fn tool_call_end(tool_call_id: impl Into<String>) -> Self {
        Self::ToolCallEnd {
            tool_call_id: tool_call_id.into(),
        }
    }

    /// Create a tool-call-result event.
    pub fn tool_call_result(
        message_id: impl Into<String>,
        tool_call_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self::ToolCallResult {
            message_id: message_id.into(),
            tool_call_id: tool_call_id.into(),
            content: content.into(),
        }
    }

    /// Create a state-snapshot event.
    pub fn state_snapshot(snapshot: Value) -> Self {
        Self::StateSnapshot { snapshot }
    }

    /// Create a state-delta event.
    pub fn state_delta(delta: Vec<Value>) -> Self {
        Self::StateDelta { delta }
    }

    /// Create a messages-snapshot event.
    pub fn messages_snapshot(messages: Vec<Value>) -> Self {
        Self::MessagesSnapshot { messages }
    }

    /// Create a custom event.
    pub fn custom(name: impl Into<String>, data: Value) -> Self {
        Self::Custom {
            name: name.into(),
            data,
        }
    }
}

/// Extract a string field, trying `keys` in order. Defaults to empty.
fn str_field(raw: &Value, keys: &[&str]) -> String {
    opt_str_field(raw, keys).unwrap_or_default()
}

/// Extract an optional string field, trying `keys` in order.
fn opt_str_field(raw: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|k| raw.get(k).and_then(Value::as_str))
        .map(str::to_string)
}

/// Extract an arbitrary value field. Defaults to null.
fn value_field(raw: &Value, key: &str) -> Value {
    raw.get(key).cloned().unwrap_or(Value::Null)
}

/// Extract an array field. Defaults to empty.
fn list_field(raw: &Value, key: &str) -> Vec<Value> {
    raw.get(key)
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
}
