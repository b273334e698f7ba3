//! AG-UI protocol support: the wire event model, the conversation data
//! model built from it, and the SSE record decoder.
//!
//! These events follow the AG-UI specification for agent-to-frontend
//! communication. See: <https://docs.ag-ui.com/concepts/events>

mod events;
mod sse;
mod types;

pub use events::Event;
pub use sse::SseDecoder;
pub use types::{
    gen_message_id, now_ms, ChatMessage, MessageKind, Role, RunAgentInput, ToolCallInfo,
    ToolCallStatus,
};
