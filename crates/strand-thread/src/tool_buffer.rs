//! Multi-slot accumulator for concurrently in-flight tool calls.

use crate::BufferError;
use std::collections::HashMap;
use strand_protocol_ag_ui::{now_ms, ToolCallInfo, ToolCallStatus};

struct Slot {
    info: ToolCallInfo,
    parent_message_id: Option<String>,
    complete: bool,
}

/// Tracks zero or more tool calls keyed by call id.
///
/// Calls with different ids are fully independent; no ordering is implied
/// between them. A call remains queryable after completion and result
/// until explicitly removed — eviction is the caller's responsibility.
#[derive(Default)]
pub struct ToolCallBuffer {
    calls: HashMap<String, Slot>,
}

impl ToolCallBuffer {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin tracking a tool call. Starting an id twice is a fault.
    pub fn start_tool_call(
        &mut self,
        call_id: impl Into<String>,
        name: impl Into<String>,
        parent_message_id: Option<String>,
    ) -> Result<(), BufferError> {
        let call_id = call_id.into();
        if self.calls.contains_key(&call_id) {
            return Err(BufferError::duplicate_tool_call(call_id));
        }
        let info = ToolCallInfo::new(call_id.clone(), name);
        self.calls.insert(
            call_id,
            Slot {
                info,
                parent_message_id,
                complete: false,
            },
        );
        Ok(())
    }

    /// Append an arguments delta to a tracked call.
    pub fn append_args(&mut self, call_id: &str, delta: &str) -> Result<(), BufferError> {
        let slot = self.slot_mut(call_id)?;
        slot.info
            .arguments
            .get_or_insert_with(String::new)
            .push_str(delta);
        Ok(())
    }

    /// Mark a call's arguments complete.
    ///
    /// Status stays pending unless a result already arrived — the result
    /// is allowed to race ahead of the end-of-arguments signal.
    pub fn complete_tool_call(&mut self, call_id: &str) -> Result<ToolCallInfo, BufferError> {
        let slot = self.slot_mut(call_id)?;
        slot.complete = true;
        Ok(slot.info.clone())
    }

    /// Record a call's result and mark it completed.
    pub fn set_result(
        &mut self,
        call_id: &str,
        result: impl Into<String>,
    ) -> Result<ToolCallInfo, BufferError> {
        let slot = self.slot_mut(call_id)?;
        slot.info.result = Some(result.into());
        slot.info.status = ToolCallStatus::Completed;
        slot.info.completed_at = Some(now_ms());
        Ok(slot.info.clone())
    }

    /// Mark a call as failed.
    pub fn mark_failed(&mut self, call_id: &str) -> Result<ToolCallInfo, BufferError> {
        let slot = self.slot_mut(call_id)?;
        slot.info.status = ToolCallStatus::Failed;
        slot.info.completed_at = Some(now_ms());
        Ok(slot.info.clone())
    }

    /// Look up a tracked call.
    pub fn get_tool_call(&self, call_id: &str) -> Option<ToolCallInfo> {
        self.calls.get(call_id).map(|s| s.info.clone())
    }

    /// The parent message a call was attached to, if any.
    pub fn parent_message_id(&self, call_id: &str) -> Option<&str> {
        self.calls
            .get(call_id)
            .and_then(|s| s.parent_message_id.as_deref())
    }

    /// Stop tracking a call, returning its final shape.
    pub fn remove_tool_call(&mut self, call_id: &str) -> Option<ToolCallInfo> {
        self.calls.remove(call_id).map(|s| s.info)
    }

    /// Whether a call id is currently tracked.
    pub fn is_active(&self, call_id: &str) -> bool {
        self.calls.contains_key(call_id)
    }

    /// Whether a call's arguments are complete.
    pub fn is_complete(&self, call_id: &str) -> bool {
        self.calls.get(call_id).is_some_and(|s| s.complete)
    }

    /// Whether a call has a result.
    pub fn has_result(&self, call_id: &str) -> bool {
        self.calls
            .get(call_id)
            .is_some_and(|s| s.info.result.is_some())
    }

    /// Ids of every tracked call.
    pub fn active_ids(&self) -> Vec<String> {
        self.calls.keys().cloned().collect()
    }

    /// Number of tracked calls.
    pub fn len(&self) -> usize {
        self.calls.len()
    }

    /// True when no calls are tracked.
    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    /// Drop every tracked call.
    pub fn reset(&mut self) {
        self.calls.clear();
    }

    fn slot_mut(&mut self, call_id: &str) -> Result<&mut Slot, BufferError> {
        self.calls
            .get_mut(call_id)
            .ok_or_else(|| BufferError::unknown_tool_call(call_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interleaved_args_never_cross_contaminate() {
        let mut buffer = ToolCallBuffer::new();
        buffer.start_tool_call("a", "alpha", None).unwrap();
        buffer.start_tool_call("b", "beta", None).unwrap();
        buffer.start_tool_call("c", "gamma", None).unwrap();

        buffer.append_args("a", "{\"x\":").unwrap();
        buffer.append_args("b", "{\"y\":").unwrap();
        buffer.append_args("c", "{\"z\":").unwrap();
        buffer.append_args("b", "2}").unwrap();
        buffer.append_args("a", "1}").unwrap();
        buffer.append_args("c", "3}").unwrap();

        assert_eq!(
            buffer.get_tool_call("a").unwrap().arguments.as_deref(),
            Some("{\"x\":1}")
        );
        assert_eq!(
            buffer.get_tool_call("b").unwrap().arguments.as_deref(),
            Some("{\"y\":2}")
        );
        assert_eq!(
            buffer.get_tool_call("c").unwrap().arguments.as_deref(),
            Some("{\"z\":3}")
        );
    }

    #[test]
    fn duplicate_start_faults() {
        let mut buffer = ToolCallBuffer::new();
        buffer.start_tool_call("a", "alpha", None).unwrap();
        assert_eq!(
            buffer.start_tool_call("a", "alpha", None).unwrap_err(),
            BufferError::duplicate_tool_call("a")
        );
    }

    #[test]
    fn unknown_id_faults() {
        let mut buffer = ToolCallBuffer::new();
        assert_eq!(
            buffer.append_args("ghost", "x").unwrap_err(),
            BufferError::unknown_tool_call("ghost")
        );
        assert_eq!(
            buffer.complete_tool_call("ghost").unwrap_err(),
            BufferError::unknown_tool_call("ghost")
        );
        assert_eq!(
            buffer.set_result("ghost", "r").unwrap_err(),
            BufferError::unknown_tool_call("ghost")
        );
    }

    #[test]
    fn result_before_and_after_complete_are_equivalent() {
        let mut early = ToolCallBuffer::new();
        early.start_tool_call("a", "alpha", None).unwrap();
        early.set_result("a", "out").unwrap();
        early.complete_tool_call("a").unwrap();

        let mut late = ToolCallBuffer::new();
        late.start_tool_call("a", "alpha", None).unwrap();
        late.complete_tool_call("a").unwrap();
        late.set_result("a", "out").unwrap();

        let a = early.get_tool_call("a").unwrap();
        let b = late.get_tool_call("a").unwrap();
        assert_eq!(a.result, b.result);
        assert_eq!(a.status, ToolCallStatus::Completed);
        assert_eq!(b.status, ToolCallStatus::Completed);
    }

    #[test]
    fn complete_keeps_status_pending_without_result() {
        let mut buffer = ToolCallBuffer::new();
        buffer.start_tool_call("a", "alpha", None).unwrap();
        let info = buffer.complete_tool_call("a").unwrap();
        assert_eq!(info.status, ToolCallStatus::Pending);
        assert!(buffer.is_complete("a"));
        assert!(!buffer.has_result("a"));
    }

    #[test]
    fn calls_remain_queryable_until_removed() {
        let mut buffer = ToolCallBuffer::new();
        buffer.start_tool_call("a", "alpha", None).unwrap();
        buffer.complete_tool_call("a").unwrap();
        buffer.set_result("a", "done").unwrap();

        assert!(buffer.is_active("a"));
        assert!(buffer.has_result("a"));

        let removed = buffer.remove_tool_call("a").unwrap();
        assert_eq!(removed.result.as_deref(), Some("done"));
        assert!(!buffer.is_active("a"));
        assert!(buffer.remove_tool_call("a").is_none());
    }

    #[test]
    fn mark_failed_sets_status() {
        let mut buffer = ToolCallBuffer::new();
        buffer.start_tool_call("a", "alpha", None).unwrap();
        let info = buffer.mark_failed("a").unwrap();
        assert_eq!(info.status, ToolCallStatus::Failed);
    }

    #[test]
    fn parent_message_id_is_tracked() {
        let mut buffer = ToolCallBuffer::new();
        buffer
            .start_tool_call("a", "alpha", Some("m1".to_string()))
            .unwrap();
        assert_eq!(buffer.parent_message_id("a"), Some("m1"));
    }

    #[test]
    fn reset_clears_all_calls() {
        let mut buffer = ToolCallBuffer::new();
        buffer.start_tool_call("a", "alpha", None).unwrap();
        buffer.start_tool_call("b", "beta", None).unwrap();
        buffer.reset();
        assert!(buffer.is_empty());
        assert!(!buffer.is_active("a"));
    }
}
