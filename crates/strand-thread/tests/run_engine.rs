//! Run-engine behavior: event folding, terminal transitions, tool dispatch.

use serde_json::json;
use std::sync::Arc;
use strand_protocol_ag_ui::{Event, Role, ToolCallStatus};
use strand_thread::{
    AgentThread, RunStatus, ThreadError, ToolError, ToolOptions, ToolRegistry,
};
use strand_transport::{BoxStream, TransportError};

fn ok_stream(events: Vec<Event>) -> BoxStream<Event> {
    Box::pin(futures::stream::iter(events.into_iter().map(Ok)))
}

fn thread() -> AgentThread {
    AgentThread::new("room1", "t", Arc::new(ToolRegistry::new()))
}

fn five_event_run() -> Vec<Event> {
    vec![
        Event::run_started("t", "r"),
        Event::text_message_start("m1"),
        Event::text_message_content("m1", "Hi"),
        Event::text_message_end("m1"),
        Event::run_finished("t", "r"),
    ]
}

#[tokio::test]
async fn folds_a_complete_run_into_messages() {
    let mut thread = thread();
    let status = thread.consume_stream(ok_stream(five_event_run())).await.unwrap();

    assert_eq!(status, RunStatus::Finished);
    assert_eq!(thread.messages().len(), 1);
    let message = &thread.messages()[0];
    assert_eq!(message.id, "m1");
    assert_eq!(message.text.as_deref(), Some("Hi"));
    assert_eq!(message.role, Role::Assistant);
    assert_eq!(thread.error_message(), None);
}

#[tokio::test]
async fn chunk_granularity_is_invisible() {
    let deltas: Vec<&str> = vec!["H", "e", "l", "l", "o", ",", " ", "w", "o", "r", "l", "d", "!"];
    let mut events = vec![Event::text_message_start("m1")];
    events.extend(deltas.iter().map(|d| Event::text_message_content("m1", *d)));
    events.push(Event::text_message_end("m1"));
    events.push(Event::run_finished("t", "r"));

    let mut thread = thread();
    thread.consume_stream(ok_stream(events)).await.unwrap();
    assert_eq!(
        thread.messages()[0].text.as_deref(),
        Some("Hello, world!")
    );
}

#[tokio::test]
async fn silent_close_flushes_text_and_finishes() {
    let events = vec![
        Event::run_started("t", "r"),
        Event::text_message_start("m1"),
        Event::text_message_content("m1", "partial"),
    ];
    let mut thread = thread();
    let status = thread.consume_stream(ok_stream(events)).await.unwrap();

    assert_eq!(status, RunStatus::Finished);
    assert_eq!(thread.messages().len(), 1);
    assert_eq!(thread.messages()[0].text.as_deref(), Some("partial"));
}

#[tokio::test]
async fn run_error_event_records_message_and_flushes() {
    let events = vec![
        Event::run_started("t", "r"),
        Event::text_message_start("m1"),
        Event::text_message_content("m1", "so far"),
        Event::run_error("t", "r", "backend exploded"),
    ];
    let mut thread = thread();
    let status = thread.consume_stream(ok_stream(events)).await.unwrap();

    assert_eq!(status, RunStatus::Error);
    assert_eq!(thread.error_message(), Some("backend exploded"));
    assert_eq!(thread.messages()[0].text.as_deref(), Some("so far"));
}

#[tokio::test]
async fn stream_failure_is_propagated_and_recorded() {
    let stream: BoxStream<Event> = Box::pin(futures::stream::iter(vec![
        Ok(Event::run_started("t", "r")),
        Err(TransportError::Request("connection reset".to_string())),
    ]));
    let mut thread = thread();
    let result = thread.consume_stream(stream).await;

    assert!(matches!(result, Err(ThreadError::Transport(_))));
    assert_eq!(thread.run_status(), RunStatus::Error);
    assert!(thread.error_message().unwrap().contains("connection reset"));
}

#[tokio::test]
async fn duplicate_text_start_is_a_loud_fault() {
    let events = vec![
        Event::text_message_start("m1"),
        Event::text_message_start("m2"),
    ];
    let mut thread = thread();
    let result = thread.consume_stream(ok_stream(events)).await;

    assert!(matches!(result, Err(ThreadError::Buffer(_))));
    assert_eq!(thread.run_status(), RunStatus::Error);
}

#[tokio::test]
async fn content_for_closed_message_is_dropped() {
    let events = vec![
        Event::text_message_start("m1"),
        Event::text_message_end("m1"),
        Event::text_message_content("m1", "late"),
        Event::run_finished("t", "r"),
    ];
    let mut thread = thread();
    let status = thread.consume_stream(ok_stream(events)).await.unwrap();

    assert_eq!(status, RunStatus::Finished);
    assert_eq!(thread.messages().len(), 1);
    assert_eq!(thread.messages()[0].text.as_deref(), Some(""));
}

#[tokio::test]
async fn state_snapshot_then_delta_folds_in_order() {
    let events = vec![
        Event::state_snapshot(json!({"counter": 1, "flags": {"a": true}})),
        Event::state_delta(vec![
            json!({"op": "replace", "path": "/counter", "value": 2}),
            json!({"op": "add", "path": "/nested/deep/key", "value": "v"}),
            json!({"op": "remove", "path": "/flags/a"}),
            json!({"op": "remove", "path": "/not/there"}),
        ]),
        Event::run_finished("t", "r"),
    ];
    let mut thread = thread();
    thread.consume_stream(ok_stream(events)).await.unwrap();

    assert_eq!(
        thread.state(),
        &json!({"counter": 2, "flags": {}, "nested": {"deep": {"key": "v"}}})
    );
}

#[tokio::test]
async fn messages_snapshot_replaces_list_and_skips_invalid_entries() {
    let events = vec![
        Event::text_message_start("old"),
        Event::text_message_end("old"),
        Event::messages_snapshot(vec![
            json!({"id": "m1", "role": "user", "content": "question"}),
            json!({"content": "no id"}),
            json!({"id": "m2", "role": "martian", "content": "answer"}),
        ]),
        Event::run_finished("t", "r"),
    ];
    let mut thread = thread();
    thread.consume_stream(ok_stream(events)).await.unwrap();

    let messages = thread.messages();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].id, "m1");
    assert_eq!(messages[0].role, Role::User);
    assert_eq!(messages[1].id, "m2");
    // Unrecognized role falls back to assistant.
    assert_eq!(messages[1].role, Role::Assistant);
}

#[tokio::test]
async fn tool_call_lifecycle_dispatches_registered_executor() {
    let registry = Arc::new(ToolRegistry::new());
    registry
        .register_fn("lookup", ToolOptions::default(), |call| async move {
            Ok(format!("result for {}", call.arguments.as_deref().unwrap_or("")))
        })
        .unwrap();

    let events = vec![
        Event::tool_call_start("c1", "lookup", None),
        Event::tool_call_args("c1", "{\"q\":"),
        Event::tool_call_args("c1", "\"rust\"}"),
        Event::tool_call_end("c1"),
        Event::run_finished("t", "r"),
    ];
    let mut thread = AgentThread::new("room1", "t", registry);
    thread.consume_stream(ok_stream(events)).await.unwrap();

    let call = thread.tool_calls().get_tool_call("c1").unwrap();
    assert_eq!(call.status, ToolCallStatus::Completed);
    assert_eq!(call.arguments.as_deref(), Some("{\"q\":\"rust\"}"));
    assert_eq!(call.result.as_deref(), Some("result for {\"q\":\"rust\"}"));
    // The landed result is also surfaced as a tool-call message.
    assert!(thread
        .messages()
        .iter()
        .any(|m| m.tool_calls.as_ref().is_some_and(|c| c[0].id == "c1")));
}

#[tokio::test]
async fn failing_executor_marks_call_failed_without_failing_run() {
    let registry = Arc::new(ToolRegistry::new());
    registry
        .register_fn("broken", ToolOptions::default(), |_| async {
            Err(ToolError::ExecutionFailed("nope".to_string()))
        })
        .unwrap();

    let events = vec![
        Event::tool_call_start("c1", "broken", None),
        Event::tool_call_end("c1"),
        Event::run_finished("t", "r"),
    ];
    let mut thread = AgentThread::new("room1", "t", registry);
    let status = thread.consume_stream(ok_stream(events)).await.unwrap();

    assert_eq!(status, RunStatus::Finished);
    assert_eq!(
        thread.tool_calls().get_tool_call("c1").unwrap().status,
        ToolCallStatus::Failed
    );
}

#[tokio::test]
async fn backend_tool_result_event_sets_result() {
    let events = vec![
        Event::tool_call_start("c1", "remote", None),
        Event::tool_call_args("c1", "{}"),
        Event::tool_call_result("m9", "c1", "remote output"),
        Event::tool_call_end("c1"),
        Event::run_finished("t", "r"),
    ];
    let mut thread = thread();
    thread.consume_stream(ok_stream(events)).await.unwrap();

    let call = thread.tool_calls().get_tool_call("c1").unwrap();
    assert_eq!(call.result.as_deref(), Some("remote output"));
    assert_eq!(call.status, ToolCallStatus::Completed);
}

#[tokio::test]
async fn concurrent_tool_calls_are_independent() {
    let events = vec![
        Event::tool_call_start("a", "alpha", None),
        Event::tool_call_start("b", "beta", None),
        Event::tool_call_args("a", "AA"),
        Event::tool_call_args("b", "BB"),
        Event::tool_call_args("a", "aa"),
        Event::tool_call_end("b"),
        Event::tool_call_end("a"),
        Event::run_finished("t", "r"),
    ];
    let mut thread = thread();
    thread.consume_stream(ok_stream(events)).await.unwrap();

    assert_eq!(
        thread.tool_calls().get_tool_call("a").unwrap().arguments.as_deref(),
        Some("AAaa")
    );
    assert_eq!(
        thread.tool_calls().get_tool_call("b").unwrap().arguments.as_deref(),
        Some("BB")
    );
}

#[tokio::test]
async fn unknown_and_custom_events_are_noops() {
    let events = vec![
        Event::custom("telemetry", json!({"k": 1})),
        Event::decode(&json!({"type": "BRAND_NEW_EVENT", "x": 1})),
        Event::step_started("step_1"),
        Event::step_finished("step_1"),
        Event::run_finished("t", "r"),
    ];
    let mut thread = thread();
    let status = thread.consume_stream(ok_stream(events)).await.unwrap();
    assert_eq!(status, RunStatus::Finished);
    assert!(thread.messages().is_empty());
}

#[tokio::test]
async fn subscribers_observe_every_transition() {
    let mut thread = thread();
    let mut changes = thread.subscribe();
    assert_eq!(changes.borrow().status, RunStatus::Idle);

    thread.consume_stream(ok_stream(five_event_run())).await.unwrap();

    changes.changed().await.unwrap();
    let latest = changes.borrow_and_update();
    assert_eq!(latest.status, RunStatus::Finished);
    assert_eq!(latest.messages.len(), 1);
}

#[tokio::test]
async fn reset_clears_all_working_state() {
    let events = vec![
        Event::text_message_start("m1"),
        Event::text_message_content("m1", "x"),
        Event::text_message_end("m1"),
        Event::state_snapshot(json!({"k": 1})),
        Event::tool_call_start("c1", "tool", None),
        Event::run_finished("t", "r"),
    ];
    let mut thread = thread();
    thread.consume_stream(ok_stream(events)).await.unwrap();
    assert!(!thread.messages().is_empty());

    thread.reset();
    assert!(thread.messages().is_empty());
    assert_eq!(thread.state(), &json!({}));
    assert_eq!(thread.run_status(), RunStatus::Idle);
    assert_eq!(thread.error_message(), None);
    assert!(thread.tool_calls().is_empty());
}
