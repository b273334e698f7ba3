//! The per-thread run engine.

use crate::{BufferError, TextMessageBuffer, ThreadError, ToolCallBuffer, ToolError, ToolRegistry};
use serde_json::Value;
use std::sync::Arc;
use strand_protocol_ag_ui::{gen_message_id, ChatMessage, Event, Role, RunAgentInput};
use strand_state::{apply_patch, PatchOp};
use strand_transport::{BoxStream, RunOptions, Transport};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

/// Run lifecycle of a thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunStatus {
    #[default]
    Idle,
    Running,
    Finished,
    Error,
}

/// Input for one agent run.
#[derive(Debug, Clone)]
pub struct RunRequest {
    /// Run identifier, chosen by the caller.
    pub run_id: String,
    /// The user's message.
    pub message: String,
    /// Optional initial state sent with the run.
    pub initial_state: Option<Value>,
}

impl RunRequest {
    /// Create a run request.
    pub fn new(run_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            message: message.into(),
            initial_state: None,
        }
    }

    /// Set the initial state.
    pub fn with_initial_state(mut self, state: Value) -> Self {
        self.initial_state = Some(state);
        self
    }
}

/// Read-only snapshot of a thread's public state, published on every
/// change for reactive UI binding.
#[derive(Debug, Clone)]
pub struct ThreadSnapshot {
    pub messages: Vec<ChatMessage>,
    pub state: Value,
    pub status: RunStatus,
    pub run_id: Option<String>,
    pub error_message: Option<String>,
}

type ToolOutcome = (String, Result<Option<String>, ToolError>);

/// One conversation thread: folds the event stream of a run into
/// messages, in-flight buffers, and the untyped state document.
///
/// Single-writer: event processing and all state mutation happen on the
/// caller's task. Distinct threads are fully independent.
pub struct AgentThread {
    room_id: String,
    thread_id: String,
    messages: Vec<ChatMessage>,
    state: Value,
    status: RunStatus,
    run_id: Option<String>,
    error_message: Option<String>,
    text_buffer: TextMessageBuffer,
    tool_calls: ToolCallBuffer,
    tools: Arc<ToolRegistry>,
    changes: watch::Sender<ThreadSnapshot>,
}

impl AgentThread {
    /// Create an idle thread.
    pub fn new(
        room_id: impl Into<String>,
        thread_id: impl Into<String>,
        tools: Arc<ToolRegistry>,
    ) -> Self {
        let room_id = room_id.into();
        let thread_id = thread_id.into();
        let initial = ThreadSnapshot {
            messages: Vec::new(),
            state: empty_state(),
            status: RunStatus::Idle,
            run_id: None,
            error_message: None,
        };
        let (changes, _) = watch::channel(initial);
        Self {
            room_id,
            thread_id,
            messages: Vec::new(),
            state: empty_state(),
            status: RunStatus::Idle,
            run_id: None,
            error_message: None,
            text_buffer: TextMessageBuffer::new(),
            tool_calls: ToolCallBuffer::new(),
            tools,
            changes,
        }
    }

    /// Thread identifier.
    pub fn thread_id(&self) -> &str {
        &self.thread_id
    }

    /// Room identifier.
    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    /// The accumulated message list.
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// The current state document.
    pub fn state(&self) -> &Value {
        &self.state
    }

    /// The current run status.
    pub fn run_status(&self) -> RunStatus {
        self.status
    }

    /// The current run id, if a run started.
    pub fn run_id(&self) -> Option<&str> {
        self.run_id.as_deref()
    }

    /// The recorded error, if the thread is in error state.
    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    /// The in-flight tool calls.
    pub fn tool_calls(&self) -> &ToolCallBuffer {
        &self.tool_calls
    }

    /// Mutable access to the tool call buffer, for caller-side eviction
    /// of calls it is done with.
    pub fn tool_calls_mut(&mut self) -> &mut ToolCallBuffer {
        &mut self.tool_calls
    }

    /// Subscribe to state-change notifications.
    pub fn subscribe(&self) -> watch::Receiver<ThreadSnapshot> {
        self.changes.subscribe()
    }

    /// Discard all working state and return to idle.
    pub fn reset(&mut self) {
        self.messages.clear();
        self.state = empty_state();
        self.text_buffer.reset();
        self.tool_calls.reset();
        self.status = RunStatus::Idle;
        self.run_id = None;
        self.error_message = None;
        self.notify();
    }

    /// Issue a run request and fold its event stream into this thread.
    ///
    /// Returns the terminal status: `Finished` for success (including a
    /// silent stream close), `Error` when the backend reported a
    /// `RUN_ERROR`. Transport and protocol faults return `Err` after
    /// recording the error on the thread.
    pub async fn run(
        &mut self,
        transport: &Transport,
        request: RunRequest,
        options: RunOptions,
        cancel: CancellationToken,
    ) -> Result<RunStatus, ThreadError> {
        if self.status == RunStatus::Running {
            return Err(ThreadError::RunInProgress);
        }
        self.run_id = Some(request.run_id.clone());
        self.error_message = None;

        let mut input = RunAgentInput::new(request.message);
        if let Some(state) = request.initial_state {
            self.state = state.clone();
            input = input.with_state(state);
        }

        let stream = transport.run_agent(
            &self.room_id,
            &self.thread_id,
            &request.run_id,
            input,
            options,
            cancel,
        );
        self.consume_stream(stream).await
    }

    /// Fold a decoded event stream into this thread, one event at a time,
    /// strictly in stream-delivery order.
    pub async fn consume_stream(
        &mut self,
        mut stream: BoxStream<Event>,
    ) -> Result<RunStatus, ThreadError> {
        use futures::StreamExt;

        self.status = RunStatus::Running;
        self.notify();

        let (results_tx, mut results_rx) = mpsc::unbounded_channel::<ToolOutcome>();
        let mut outstanding: usize = 0;

        loop {
            tokio::select! {
                Some((call_id, outcome)) = results_rx.recv(), if outstanding > 0 => {
                    outstanding -= 1;
                    self.apply_tool_outcome(&call_id, outcome);
                }
                next = stream.next() => {
                    match next {
                        Some(Ok(event)) => {
                            let handled =
                                self.handle_event(&event, &results_tx, &mut outstanding);
                            self.notify();
                            if let Err(fault) = handled {
                                self.fail_run(fault.to_string());
                                return Err(fault.into());
                            }
                        }
                        Some(Err(error)) => {
                            self.fail_run(error.to_string());
                            return Err(error.into());
                        }
                        None => break,
                    }
                }
            }
        }

        // Silent close without a terminal event counts as success.
        if self.status == RunStatus::Running {
            if let Err(fault) = self.flush_pending_text() {
                self.fail_run(fault.to_string());
                return Err(fault.into());
            }
            self.status = RunStatus::Finished;
            self.notify();
        }

        // Let already-dispatched tools land their results.
        while outstanding > 0 {
            match results_rx.recv().await {
                Some((call_id, outcome)) => {
                    outstanding -= 1;
                    self.apply_tool_outcome(&call_id, outcome);
                }
                None => break,
            }
        }

        Ok(self.status)
    }

    fn handle_event(
        &mut self,
        event: &Event,
        results_tx: &mpsc::UnboundedSender<ToolOutcome>,
        outstanding: &mut usize,
    ) -> Result<(), BufferError> {
        match event {
            Event::RunStarted { run_id, .. } => {
                debug!(run_id, "run started");
            }
            Event::StepStarted { step_name } | Event::StepFinished { step_name } => {
                trace!(step_name, event = event.event_type(), "step event");
            }

            Event::TextMessageStart { message_id } => {
                self.text_buffer.start(message_id, Role::Assistant)?;
            }
            Event::TextMessageContent { message_id, delta } => {
                if self.text_buffer.is_active() {
                    self.text_buffer.append(delta)?;
                } else {
                    trace!(message_id, "content for closed message dropped");
                }
            }
            Event::TextMessageEnd { message_id } => {
                if self.text_buffer.is_active() {
                    let message = self.text_buffer.complete()?;
                    self.messages.push(message);
                } else {
                    trace!(message_id, "end for closed message dropped");
                }
            }

            Event::ToolCallStart {
                tool_call_id,
                tool_call_name,
                parent_message_id,
            } => {
                self.tool_calls.start_tool_call(
                    tool_call_id,
                    tool_call_name,
                    parent_message_id.clone(),
                )?;
            }
            Event::ToolCallArgs {
                tool_call_id,
                delta,
            } => {
                if self.tool_calls.is_active(tool_call_id) {
                    self.tool_calls.append_args(tool_call_id, delta)?;
                } else {
                    trace!(tool_call_id, "args for unknown tool call dropped");
                }
            }
            Event::ToolCallEnd { tool_call_id } => {
                if self.tool_calls.is_active(tool_call_id) {
                    let info = self.tool_calls.complete_tool_call(tool_call_id)?;
                    self.dispatch_tool(info, results_tx, outstanding);
                } else {
                    trace!(tool_call_id, "end for unknown tool call dropped");
                }
            }
            Event::ToolCallResult {
                tool_call_id,
                content,
                ..
            } => {
                if self.tool_calls.is_active(tool_call_id) {
                    self.tool_calls.set_result(tool_call_id, content)?;
                } else {
                    trace!(tool_call_id, "result for unknown tool call dropped");
                }
            }

            Event::StateSnapshot { snapshot } => {
                self.state = snapshot.clone();
            }
            Event::StateDelta { delta } => {
                let ops = PatchOp::decode_all(delta);
                apply_patch(&mut self.state, &ops);
            }
            Event::MessagesSnapshot { messages } => {
                self.messages = messages
                    .iter()
                    .filter_map(ChatMessage::from_snapshot_entry)
                    .collect();
            }

            Event::ActivitySnapshot { activity_type, .. }
            | Event::ActivityDelta { activity_type, .. } => {
                trace!(activity_type, event = event.event_type(), "activity event");
            }
            Event::Custom { name, .. } => {
                trace!(name, "custom event");
            }
            Event::Unknown { raw_type, .. } => {
                trace!(raw_type, "unknown event ignored");
            }

            Event::RunFinished { run_id, .. } => {
                self.flush_pending_text()?;
                self.status = RunStatus::Finished;
                debug!(run_id, "run finished");
            }
            Event::RunError { message, code, .. } => {
                self.flush_pending_text()?;
                self.error_message = Some(message.clone());
                self.status = RunStatus::Error;
                debug!(message, ?code, "run errored");
            }
        }
        Ok(())
    }

    /// Execute a completed tool call off the event loop. The outcome
    /// comes back through the results channel so all mutation stays on
    /// the engine's task.
    fn dispatch_tool(
        &self,
        info: strand_protocol_ag_ui::ToolCallInfo,
        results_tx: &mpsc::UnboundedSender<ToolOutcome>,
        outstanding: &mut usize,
    ) {
        let tools = self.tools.clone();
        let results_tx = results_tx.clone();
        *outstanding += 1;
        tokio::spawn(async move {
            let call_id = info.id.clone();
            let outcome = tools.execute(&info).await;
            let _ = results_tx.send((call_id, outcome));
        });
    }

    fn apply_tool_outcome(&mut self, call_id: &str, outcome: Result<Option<String>, ToolError>) {
        match outcome {
            Ok(Some(result)) => {
                if self.tool_calls.is_active(call_id) {
                    if let Ok(info) = self.tool_calls.set_result(call_id, result) {
                        self.messages
                            .push(ChatMessage::tool_call(gen_message_id(), info));
                        self.notify();
                    }
                }
            }
            Ok(None) => {}
            Err(error) => {
                warn!(call_id, %error, "tool execution failed");
                if self.tool_calls.is_active(call_id) {
                    let _ = self.tool_calls.mark_failed(call_id);
                    self.notify();
                }
            }
        }
    }

    fn flush_pending_text(&mut self) -> Result<(), BufferError> {
        if self.text_buffer.is_active() {
            let message = self.text_buffer.complete()?;
            self.messages.push(message);
        }
        Ok(())
    }

    fn fail_run(&mut self, message: String) {
        self.error_message = Some(message);
        self.status = RunStatus::Error;
        self.notify();
    }

    fn notify(&self) {
        self.changes.send_replace(self.snapshot());
    }

    fn snapshot(&self) -> ThreadSnapshot {
        ThreadSnapshot {
            messages: self.messages.clone(),
            state: self.state.clone(),
            status: self.status,
            run_id: self.run_id.clone(),
            error_message: self.error_message.clone(),
        }
    }
}

fn empty_state() -> Value {
    Value::Object(serde_json::Map::new())
}
