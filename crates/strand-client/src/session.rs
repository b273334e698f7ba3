//! Per-room session lifecycle.

use crate::SessionError;
use std::sync::{Arc, Mutex};
use strand_thread::{AgentThread, RunRequest, RunStatus, ThreadSnapshot, ToolRegistry};
use strand_transport::{RunOptions, Transport};
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Lifecycle state of a room session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// In the foreground, no run in flight.
    Active,
    /// A run is in flight.
    Streaming,
    /// The UI switched away from the room.
    Backgrounded,
    /// Backgrounded past the inactivity window; eligible for disposal.
    Suspended,
    /// Released. Terminal.
    Disposed,
}

struct Meta {
    state: SessionState,
    last_activity: Instant,
    /// Cancellation token of the in-flight run, if any.
    run_cancel: Option<CancellationToken>,
}

/// One room's session: the thread engine plus lifecycle bookkeeping.
///
/// Identity is the (server, room) pair. The owning registry is the sole
/// authority for disposal; disposal cancels any in-flight run and the
/// session is unusable afterwards.
pub struct RoomSession {
    server_id: String,
    room_id: String,
    meta: Mutex<Meta>,
    thread: tokio::sync::Mutex<AgentThread>,
}

impl RoomSession {
    /// Create an active session with the default thread id.
    pub fn new(
        server_id: impl Into<String>,
        room_id: impl Into<String>,
        tools: Arc<ToolRegistry>,
    ) -> Self {
        Self::with_thread_id(server_id, room_id, "main", tools)
    }

    /// Create an active session for a specific conversation thread.
    pub fn with_thread_id(
        server_id: impl Into<String>,
        room_id: impl Into<String>,
        thread_id: impl Into<String>,
        tools: Arc<ToolRegistry>,
    ) -> Self {
        let server_id = server_id.into();
        let room_id = room_id.into();
        let thread = AgentThread::new(room_id.clone(), thread_id, tools);
        Self {
            server_id,
            room_id,
            meta: Mutex::new(Meta {
                state: SessionState::Active,
                last_activity: Instant::now(),
                run_cancel: None,
            }),
            thread: tokio::sync::Mutex::new(thread),
        }
    }

    /// Server identifier.
    pub fn server_id(&self) -> &str {
        &self.server_id
    }

    /// Room identifier.
    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.meta().state
    }

    /// When the session was last used.
    pub fn last_activity(&self) -> Instant {
        self.meta().last_activity
    }

    /// Record activity now.
    pub fn touch(&self) {
        self.meta().last_activity = Instant::now();
    }

    /// Subscribe to the thread's state-change feed.
    pub async fn subscribe(&self) -> watch::Receiver<ThreadSnapshot> {
        self.thread.lock().await.subscribe()
    }

    /// Run a closure against the thread (for reads and host-side
    /// maintenance like tool-call eviction or `reset`).
    pub async fn with_thread<R>(&self, f: impl FnOnce(&mut AgentThread) -> R) -> R {
        let mut thread = self.thread.lock().await;
        f(&mut thread)
    }

    /// Start a run on this session.
    ///
    /// Transitions active → streaming for the duration of the run and
    /// back to active when it completes. A session that is not active
    /// refuses the run.
    pub async fn start_run(
        &self,
        transport: &Transport,
        request: RunRequest,
        options: RunOptions,
    ) -> Result<RunStatus, SessionError> {
        let cancel = CancellationToken::new();
        {
            let mut meta = self.meta();
            self.check_transition(&meta, SessionState::Streaming)?;
            meta.state = SessionState::Streaming;
            meta.last_activity = Instant::now();
            meta.run_cancel = Some(cancel.clone());
        }

        let result = {
            let mut thread = self.thread.lock().await;
            thread.run(transport, request, options, cancel).await
        };

        {
            let mut meta = self.meta();
            meta.run_cancel = None;
            // Disposal or backgrounding may have happened mid-run.
            if meta.state == SessionState::Streaming {
                meta.state = SessionState::Active;
            }
            meta.last_activity = Instant::now();
        }
        Ok(result?)
    }

    /// The UI switched away from this room. Cancels an in-flight run.
    pub fn background(&self) -> Result<(), SessionError> {
        let mut meta = self.meta();
        self.check_transition(&meta, SessionState::Backgrounded)?;
        if let Some(cancel) = meta.run_cancel.take() {
            cancel.cancel();
        }
        meta.state = SessionState::Backgrounded;
        meta.last_activity = Instant::now();
        Ok(())
    }

    /// The UI returned to this room.
    pub fn resume(&self) -> Result<(), SessionError> {
        let mut meta = self.meta();
        self.check_transition(&meta, SessionState::Active)?;
        meta.state = SessionState::Active;
        meta.last_activity = Instant::now();
        Ok(())
    }

    /// Backgrounded past the inactivity window.
    pub fn suspend(&self) -> Result<(), SessionError> {
        let mut meta = self.meta();
        self.check_transition(&meta, SessionState::Suspended)?;
        meta.state = SessionState::Suspended;
        Ok(())
    }

    /// Release the session. Cancels any in-flight run. Idempotent.
    pub fn dispose(&self) {
        let mut meta = self.meta();
        if meta.state == SessionState::Disposed {
            return;
        }
        if let Some(cancel) = meta.run_cancel.take() {
            cancel.cancel();
        }
        debug!(server_id = %self.server_id, room_id = %self.room_id, "session disposed");
        meta.state = SessionState::Disposed;
    }

    /// Whether this session is disposed.
    pub fn is_disposed(&self) -> bool {
        self.state() == SessionState::Disposed
    }

    fn check_transition(&self, meta: &Meta, to: SessionState) -> Result<(), SessionError> {
        let from = meta.state;
        let allowed = matches!(
            (from, to),
            (SessionState::Active, SessionState::Streaming)
                | (SessionState::Active, SessionState::Backgrounded)
                | (SessionState::Streaming, SessionState::Active)
                | (SessionState::Streaming, SessionState::Backgrounded)
                | (SessionState::Backgrounded, SessionState::Active)
                | (SessionState::Backgrounded, SessionState::Suspended)
        );
        if allowed {
            Ok(())
        } else if from == SessionState::Disposed {
            Err(SessionError::Disposed {
                server_id: self.server_id.clone(),
                room_id: self.room_id.clone(),
            })
        } else {
            Err(SessionError::InvalidTransition { from, to })
        }
    }

    fn meta(&self) -> std::sync::MutexGuard<'_, Meta> {
        self.meta.lock().unwrap_or_else(|e| e.into_inner())
    }
}
