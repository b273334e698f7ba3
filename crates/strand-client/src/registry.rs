//! The process-wide connection registry.

use crate::{RegistryConfig, RegistryError, RoomSession, SessionState};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use strand_thread::ToolRegistry;
use strand_transport::Transport;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// One server's connection: its transport and its room session pool.
pub struct ServerConnection {
    server_id: String,
    transport: Transport,
    tools: Arc<ToolRegistry>,
    sessions: Mutex<HashMap<String, Arc<RoomSession>>>,
    last_activity: Mutex<Instant>,
}

impl ServerConnection {
    fn new(server_id: String, transport: Transport, tools: Arc<ToolRegistry>) -> Self {
        Self {
            server_id,
            transport,
            tools,
            sessions: Mutex::new(HashMap::new()),
            last_activity: Mutex::new(Instant::now()),
        }
    }

    /// Server identifier.
    pub fn server_id(&self) -> &str {
        &self.server_id
    }

    /// The transport for this server.
    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    /// Get or create the session for a room.
    ///
    /// A disposed session left in the pool is replaced with a fresh one.
    pub fn session(&self, room_id: &str) -> Arc<RoomSession> {
        self.touch();
        let mut sessions = lock(&self.sessions);
        if let Some(existing) = sessions.get(room_id) {
            if !existing.is_disposed() {
                existing.touch();
                return existing.clone();
            }
        }
        let session = Arc::new(RoomSession::new(
            self.server_id.clone(),
            room_id,
            self.tools.clone(),
        ));
        sessions.insert(room_id.to_string(), session.clone());
        debug!(server_id = %self.server_id, room_id, "session created");
        session
    }

    /// Dispose and drop a room's session. Returns whether one existed.
    pub fn remove_session(&self, room_id: &str) -> bool {
        let removed = lock(&self.sessions).remove(room_id);
        if let Some(session) = removed {
            session.dispose();
            true
        } else {
            false
        }
    }

    /// Snapshot of the live sessions.
    pub fn sessions(&self) -> Vec<Arc<RoomSession>> {
        lock(&self.sessions).values().cloned().collect()
    }

    /// When this server was last used.
    pub fn last_activity(&self) -> Instant {
        *lock(&self.last_activity)
    }

    fn touch(&self) {
        *lock(&self.last_activity) = Instant::now();
    }

    fn dispose_all(&self) {
        for (_, session) in lock(&self.sessions).drain() {
            session.dispose();
        }
    }

    /// One maintenance pass over this server's sessions.
    fn sweep(&self, config: &RegistryConfig, now: Instant) {
        let sessions = self.sessions();
        for session in &sessions {
            let idle = now.saturating_duration_since(session.last_activity());
            match session.state() {
                SessionState::Active if idle > config.room_inactivity => {
                    debug!(room_id = %session.room_id(), "room idle; backgrounding");
                    let _ = session.background();
                }
                SessionState::Backgrounded if idle > config.suspend_after => {
                    debug!(room_id = %session.room_id(), "backgrounded past window; suspending");
                    let _ = session.suspend();
                }
                SessionState::Suspended => {
                    debug!(room_id = %session.room_id(), "suspended session disposed");
                    session.dispose();
                }
                _ => {}
            }
        }

        // LRU cap on backgrounded sessions.
        let mut backgrounded: Vec<&Arc<RoomSession>> = sessions
            .iter()
            .filter(|s| s.state() == SessionState::Backgrounded)
            .collect();
        if backgrounded.len() > config.max_backgrounded {
            backgrounded.sort_by_key(|s| s.last_activity());
            let excess = backgrounded.len() - config.max_backgrounded;
            for session in backgrounded.into_iter().take(excess) {
                info!(
                    server_id = %self.server_id,
                    room_id = %session.room_id(),
                    "evicting least-recently-used backgrounded session"
                );
                session.dispose();
            }
        }

        lock(&self.sessions).retain(|_, s| !s.is_disposed());
    }

    fn is_idle(&self, config: &RegistryConfig, now: Instant) -> bool {
        lock(&self.sessions).is_empty()
            && now.saturating_duration_since(self.last_activity()) > config.server_inactivity
    }
}

struct RegistryInner {
    config: RegistryConfig,
    tools: Arc<ToolRegistry>,
    servers: Mutex<HashMap<String, Arc<ServerConnection>>>,
    sweep_cancel: CancellationToken,
}

/// Process-wide table of server connections.
///
/// Owns the background sweep task that enforces inactivity timeouts and
/// the per-server backgrounded-LRU cap, so construction must happen
/// inside a Tokio runtime. Cheap to clone.
#[derive(Clone)]
pub struct ConnectionRegistry {
    inner: Arc<RegistryInner>,
}

impl ConnectionRegistry {
    /// Create a registry with its own tool registry.
    pub fn new(config: RegistryConfig) -> Self {
        Self::with_tools(config, Arc::new(ToolRegistry::new()))
    }

    /// Create a registry sharing a host-provided tool registry.
    pub fn with_tools(config: RegistryConfig, tools: Arc<ToolRegistry>) -> Self {
        let inner = Arc::new(RegistryInner {
            config,
            tools,
            servers: Mutex::new(HashMap::new()),
            sweep_cancel: CancellationToken::new(),
        });
        spawn_sweep_task(inner.clone());
        Self { inner }
    }

    /// The shared tool registry hosts plug executors into.
    pub fn tools(&self) -> Arc<ToolRegistry> {
        self.inner.tools.clone()
    }

    /// Register a server connection.
    pub fn register_server(
        &self,
        server_id: impl Into<String>,
        transport: Transport,
    ) -> Result<Arc<ServerConnection>, RegistryError> {
        let server_id = server_id.into();
        let mut servers = lock(&self.inner.servers);
        if servers.contains_key(&server_id) {
            return Err(RegistryError::DuplicateServer { server_id });
        }
        let connection = Arc::new(ServerConnection::new(
            server_id.clone(),
            transport,
            self.inner.tools.clone(),
        ));
        servers.insert(server_id, connection.clone());
        Ok(connection)
    }

    /// Look up a server connection.
    pub fn server(&self, server_id: &str) -> Option<Arc<ServerConnection>> {
        lock(&self.inner.servers).get(server_id).cloned()
    }

    /// Get or create the session for (server, room).
    pub fn session(
        &self,
        server_id: &str,
        room_id: &str,
    ) -> Result<Arc<RoomSession>, RegistryError> {
        let connection = self
            .server(server_id)
            .ok_or_else(|| RegistryError::UnknownServer {
                server_id: server_id.to_string(),
            })?;
        Ok(connection.session(room_id))
    }

    /// Dispose every session on a server and drop the connection.
    pub fn remove_server(&self, server_id: &str) -> bool {
        let removed = lock(&self.inner.servers).remove(server_id);
        if let Some(connection) = removed {
            connection.dispose_all();
            true
        } else {
            false
        }
    }

    /// Run one sweep pass immediately.
    pub fn sweep_now(&self) {
        sweep(&self.inner);
    }

    /// Stop the sweep task and dispose everything.
    pub fn shutdown(&self) {
        self.inner.sweep_cancel.cancel();
        for (_, connection) in lock(&self.inner.servers).drain() {
            connection.dispose_all();
        }
    }
}

fn spawn_sweep_task(inner: Arc<RegistryInner>) {
    let cancel = inner.sweep_cancel.clone();
    let period = inner.config.sweep_interval;
    tokio::spawn(async move {
        let start = Instant::now() + period;
        let mut ticks = tokio::time::interval_at(start, period);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = ticks.tick() => sweep(&inner),
            }
        }
    });
}

fn sweep(inner: &RegistryInner) {
    let now = Instant::now();
    let servers: Vec<Arc<ServerConnection>> =
        lock(&inner.servers).values().cloned().collect();
    for connection in &servers {
        connection.sweep(&inner.config, now);
    }
    lock(&inner.servers).retain(|server_id, connection| {
        let keep = !connection.is_idle(&inner.config, now);
        if !keep {
            info!(server_id, "dropping idle server connection");
        }
        keep
    });
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}
