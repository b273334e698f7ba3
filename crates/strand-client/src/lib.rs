//! Top-level AG-UI client: a process-wide pool of per-server connections
//! and per-room sessions, with inactivity- and LRU-based lifecycle
//! management over the thread engines they own.
//!
//! Re-exports the member crates so hosts depend on one crate.

mod config;
mod error;
mod registry;
mod session;

pub use config::RegistryConfig;
pub use error::{RegistryError, SessionError};
pub use registry::{ConnectionRegistry, ServerConnection};
pub use session::{RoomSession, SessionState};

pub use strand_protocol_ag_ui as protocol;
pub use strand_state as state;
pub use strand_thread as thread;
pub use strand_transport as transport;
