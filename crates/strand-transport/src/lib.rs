//! Transport layer for AG-UI agent backends.
//!
//! Owns the HTTP/SSE client for one server: authenticated GET/POST with a
//! single-flight credential refresh on 401, and the streaming `run_agent`
//! request with pre-first-event retry and an idle watchdog.

mod auth;
mod client;
mod error;
mod rooms;
pub mod testing;

pub use auth::{AuthHeaders, StaticTokenProvider, TokenProvider};
pub use client::{BoxStream, RunOptions, Transport};
pub use error::TransportError;
pub use rooms::{Room, RoomApi, ThreadSummary};
