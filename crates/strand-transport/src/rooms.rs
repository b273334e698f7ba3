//! Thin CRUD veneer over the backend room/thread endpoints.

use crate::{Transport, TransportError};
use serde::{Deserialize, Serialize};
use serde_json::json;

/// A room listed by the backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Room {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<u64>,
}

/// A conversation thread within a room.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ThreadSummary {
    pub id: String,
    pub room_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

/// Room and thread listing/creation against one server.
#[derive(Clone)]
pub struct RoomApi {
    transport: Transport,
}

impl RoomApi {
    /// Wrap a transport.
    pub fn new(transport: Transport) -> Self {
        Self { transport }
    }

    /// List the rooms visible to the caller.
    pub async fn list_rooms(&self) -> Result<Vec<Room>, TransportError> {
        self.transport.get("/api/v1/rooms").await
    }

    /// Create a room.
    pub async fn create_room(&self, name: &str) -> Result<Room, TransportError> {
        self.transport
            .post("/api/v1/rooms", &json!({ "name": name }))
            .await
    }

    /// List the threads in a room.
    pub async fn list_threads(&self, room_id: &str) -> Result<Vec<ThreadSummary>, TransportError> {
        self.transport
            .get(&format!("/api/v1/rooms/{room_id}/threads"))
            .await
    }
}
