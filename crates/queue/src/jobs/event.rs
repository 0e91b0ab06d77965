//! Ingested event.

use std::fmt;

use serde::{Deserialize, Serialize};

/// An event submitted for delivery.
///
/// Events are immutable once ingested and carry no identifier of their own;
/// two events with the same content are indistinguishable downstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Identity of the user the event belongs to.
    #[serde(rename = "userID")]
    pub user_id: String,

    /// Opaque event body.
    pub payload: String,
}

impl Event {
    /// Create a new event.
    #[must_use]
    pub fn new(user_id: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            payload: payload.into(),
        }
    }

    /// Serialize to the queue wire format.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Parse from the queue wire format.
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    /// Parse from a raw request or queue body.
    pub fn from_json_bytes(raw: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(raw)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{userID: {}, payload: {}}}", self.user_id, self.payload)
    }
}
