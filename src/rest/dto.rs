//! Request and response bodies of the backend's REST endpoints.

use serde::{Deserialize, Serialize};

use crate::domain::{Command, Speed};

/// Body of `POST /car/control`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlRequest {
    /// Directive to execute.
    pub command: Command,
    /// Motor intensity.
    pub speed: Speed,
}

/// Reply to `POST /car/control`.
///
/// Every field is optional on the wire; a bare `200 OK` with `{}` decodes
/// as a success without message.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ControlResponse {
    /// Whether the backend accepted the command.
    #[serde(default = "default_success")]
    pub success: bool,
    /// Human-readable outcome.
    #[serde(default)]
    pub message: Option<String>,
}

fn default_success() -> bool {
    true
}

/// Reply to `GET /car/clients`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ClientList {
    /// Number of clients attached to the backend, when reported.
    #[serde(default)]
    pub count: Option<usize>,
    /// Client descriptors, passed through unchanged.
    #[serde(default)]
    pub clients: Vec<serde_json::Value>,
}

impl ClientList {
    /// Returns the reported count, or the number of listed clients.
    #[must_use]
    pub fn total(&self) -> usize {
        self.count.unwrap_or(self.clients.len())
    }
}
