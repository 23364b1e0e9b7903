//! Vehicle status payloads reported by the backend.
//!
//! The same [`VehicleStatus`] shape is pushed over the WebSocket inside
//! `car_status` frames and returned by `GET /car/status`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Point in time as reported by the backend.
///
/// The backend has been seen to send both epoch milliseconds and RFC 3339
/// strings; anything else is kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WireTime {
    /// Milliseconds since the Unix epoch.
    EpochMillis(i64),
    /// RFC 3339 timestamp.
    Rfc3339(DateTime<Utc>),
    /// Unrecognized representation.
    Other(String),
}

impl WireTime {
    /// Converts to a UTC timestamp when the representation allows it.
    #[must_use]
    pub fn to_utc(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::EpochMillis(ms) => DateTime::from_timestamp_millis(*ms),
            Self::Rfc3339(ts) => Some(*ts),
            Self::Other(_) => None,
        }
    }
}

/// Current vehicle status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleStatus {
    /// Whether the vehicle is attached to the backend.
    pub connected: bool,
    /// When the backend last heard from the vehicle.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_update: Option<WireTime>,
    /// Free-form state string (e.g. `"idle"`, `"moving"`).
    #[serde(default)]
    pub status: String,
    /// Last command the vehicle executed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_command: Option<String>,
    /// When the last command was executed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_command_time: Option<WireTime>,
    /// Device-specific details, passed through unchanged.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_info: Option<serde_json::Value>,
}

/// Acknowledgment of a command by the vehicle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandAck {
    /// Command being acknowledged, as named by the backend.
    pub command: String,
    /// Outcome reported by the vehicle.
    pub status: String,
}

/// Notification that a vehicle attached to the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceConnection {
    /// Device identifier.
    pub device: String,
    /// Device state at attach time.
    pub status: String,
}
