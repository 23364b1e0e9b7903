//! Wire format of the command channel.
//!
//! Inbound frames are JSON objects tagged by `type`; outbound frames are
//! bare [`OutboundCommand`] objects.

use serde::Deserialize;

use crate::domain::{
    ChannelError, ChannelEvent, CommandAck, DeviceConnection, OutboundCommand, VehicleStatus,
};
use crate::error::LinkError;

/// Inbound envelope sent by the backend.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundMessage {
    /// Periodic or change-driven status push.
    CarStatus {
        /// Current vehicle status.
        data: VehicleStatus,
    },
    /// The vehicle acknowledged a command.
    CarAck {
        /// Acknowledged command.
        command: String,
        /// Outcome reported by the vehicle.
        status: String,
    },
    /// A vehicle attached to the backend.
    CarConnected {
        /// Device identifier.
        device: String,
        /// Device state.
        status: String,
    },
    /// The vehicle detached from the backend.
    CarDisconnected,
    /// The backend rejected something.
    Error {
        /// Error description.
        message: String,
        /// Command the error refers to.
        #[serde(default)]
        command: Option<String>,
    },
    /// Any tag this client does not understand.
    #[serde(other)]
    Unknown,
}

impl InboundMessage {
    /// Maps the message onto the event published to subscribers.
    ///
    /// Returns `None` for [`InboundMessage::Unknown`].
    #[must_use]
    pub fn into_event(self) -> Option<ChannelEvent> {
        let event = match self {
            Self::CarStatus { data } => ChannelEvent::Status(data),
            Self::CarAck { command, status } => {
                ChannelEvent::Acknowledgment(CommandAck { command, status })
            }
            Self::CarConnected { device, status } => {
                ChannelEvent::DeviceConnected(DeviceConnection { device, status })
            }
            Self::CarDisconnected => ChannelEvent::DeviceDisconnected,
            Self::Error { message, command } => {
                ChannelEvent::Error(ChannelError::Server { message, command })
            }
            Self::Unknown => return None,
        };
        Some(event)
    }
}

/// Decodes a text frame into the event it should publish.
///
/// Unknown tags are logged and yield `Ok(None)`.
///
/// # Errors
///
/// Returns [`LinkError::Serialization`] if the frame is not valid JSON or
/// does not match the envelope of its tag.
pub fn decode_frame(text: &str) -> Result<Option<ChannelEvent>, LinkError> {
    let message: InboundMessage = serde_json::from_str(text)?;

    match &message {
        InboundMessage::Unknown => {
            let tag = serde_json::from_str::<serde_json::Value>(text)
                .ok()
                .and_then(|v| v.get("type").and_then(|t| t.as_str()).map(str::to_owned))
                .unwrap_or_default();
            tracing::debug!(tag = %tag, "ignoring unknown message type");
        }
        InboundMessage::Error { message, command } => {
            tracing::warn!(error = %message, ?command, "backend reported an error");
        }
        _ => {}
    }

    Ok(message.into_event())
}

/// Serializes a command into the outbound frame body.
///
/// # Errors
///
/// Returns [`LinkError::Serialization`] if encoding fails.
pub fn encode_command(command: &OutboundCommand) -> Result<String, LinkError> {
    Ok(serde_json::to_string(command)?)
}
