//! Events published by the command channel.
//!
//! Every inbound frame and socket lifecycle change is turned into a
//! [`ChannelEvent`]. Subscribers register per [`EventKind`], so each kind
//! has exactly one payload type.

use std::fmt;

use serde::Serialize;

use super::status::{CommandAck, DeviceConnection, VehicleStatus};

/// Error conditions surfaced through [`ChannelEvent::Error`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChannelError {
    /// The base URL could not be turned into an endpoint.
    InvalidEndpoint {
        /// Rejected input.
        input: String,
    },
    /// Socket creation or an established socket failed.
    Transport {
        /// Transport-level description.
        message: String,
    },
    /// The backend reported an error frame.
    Server {
        /// Message from the backend.
        message: String,
        /// Command the error refers to, if any.
        command: Option<String>,
    },
    /// A command could not be serialized or queued.
    Send {
        /// Failure description.
        message: String,
    },
    /// The reconnect budget is spent; the channel will not retry on its own.
    ReconnectExhausted {
        /// Number of attempts made.
        attempts: u32,
    },
}

impl ChannelError {
    /// Returns `true` for the condition that stops self-healing.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::ReconnectExhausted { .. })
    }
}

impl fmt::Display for ChannelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidEndpoint { input } => write!(f, "invalid endpoint: {input:?}"),
            Self::Transport { message } => write!(f, "transport error: {message}"),
            Self::Server {
                message,
                command: Some(command),
            } => write!(f, "server error for {command}: {message}"),
            Self::Server { message, .. } => write!(f, "server error: {message}"),
            Self::Send { message } => write!(f, "send failed: {message}"),
            Self::ReconnectExhausted { attempts } => {
                write!(f, "max reconnection attempts reached ({attempts})")
            }
        }
    }
}

/// Event delivered to channel subscribers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "payload", rename_all = "snake_case")]
pub enum ChannelEvent {
    /// The socket opened (`true`) or closed (`false`).
    Connected(bool),
    /// Vehicle status update.
    Status(VehicleStatus),
    /// Command acknowledgment.
    Acknowledgment(CommandAck),
    /// A vehicle attached to the backend.
    DeviceConnected(DeviceConnection),
    /// The vehicle detached from the backend.
    DeviceDisconnected,
    /// Transport, protocol or reconnect failure.
    Error(ChannelError),
}

impl ChannelEvent {
    /// Returns the kind used to route this event to subscribers.
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::Connected(_) => EventKind::Connected,
            Self::Status(_) => EventKind::Status,
            Self::Acknowledgment(_) => EventKind::Acknowledgment,
            Self::DeviceConnected(_) => EventKind::DeviceConnected,
            Self::DeviceDisconnected => EventKind::DeviceDisconnected,
            Self::Error(_) => EventKind::Error,
        }
    }
}

/// Routing key for subscriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// [`ChannelEvent::Connected`].
    Connected,
    /// [`ChannelEvent::Status`].
    Status,
    /// [`ChannelEvent::Acknowledgment`].
    Acknowledgment,
    /// [`ChannelEvent::DeviceConnected`].
    DeviceConnected,
    /// [`ChannelEvent::DeviceDisconnected`].
    DeviceDisconnected,
    /// [`ChannelEvent::Error`].
    Error,
}

impl EventKind {
    /// Every event kind, in declaration order.
    pub const ALL: [Self; 6] = [
        Self::Connected,
        Self::Status,
        Self::Acknowledgment,
        Self::DeviceConnected,
        Self::DeviceDisconnected,
        Self::Error,
    ];

    /// Returns the event name as a static string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Connected => "connected",
            Self::Status => "status",
            Self::Acknowledgment => "acknowledgment",
            Self::DeviceConnected => "device_connected",
            Self::DeviceDisconnected => "device_disconnected",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Connection condition of the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelState {
    /// Never connected, or torn down by `disconnect`.
    #[default]
    Idle,
    /// A socket is being opened.
    Connecting,
    /// The socket is open; commands may be sent.
    Open,
    /// The socket closed and no reconnect is pending.
    Closed,
    /// Waiting for the reconnect delay to elapse.
    Reconnecting,
}
