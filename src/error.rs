//! Client error types.
//!
//! [`LinkError`] is the central error type of the crate. It is returned by
//! configuration loading, the REST client, and the WebSocket connector.
//! The command channel itself never returns it to callers: channel failures
//! are reported as a `false` return or a
//! [`ChannelEvent::Error`](crate::domain::ChannelEvent::Error).

/// Crate-wide error enum.
///
/// # Categories
///
/// | Variants                                   | Category      | Transient |
/// |--------------------------------------------|---------------|-----------|
/// | `InvalidEndpoint`, `InvalidCommand`, ...   | Validation    | no        |
/// | `WebSocket`, `Http`, `ConnectionClosed`    | Transport     | yes       |
/// | `Status`                                   | Backend       | 5xx only  |
/// | `Serialization`, `Config`                  | Local         | no        |
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    /// The base URL could not be turned into a WebSocket endpoint.
    #[error("invalid endpoint: {0:?}")]
    InvalidEndpoint(String),

    /// Unknown command name.
    #[error("invalid command: {0:?}")]
    InvalidCommand(String),

    /// Speed outside `0..=255`.
    #[error("invalid speed {0}: must be within 0..=255")]
    InvalidSpeed(i64),

    /// Any other malformed input.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// WebSocket handshake or stream failure.
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// The socket closed while an operation was in flight.
    #[error("connection closed")]
    ConnectionClosed,

    /// HTTP transport failure.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend answered with a non-success status.
    #[error("unexpected status {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, possibly truncated.
        body: String,
    },

    /// JSON encoding or decoding failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid configuration value.
    #[error("configuration error: {0}")]
    Config(String),
}

impl LinkError {
    /// Returns `true` if retrying the same operation may succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::WebSocket(_) | Self::Http(_) | Self::ConnectionClosed => true,
            Self::Status { status, .. } => *status >= 500,
            Self::InvalidEndpoint(_)
            | Self::InvalidCommand(_)
            | Self::InvalidSpeed(_)
            | Self::InvalidRequest(_)
            | Self::Serialization(_)
            | Self::Config(_) => false,
        }
    }
}
