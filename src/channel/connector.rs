//! Socket construction seam.
//!
//! The command channel never touches `tokio-tungstenite` directly: it asks a
//! [`Connector`] for a [`Socket`], a pair of boxed sink/stream halves
//! carrying [`Frame`]s. [`TungsteniteConnector`] is the production
//! implementation; tests plug in an in-memory one.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use futures_util::{Sink, SinkExt, Stream, StreamExt, future};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;

use crate::domain::Endpoint;
use crate::error::LinkError;

/// Close code of an intentional shutdown. Never triggers a reconnect.
pub const NORMAL_CLOSURE: u16 = 1000;

/// Close code used when the peer vanished without a close frame.
pub const ABNORMAL_CLOSURE: u16 = 1006;

/// Close code reported when a close frame carried no status.
pub const NO_STATUS_RECEIVED: u16 = 1005;

/// Transport-neutral WebSocket frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// UTF-8 text payload.
    Text(String),
    /// Close handshake with an optional status code.
    Close(Option<u16>),
}

impl Frame {
    fn into_message(self) -> Message {
        match self {
            Self::Text(text) => Message::text(text),
            Self::Close(code) => Message::Close(code.map(|code| CloseFrame {
                code: CloseCode::from(code),
                reason: "".into(),
            })),
        }
    }

    fn from_message(message: Message) -> Option<Self> {
        match message {
            Message::Text(text) => Some(Self::Text(text.as_str().to_owned())),
            Message::Close(frame) => Some(Self::Close(frame.map(|f| u16::from(f.code)))),
            Message::Binary(_) | Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => None,
        }
    }
}

/// Write half of a socket.
pub type FrameSink = Pin<Box<dyn Sink<Frame, Error = LinkError> + Send>>;

/// Read half of a socket.
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<Frame, LinkError>> + Send>>;

/// An open WebSocket, split into halves.
pub struct Socket {
    /// Outbound frames.
    pub sink: FrameSink,
    /// Inbound frames, ending when the peer goes away.
    pub stream: FrameStream,
}

impl Socket {
    /// Wraps already-split halves.
    #[must_use]
    pub fn new(sink: FrameSink, stream: FrameStream) -> Self {
        Self { sink, stream }
    }
}

impl fmt::Debug for Socket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Socket").finish_non_exhaustive()
    }
}

/// Opens sockets for the command channel.
pub trait Connector: Send + Sync + 'static {
    /// Opens a socket to `endpoint`.
    ///
    /// # Errors
    ///
    /// Returns a [`LinkError`] if the socket cannot be established.
    fn connect(
        &self,
        endpoint: &Endpoint,
    ) -> impl Future<Output = Result<Socket, LinkError>> + Send;
}

/// [`Connector`] backed by `tokio-tungstenite`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TungsteniteConnector;

impl Connector for TungsteniteConnector {
    async fn connect(&self, endpoint: &Endpoint) -> Result<Socket, LinkError> {
        let (ws, response) = tokio_tungstenite::connect_async(endpoint.url()).await?;
        tracing::debug!(%endpoint, status = %response.status(), "websocket handshake complete");

        let (sink, stream) = ws.split();
        let sink = sink
            .sink_map_err(LinkError::from)
            .with(|frame: Frame| future::ready(Ok::<_, LinkError>(frame.into_message())));
        let stream = stream.filter_map(|item| {
            future::ready(match item {
                Ok(message) => Frame::from_message(message).map(Ok),
                Err(e) => Some(Err(LinkError::from(e))),
            })
        });

        Ok(Socket::new(Box::pin(sink), Box::pin(stream)))
    }
}
