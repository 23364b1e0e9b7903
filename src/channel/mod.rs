//! WebSocket command channel: connection lifecycle, wire format,
//! subscriptions, and reconnect policy.
//!
//! The channel connects to the backend's `/ws` endpoint, publishes decoded
//! server messages as typed events, and sends movement commands while the
//! socket is open.

pub mod command_channel;
pub mod connector;
pub mod messages;
pub mod reconnect;
pub mod subscription;

pub use command_channel::CommandChannel;
pub use connector::{Connector, Frame, FrameSink, FrameStream, Socket, TungsteniteConnector};
pub use reconnect::ReconnectPolicy;
pub use subscription::{EventHandler, SubscriptionRegistry};
