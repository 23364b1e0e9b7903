//! Domain layer: command vocabulary, status payloads, and channel events.
//!
//! These types are shared by the WebSocket command channel and the REST
//! client, so both transports speak the same vocabulary.

pub mod command;
pub mod endpoint;
pub mod event;
pub mod status;
pub mod subscription_id;

pub use command::{Command, OutboundCommand, Speed};
pub use endpoint::{Endpoint, WsScheme};
pub use event::{ChannelError, ChannelEvent, ChannelState, EventKind};
pub use status::{CommandAck, DeviceConnection, VehicleStatus, WireTime};
pub use subscription_id::SubscriptionId;
