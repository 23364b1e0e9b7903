//! # rover-link
//!
//! Client-side command link for a remotely driven vehicle.
//!
//! The crate keeps a persistent WebSocket channel to the vehicle backend,
//! sends movement commands over it, and republishes the backend's pushed
//! messages as typed events. A dropped channel is re-established on a fixed
//! delay with a bounded attempt budget. A plain HTTP client covers the same
//! commands for callers that do not need a live channel.
//!
//! ## Architecture
//!
//! ```text
//! Application
//!     │
//!     ├── CommandChannel (channel/)
//!     │     ├── SubscriptionRegistry   on / off / dispatch
//!     │     ├── ReconnectPolicy        delay + attempt budget
//!     │     ├── messages               JSON frames ⇄ ChannelEvent
//!     │     └── Connector              tokio-tungstenite socket
//!     │
//!     ├── RestClient (rest/)           /car/control, /car/status, /car/clients
//!     │
//!     └── Vehicle backend
//! ```

pub mod channel;
pub mod config;
pub mod domain;
pub mod error;
pub mod rest;
