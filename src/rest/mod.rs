//! REST transport: the same commands as the channel, over plain HTTP.

pub mod client;
pub mod dto;

pub use client::RestClient;
pub use dto::{ClientList, ControlRequest, ControlResponse};
