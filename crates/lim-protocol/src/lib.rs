//! lim-protocol: Wire protocol for remote command execution
//!
//! This crate defines the JSON messages exchanged over the WebSocket
//! connection between the `lim` CLI and a remote device-control endpoint.
//! A session carries exactly one outbound [`CommandRequest`] and any number
//! of inbound [`CommandResult`] chunks correlated to it by id.

pub mod correlation;
pub mod error;
pub mod message;

pub use correlation::CorrelationId;
pub use error::ProtocolError;
pub use message::{ClientMessage, CommandRequest, CommandResult, ServerMessage};
