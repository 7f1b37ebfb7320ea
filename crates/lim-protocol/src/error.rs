//! Protocol error types

use thiserror::Error;

/// Errors that can occur while encoding or decoding protocol messages
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// Outbound message could not be serialized
    #[error("Failed to encode message: {0}")]
    Encode(#[source] serde_json::Error),

    /// Inbound frame is not valid JSON or does not match the message schema
    #[error("Malformed frame: {0}")]
    Malformed(#[source] serde_json::Error),

    /// The stream ended before a terminal result was observed
    #[error("Stream closed before a terminal result was received")]
    ClosedBeforeResult,
}
