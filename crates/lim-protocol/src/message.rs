//! Message types for the remote command protocol
//!
//! Messages are JSON objects discriminated by a `type` field and travel as
//! WebSocket text frames.
//!
//! # Message Flow
//!
//! 1. Client connects and sends a single `command` message carrying a fresh id
//! 2. Endpoint streams zero or more `commandResult` messages with that id,
//!    each optionally carrying a chunk of stdout and/or stderr
//! 3. The `commandResult` that carries `exitCode` is terminal for that id
//!
//! Anything else the endpoint sends (other message types, results for other
//! ids) is not addressed to the outstanding request and is ignored by the
//! session.

use serde::{Deserialize, Serialize};

use crate::correlation::CorrelationId;
use crate::error::ProtocolError;

/// Request to run one command line on the remote endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandRequest {
    /// Correlation id echoed back on every result
    pub id: CorrelationId,
    /// Argument vector, passed through untouched
    pub args: Vec<String>,
}

impl CommandRequest {
    /// Build a request with a freshly generated correlation id
    pub fn new(args: Vec<String>) -> Self {
        Self {
            id: CorrelationId::generate(),
            args,
        }
    }
}

/// A chunk of output and/or the final status of a command
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandResult {
    /// Correlation id of the request this result belongs to
    pub id: String,
    /// Exit code of the remote command; present only on the terminal message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    /// Output written by the command to its stdout
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stdout: Option<String>,
    /// Output written by the command to its stderr
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stderr: Option<String>,
}

impl CommandResult {
    /// Whether this result ends the command
    pub fn is_terminal(&self) -> bool {
        self.exit_code.is_some()
    }

    /// Non-empty stdout chunk, if any
    pub fn stdout_bytes(&self) -> Option<&[u8]> {
        self.stdout
            .as_deref()
            .filter(|s| !s.is_empty())
            .map(str::as_bytes)
    }

    /// Non-empty stderr chunk, if any
    pub fn stderr_bytes(&self) -> Option<&[u8]> {
        self.stderr
            .as_deref()
            .filter(|s| !s.is_empty())
            .map(str::as_bytes)
    }
}

/// Messages sent by the CLI
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// Run a command
    #[serde(rename = "command")]
    Command(CommandRequest),
}

impl ClientMessage {
    /// Serialize into the text payload of a WebSocket frame
    pub fn encode(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(ProtocolError::Encode)
    }

    /// Parse a frame payload (used by endpoints and test servers)
    pub fn decode(payload: &[u8]) -> Result<Self, ProtocolError> {
        serde_json::from_slice(payload).map_err(ProtocolError::Malformed)
    }
}

/// Messages received from the remote endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    /// Output chunk or final status of a command
    #[serde(rename = "commandResult")]
    CommandResult(CommandResult),

    /// Any message type this client does not handle
    #[serde(other)]
    Unknown,
}

impl ServerMessage {
    /// Parse a frame payload
    pub fn decode(payload: &[u8]) -> Result<Self, ProtocolError> {
        serde_json::from_slice(payload).map_err(ProtocolError::Malformed)
    }

    /// Serialize into the text payload of a WebSocket frame
    pub fn encode(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(ProtocolError::Encode)
    }
}
