//! Core domain types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a remote device instance
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InstanceId(pub String);

impl InstanceId {
    /// Create a new instance ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the raw ID string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for InstanceId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for InstanceId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Where to reach an instance's control endpoint
///
/// Obtained from the instance directory for each invocation and never
/// written to disk.
#[derive(Clone, PartialEq, Eq)]
pub struct RemoteEndpoint {
    /// WebSocket URL (`ws://` or `wss://`)
    pub url: String,
    /// Bearer token presented during the handshake
    pub token: String,
}

impl RemoteEndpoint {
    /// Create a new endpoint
    pub fn new(url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            token: token.into(),
        }
    }
}

impl fmt::Debug for RemoteEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteEndpoint")
            .field("url", &self.url)
            .field("token", &"<redacted>")
            .finish()
    }
}
