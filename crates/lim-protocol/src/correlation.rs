//! Correlation identifier type

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Prefix carried by every generated correlation id
const ID_PREFIX: &str = "command";

/// Opaque token linking an outbound request to all of its streamed results
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(String);

impl CorrelationId {
    /// Generate a fresh, globally unique id (`command_<uuid>`)
    pub fn generate() -> Self {
        Self(format!("{}_{}", ID_PREFIX, Uuid::new_v4().simple()))
    }

    /// Get the raw id string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether an inbound id refers to this request
    pub fn matches(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for CorrelationId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for CorrelationId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}
