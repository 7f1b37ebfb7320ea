//! Instance directory trait

use async_trait::async_trait;

use crate::error::DirectoryError;
use crate::types::{InstanceId, RemoteEndpoint};

/// Resolves an instance id to the endpoint its commands are sent to
#[async_trait]
pub trait InstanceDirectory: Send + Sync {
    /// Look up the control endpoint of an instance
    async fn lookup(&self, id: &InstanceId) -> Result<RemoteEndpoint, DirectoryError>;
}
