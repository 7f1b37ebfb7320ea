//! Credential store trait

use crate::error::ConfigError;

/// Persistent home of the API key
///
/// The login callback writes through this trait; everything else only reads
/// the key once it has been resolved into settings.
pub trait CredentialStore: Send {
    /// Currently stored API key
    fn credential(&self) -> Option<&str>;

    /// Replace the stored API key in memory (`None` clears it)
    fn set_credential(&mut self, credential: Option<String>);

    /// Write the current state to durable storage
    fn persist(&self) -> Result<(), ConfigError>;
}
