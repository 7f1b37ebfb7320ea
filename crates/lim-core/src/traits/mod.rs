//! Contracts for the collaborators the CLI talks to

mod credentials;
mod directory;

pub use credentials::CredentialStore;
pub use directory::InstanceDirectory;
