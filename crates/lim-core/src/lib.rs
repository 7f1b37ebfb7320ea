//! lim-core: Configuration and collaborator contracts for lim
//!
//! This crate provides the configuration file, the credential store the
//! login flow writes to, the instance directory used to resolve a remote
//! endpoint, and the error taxonomy shared by the CLI.

pub mod config;
pub mod directory;
pub mod error;
pub mod exit;
pub mod traits;
pub mod types;

pub use error::LimError;
pub use types::{InstanceId, RemoteEndpoint};
