//! Core error types for lim

use lim_protocol::ProtocolError;
use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for lim
#[derive(Error, Debug)]
pub enum LimError {
    /// Protocol error
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Connection error
    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),

    /// Session error
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Login error
    #[error("Login error: {0}")]
    Auth(#[from] AuthError),

    /// Instance lookup error
    #[error("Instance lookup error: {0}")]
    Directory(#[from] DirectoryError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors opening the connection to a remote endpoint
#[derive(Error, Debug)]
pub enum ConnectionError {
    /// Endpoint URL could not be used
    #[error("Invalid endpoint URL {url}: {reason}")]
    InvalidEndpoint { url: String, reason: String },

    /// The endpoint rejected the bearer token
    #[error("Endpoint rejected credentials (HTTP {0})")]
    Unauthorized(u16),

    /// TCP dial, TLS or WebSocket handshake failure
    #[error("Failed to connect to {url}: {reason}")]
    Handshake { url: String, reason: String },
}

/// Errors while a command session is running
#[derive(Error, Debug)]
pub enum SessionError {
    /// A request has already been sent on this session
    #[error("A command has already been sent on this session")]
    AlreadySent,

    /// Receive was attempted before any request was sent
    #[error("No command has been sent on this session")]
    NothingSent,

    /// The session was closed locally while a result was awaited
    #[error("Session closed")]
    Closed,

    /// Read or write on the socket failed mid-stream
    #[error("Transport error: {0}")]
    Transport(String),

    /// Local output stream could not be written
    #[error("Failed to write command output: {0}")]
    Output(#[source] std::io::Error),

    /// Protocol-level failure (e.g. stream ended without a result)
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Home directory could not be determined
    #[error("Could not determine home directory")]
    NoHomeDir,

    /// Config file could not be read
    #[error("Failed to read config file {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Config file could not be written
    #[error("Failed to write config file {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Unknown configuration key
    #[error("Unknown config key: {0}")]
    UnknownKey(String),

    /// Invalid configuration value
    #[error("Invalid value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },

    /// TOML parse error
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// TOML serialize error
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Errors from the browser login handoff
#[derive(Error, Debug)]
pub enum AuthError {
    /// Callback listener could not bind its port
    #[error("Failed to bind login callback server on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// Console endpoint is not a usable base URL
    #[error("Invalid console endpoint {0}")]
    InvalidConsoleEndpoint(String),

    /// Browser could not be opened
    #[error("Failed to open browser: {0}")]
    Browser(String),

    /// The callback arrived without a credential
    #[error("Login callback did not carry an API key")]
    MissingCredential,

    /// The credential arrived but could not be saved
    #[error("Failed to save API key: {0}")]
    Persist(#[source] ConfigError),

    /// Login was interrupted before the callback arrived
    #[error("Login cancelled")]
    Cancelled,

    /// Callback server stopped before delivering a result
    #[error("Login callback server stopped unexpectedly")]
    ServerStopped,
}

/// Errors from the instance directory
#[derive(Error, Debug)]
pub enum DirectoryError {
    /// The API rejected the stored credential
    #[error("Not logged in or API key is invalid")]
    Unauthenticated,

    /// No instance with that id
    #[error("Instance not found: {0}")]
    NotFound(String),

    /// The instance exists but exposes no endpoint yet
    #[error("Instance {0} has no endpoint yet (is it ready?)")]
    NotReady(String),

    /// Any other API failure
    #[error("API request failed: {0}")]
    Api(String),
}

impl AuthError {
    /// Whether this error only means the operator aborted the login
    pub fn is_cancelled(&self) -> bool {
        matches!(self, AuthError::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_errors_convert_into_lim_error() {
        let err: LimError = DirectoryError::NotFound("ios_1".into()).into();
        assert_eq!(
            err.to_string(),
            "Instance lookup error: Instance not found: ios_1"
        );

        let err: LimError = SessionError::from(ProtocolError::ClosedBeforeResult).into();
        assert!(matches!(
            err,
            LimError::Session(SessionError::Protocol(ProtocolError::ClosedBeforeResult))
        ));
    }

    #[test]
    fn test_auth_cancelled() {
        assert!(AuthError::Cancelled.is_cancelled());
        assert!(!AuthError::MissingCredential.is_cancelled());
    }

    #[test]
    fn test_unauthorized_message_has_status() {
        let err = ConnectionError::Unauthorized(401);
        assert!(err.to_string().contains("401"));
    }
}
