//! lim: Command-line bridge to remote device instances
//!
//! Provides the `lim` CLI: browser login, default instance and config
//! management, and `lim exec`, which runs a command on a remote instance and
//! mirrors its output and exit code locally.

pub mod auth;
pub mod commands;
pub mod output;
pub mod session;
