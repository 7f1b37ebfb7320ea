//! Process exit codes
//!
//! A terminal remote result passes its exit code through verbatim. Codes
//! produced locally are listed here.

/// Exit code on success
pub const EXIT_SUCCESS: i32 = 0;

/// Exit code for any fatal local error (configuration, connection,
/// transport or protocol failure)
pub const EXIT_FAILURE: i32 = 255;

/// Base added to a signal number when a signal terminates the process
pub const SIGNAL_EXIT_BASE: i32 = 128;
