//! CLI command implementations

mod config;
mod exec;
mod instance;
mod login;

pub use config::{config_get, config_path, config_set, config_show};
pub use exec::exec_command;
pub use instance::{instance_get, instance_set};
pub use login::{login_command, logout_command};
