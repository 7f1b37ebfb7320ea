//! Effective settings for one invocation

use std::path::PathBuf;
use std::time::Duration;

use super::ConfigFile;

/// Values supplied on the command line or through `LIM_*` variables
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub api_key: Option<String>,
    pub api_endpoint: Option<String>,
    pub console_endpoint: Option<String>,
    pub instance_id: Option<String>,
}

/// Configuration resolved for a single command invocation
///
/// Built once in `main` and handed to each command handler by reference.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Config file the values were read from (and `login` writes to)
    pub config_path: PathBuf,
    pub api_key: Option<String>,
    pub api_endpoint: String,
    pub console_endpoint: String,
    pub instance_id: Option<String>,
    pub callback_port: u16,
    pub shutdown_grace: Duration,
    pub close_timeout: Duration,
}

impl Settings {
    /// Layer overrides on top of the file; empty override values are ignored
    pub fn resolve(config_path: PathBuf, file: &ConfigFile, overrides: Overrides) -> Self {
        let pick = |over: Option<String>| over.filter(|v| !v.is_empty());

        Self {
            config_path,
            api_key: pick(overrides.api_key).or_else(|| file.api_key.clone()),
            api_endpoint: pick(overrides.api_endpoint).unwrap_or_else(|| file.api_endpoint.clone()),
            console_endpoint: pick(overrides.console_endpoint)
                .unwrap_or_else(|| file.console_endpoint.clone()),
            instance_id: pick(overrides.instance_id).or_else(|| file.instance_id.clone()),
            callback_port: file.callback_port,
            shutdown_grace: file.shutdown_grace,
            close_timeout: file.close_timeout,
        }
    }
}
