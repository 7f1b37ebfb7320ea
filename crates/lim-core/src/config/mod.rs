//! Configuration management for lim
//!
//! The config file lives at `~/.lim/config.toml`. It holds the API key written
//! by `lim login`, the API and console endpoints, the default instance id and
//! a few timing knobs. Values are resolved per invocation into [`Settings`],
//! with command-line flags and `LIM_*` environment variables taking
//! precedence over the file.

mod file;
pub mod serde_utils;
mod settings;
mod store;

pub use file::{
    ConfigFile, CONFIG_KEYS, DEFAULT_API_ENDPOINT, DEFAULT_CALLBACK_PORT, DEFAULT_CONSOLE_ENDPOINT,
};
pub use settings::{Overrides, Settings};
pub use store::ConfigStore;

use crate::error::ConfigError;
use std::path::{Path, PathBuf};

/// Name of the per-user config directory under `$HOME`
const CONFIG_DIR_NAME: &str = ".lim";

/// Get the default configuration directory (`~/.lim`)
pub fn default_config_dir() -> Result<PathBuf, ConfigError> {
    dirs::home_dir()
        .map(|home| home.join(CONFIG_DIR_NAME))
        .ok_or(ConfigError::NoHomeDir)
}

/// Get the default configuration file path (`~/.lim/config.toml`)
pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    Ok(default_config_dir()?.join("config.toml"))
}

/// Load configuration from a file, returning `None` when it does not exist
pub fn load_config<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Option<T>, ConfigError> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    let config: T = toml::from_str(&content)?;
    Ok(Some(config))
}

/// Save configuration to a file
///
/// The parent directory is created with mode 0700 and the file written with
/// mode 0600 on Unix, since it carries the API key.
pub fn save_config<T: serde::Serialize>(path: &Path, config: &T) -> Result<(), ConfigError> {
    let content = toml::to_string_pretty(config)?;
    let write_err = |source| ConfigError::Write {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        create_private_dir(parent).map_err(write_err)?;
    }

    std::fs::write(path, content).map_err(write_err)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
            .map_err(write_err)?;
    }

    tracing::debug!(path = %path.display(), "Saved configuration");
    Ok(())
}

fn create_private_dir(dir: &Path) -> std::io::Result<()> {
    let mut builder = std::fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o700);
    }
    builder.create(dir)
}
