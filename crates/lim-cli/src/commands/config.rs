//! Config command implementations

use anyhow::Result;

use crate::output::{format_settings, mask_secret, print_info, print_success, print_warning};
use lim_core::config::{ConfigStore, Settings, CONFIG_KEYS};
use lim_core::error::ConfigError;
use lim_core::traits::CredentialStore;

/// Show the effective configuration
pub fn config_show(settings: &Settings) -> Result<()> {
    print_info(&format!("Configuration file: {:?}", settings.config_path));
    println!("{}", format_settings(settings));
    Ok(())
}

/// Print the config file path
pub fn config_path(settings: &Settings) -> Result<()> {
    println!("{}", settings.config_path.display());
    Ok(())
}

/// Print a value stored in the config file
pub fn config_get(settings: &Settings, key: &str) -> Result<()> {
    let store = ConfigStore::open(&settings.config_path)?;
    match store.file().get_value(key).map_err(with_key_hint)? {
        Some(value) => println!("{}", value),
        None => print_warning(&format!("{} is not set", key)),
    }
    Ok(())
}

/// Set a value in the config file
pub fn config_set(settings: &Settings, key: &str, value: &str) -> Result<()> {
    let mut store = ConfigStore::open(&settings.config_path)?;
    store
        .file_mut()
        .set_value(key, value)
        .map_err(with_key_hint)?;
    store.persist()?;

    if value.is_empty() {
        print_success(&format!("Cleared {}", key));
    } else if key.replace('-', "_") == "api_key" {
        print_success(&format!("Set {} = {}", key, mask_secret(value)));
    } else {
        print_success(&format!("Set {} = {}", key, value));
    }
    Ok(())
}

fn with_key_hint(error: ConfigError) -> ConfigError {
    if matches!(error, ConfigError::UnknownKey(_)) {
        print_info(&format!("Known keys: {}", CONFIG_KEYS.join(", ")));
    }
    error
}
