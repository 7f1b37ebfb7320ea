//! Default instance commands

use anyhow::Result;

use crate::output::{print_success, print_warning};
use lim_core::config::{ConfigStore, Settings};
use lim_core::traits::CredentialStore;

/// Remember `id` as the instance `lim exec` targets by default
pub fn instance_set(settings: &Settings, id: &str) -> Result<()> {
    let mut store = ConfigStore::open(&settings.config_path)?;
    store.file_mut().instance_id = Some(id.to_string());
    store.persist()?;

    print_success(&format!("Default instance set to {}", id));
    Ok(())
}

/// Print the instance `lim exec` would target
pub fn instance_get(settings: &Settings) -> Result<()> {
    match &settings.instance_id {
        Some(id) => println!("{}", id),
        None => print_warning("No default instance set. Use 'lim instance set <id>'"),
    }
    Ok(())
}
