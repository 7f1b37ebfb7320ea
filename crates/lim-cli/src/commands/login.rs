//! Login and logout commands

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::auth::{self, LoginOptions, SystemBrowser};
use crate::output::{print_info, print_success};
use lim_core::config::{ConfigStore, Settings};
use lim_core::traits::CredentialStore;

/// Log in through the browser and store the API key
///
/// Ctrl+C while waiting for the callback aborts the login.
pub async fn login_command(settings: &Settings) -> Result<()> {
    let store = ConfigStore::open(&settings.config_path)?;
    let store = Arc::new(Mutex::new(store));
    let options = LoginOptions::from_settings(settings);

    let cancel = CancellationToken::new();
    let interrupt = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Received Ctrl+C, cancelling login...");
                cancel.cancel();
            }
        })
    };

    let result = auth::login(&options, store, &SystemBrowser, cancel).await;
    interrupt.abort();
    result?;

    print_success("You are logged in now");
    Ok(())
}

/// Remove the stored API key
pub fn logout_command(settings: &Settings) -> Result<()> {
    let mut store = ConfigStore::open(&settings.config_path)?;

    if store.credential().is_none() {
        print_info("Not logged in");
        return Ok(());
    }

    store.set_credential(None);
    store
        .persist()
        .with_context(|| format!("Failed to update {:?}", store.path()))?;

    print_success("Logged out");
    Ok(())
}
