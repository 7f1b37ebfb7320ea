//! Browser-based login
//!
//! `login` starts the local callback listener, points the browser at the
//! console's login page and waits until the console redirects back with an
//! API key (or the operator gives up with Ctrl+C).

mod browser;
mod callback;

pub use browser::{BrowserLauncher, SystemBrowser};
pub use callback::{AuthCallbackServer, CallbackOutcome, CALLBACK_PATH, CREDENTIAL_PARAM};

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use url::Url;

use lim_core::config::Settings;
use lim_core::error::AuthError;
use lim_core::traits::CredentialStore;

/// Value sent as the `user-agent` query parameter of the login page
pub const USER_AGENT: &str = concat!("lim/", env!("CARGO_PKG_VERSION"));

/// Parameters of one login attempt
#[derive(Debug, Clone)]
pub struct LoginOptions {
    pub console_endpoint: String,
    pub callback_addr: SocketAddr,
    pub shutdown_grace: Duration,
}

impl LoginOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            console_endpoint: settings.console_endpoint.clone(),
            callback_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, settings.callback_port)),
            shutdown_grace: settings.shutdown_grace,
        }
    }
}

/// Build the console login URL: `<console>/authn/login?user-agent=lim/<version>`
pub fn authorization_url(console_endpoint: &str) -> Result<Url, AuthError> {
    let invalid = || AuthError::InvalidConsoleEndpoint(console_endpoint.to_string());

    let mut url = Url::parse(console_endpoint).map_err(|_| invalid())?;
    url.path_segments_mut()
        .map_err(|_| invalid())?
        .pop_if_empty()
        .extend(["authn", "login"]);
    url.query_pairs_mut().append_pair("user-agent", USER_AGENT);
    Ok(url)
}

/// Run the browser login flow to completion
///
/// Returns once the callback has been answered. The listener is always shut
/// down before returning, whatever the outcome.
pub async fn login<S, B>(
    options: &LoginOptions,
    store: Arc<Mutex<S>>,
    browser: &B,
    cancel: CancellationToken,
) -> Result<(), AuthError>
where
    S: CredentialStore + 'static,
    B: BrowserLauncher + ?Sized,
{
    let url = authorization_url(&options.console_endpoint)?;
    let mut server = AuthCallbackServer::start(options.callback_addr, store).await?;

    tracing::info!(callback = %server.callback_url(), "Waiting for login callback");

    if let Err(e) = browser.open(url.as_str()) {
        server.shutdown(options.shutdown_grace).await;
        return Err(e);
    }

    let outcome = tokio::select! {
        outcome = server.wait() => outcome,
        _ = cancel.cancelled() => Err(AuthError::Cancelled),
    };

    server.shutdown(options.shutdown_grace).await;

    match outcome? {
        CallbackOutcome::LoggedIn {
            persist_error: None,
        } => Ok(()),
        CallbackOutcome::LoggedIn {
            persist_error: Some(e),
        } => Err(AuthError::Persist(e)),
        CallbackOutcome::Rejected => Err(AuthError::MissingCredential),
    }
}
