//! Running a command on a remote instance

use std::io;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};

use super::login_command;
use crate::output::print_warning;
use crate::session::{run_command, RemoteCommandSession, SignalBridge, Termination};
use lim_core::config::Settings;
use lim_core::directory::ApiInstanceDirectory;
use lim_core::error::DirectoryError;
use lim_core::exit::EXIT_SUCCESS;
use lim_core::traits::InstanceDirectory;
use lim_core::{InstanceId, RemoteEndpoint};

/// Resolve the instance's endpoint and run `args` on it
///
/// Returns the exit code the process should end with. When the API does not
/// accept the stored key, this runs the browser login instead and reports
/// success once it completes; the command is not retried.
pub async fn exec_command(settings: &Settings, args: Vec<String>) -> Result<i32> {
    let instance_id = settings.instance_id.as_deref().map(InstanceId::from).ok_or_else(|| {
        anyhow!(
            "No instance given. Pass --instance, set LIM_INSTANCE_ID or run 'lim instance set <id>'"
        )
    })?;

    let directory = ApiInstanceDirectory::new(&settings.api_endpoint, settings.api_key.clone())?;
    let endpoint = match directory.lookup(&instance_id).await {
        Ok(endpoint) => endpoint,
        Err(DirectoryError::Unauthenticated) => {
            print_warning("Not logged in, opening the browser to log in");
            login_command(settings).await?;
            return Ok(EXIT_SUCCESS);
        }
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to get instance {}", instance_id))
        }
    };

    run_on_endpoint(&endpoint, settings.close_timeout, args).await
}

/// Run `args` on an already resolved endpoint, streaming to this process's
/// stdout and stderr
async fn run_on_endpoint(
    endpoint: &RemoteEndpoint,
    close_timeout: Duration,
    args: Vec<String>,
) -> Result<i32> {
    let mut session = RemoteCommandSession::connect(endpoint, close_timeout)
        .await
        .context("Failed to connect to instance")?;

    let mut signals = SignalBridge::install().context("Failed to install signal handlers")?;

    let mut stdout = io::stdout();
    let mut stderr = io::stderr();
    let termination = run_command(&mut session, args, &mut stdout, &mut stderr, async move {
        signals.recv().await
    })
    .await?;

    if let Termination::Signalled(signal) = termination {
        tracing::debug!(%signal, "Command interrupted");
    }
    Ok(termination.exit_code())
}
