//! lim CLI
//!
//! Single binary for all lim operations:
//! - Browser login (`login`, `logout`)
//! - Running commands on a remote instance (`exec`)
//! - Default instance and configuration management

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lim::commands;
use lim::output::{print_error, print_warning};
use lim_core::config::{self, ConfigStore, Overrides, Settings};
use lim_core::error::AuthError;
use lim_core::exit::{EXIT_FAILURE, EXIT_SUCCESS};
use lim_core::traits::CredentialStore;

#[derive(Parser)]
#[command(name = "lim")]
#[command(author, version, about = "Run commands on remote device instances")]
#[command(propagate_version = true)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct GlobalArgs {
    /// Path to configuration file [default: ~/.lim/config.toml]
    #[arg(short, long, global = true, env = "LIM_CONFIG")]
    config: Option<PathBuf>,

    /// API key (overrides the one saved by `lim login`)
    #[arg(long, global = true, env = "LIM_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// API endpoint
    #[arg(long, global = true, env = "LIM_API_ENDPOINT")]
    api_endpoint: Option<String>,

    /// Console endpoint used for browser login
    #[arg(long, global = true, env = "LIM_CONSOLE_ENDPOINT")]
    console_endpoint: Option<String>,

    /// Enable verbose output
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in through the browser and save the API key
    Login,

    /// Remove the saved API key
    Logout,

    /// Run a command on a remote instance and mirror its output
    ///
    /// Everything after the instance option is passed to the instance
    /// untouched, e.g. `lim exec -- simctl list devices`.
    #[command(alias = "simctl")]
    Exec {
        /// Instance to run on (overrides the default instance)
        #[arg(short, long, env = "LIM_INSTANCE_ID")]
        instance: Option<String>,

        /// Command and arguments
        #[arg(
            required = true,
            trailing_var_arg = true,
            allow_hyphen_values = true,
            value_name = "ARGS"
        )]
        args: Vec<String>,
    },

    /// Manage the default instance
    Instance {
        #[command(subcommand)]
        action: InstanceAction,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum InstanceAction {
    /// Set the instance `exec` targets by default
    Set {
        /// Instance ID
        id: String,
    },
    /// Show the default instance
    Get,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show effective configuration
    Show,
    /// Get a value from the config file
    Get {
        /// Config key (e.g., "api_endpoint")
        key: String,
    },
    /// Set a value in the config file
    Set {
        /// Config key (e.g., "instance_id")
        key: String,
        /// Value to set (empty clears optional keys)
        value: String,
    },
    /// Show config file path
    Path,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Setup logging based on verbosity; logs go to stderr so stdout stays
    // reserved for command output
    let log_level = match (cli.global.quiet, cli.global.verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, 2) => "debug",
        (false, _) => "trace",
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| log_level.into()),
        ))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let code = match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            print_error(&format!("{:#}", e));
            exit_code_for(&e)
        }
    };

    std::process::exit(code);
}

async fn run(cli: Cli) -> Result<i32> {
    let instance = match &cli.command {
        Commands::Exec { instance, .. } => instance.clone(),
        _ => None,
    };
    let settings = load_settings(&cli.global, instance)?;
    tracing::debug!(config = %settings.config_path.display(), "Loaded settings");

    match cli.command {
        Commands::Login => commands::login_command(&settings).await?,
        Commands::Logout => commands::logout_command(&settings)?,
        Commands::Exec { args, .. } => return commands::exec_command(&settings, args).await,
        Commands::Instance { action } => match action {
            InstanceAction::Set { id } => commands::instance_set(&settings, &id)?,
            InstanceAction::Get => commands::instance_get(&settings)?,
        },
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config_show(&settings)?,
            ConfigAction::Get { key } => commands::config_get(&settings, &key)?,
            ConfigAction::Set { key, value } => commands::config_set(&settings, &key, &value)?,
            ConfigAction::Path => commands::config_path(&settings)?,
        },
    }

    Ok(EXIT_SUCCESS)
}

/// Resolve settings for this invocation: flags and `LIM_*` variables over
/// the config file over defaults
fn load_settings(global: &GlobalArgs, instance: Option<String>) -> Result<Settings> {
    let config_path = match &global.config {
        Some(path) => path.clone(),
        None => config::default_config_path()?,
    };

    let store = ConfigStore::open(&config_path)?;

    // First run: write the defaults so there is a file to edit
    if !config_path.exists() {
        if let Err(e) = store.persist() {
            print_warning(&format!("Could not create {:?}: {}", config_path, e));
        }
    }

    let overrides = Overrides {
        api_key: global.api_key.clone(),
        api_endpoint: global.api_endpoint.clone(),
        console_endpoint: global.console_endpoint.clone(),
        instance_id: instance,
    };

    Ok(Settings::resolve(config_path, store.file(), overrides))
}

/// An interrupted login ends like an interrupted command
fn exit_code_for(error: &anyhow::Error) -> i32 {
    match error.downcast_ref::<AuthError>() {
        Some(auth) if auth.is_cancelled() => {
            lim::session::TerminationSignal::Interrupt.exit_code()
        }
        _ => EXIT_FAILURE,
    }
}
