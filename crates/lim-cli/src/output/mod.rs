//! Output formatting utilities for the CLI
//!
//! Status messages go through the colored `print_*` helpers. Remote command
//! output never does: it is written to stdout/stderr byte for byte by the
//! session.

use tabled::{settings::Style, Table, Tabled};

use lim_core::config::Settings;

/// Format the effective settings as a table, with the API key masked
pub fn format_settings(settings: &Settings) -> String {
    #[derive(Tabled)]
    struct SettingRow {
        #[tabled(rename = "KEY")]
        key: &'static str,
        #[tabled(rename = "VALUE")]
        value: String,
    }

    let unset = || "-".to_string();
    let rows = vec![
        SettingRow {
            key: "api_key",
            value: settings
                .api_key
                .as_deref()
                .map(mask_secret)
                .unwrap_or_else(unset),
        },
        SettingRow {
            key: "api_endpoint",
            value: settings.api_endpoint.clone(),
        },
        SettingRow {
            key: "console_endpoint",
            value: settings.console_endpoint.clone(),
        },
        SettingRow {
            key: "instance_id",
            value: settings.instance_id.clone().unwrap_or_else(unset),
        },
        SettingRow {
            key: "callback_port",
            value: settings.callback_port.to_string(),
        },
        SettingRow {
            key: "shutdown_grace",
            value: format!("{}s", settings.shutdown_grace.as_secs()),
        },
        SettingRow {
            key: "close_timeout",
            value: format!("{}s", settings.close_timeout.as_secs()),
        },
    ];

    Table::new(rows).with(Style::rounded()).to_string()
}

/// Keep the first few characters of a secret and hide the rest
pub fn mask_secret(secret: &str) -> String {
    const VISIBLE: usize = 4;

    let visible: String = secret.chars().take(VISIBLE).collect();
    if secret.chars().count() <= VISIBLE * 2 {
        "****".to_string()
    } else {
        format!("{}****", visible)
    }
}

/// Print a success message in green with a checkmark prefix
///
/// Outputs to stdout with green coloring for positive feedback to the user.
pub fn print_success(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stdout = std::io::stdout();
    let _ = crossterm::execute!(
        stdout,
        SetForegroundColor(Color::Green),
        Print("✓ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print an error message in red with an X prefix
///
/// Outputs to stderr with red coloring for error feedback to the user.
pub fn print_error(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stderr = std::io::stderr();
    let _ = crossterm::execute!(
        stderr,
        SetForegroundColor(Color::Red),
        Print("✗ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print a warning message in yellow to stderr
pub fn print_warning(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stderr = std::io::stderr();
    let _ = crossterm::execute!(
        stderr,
        SetForegroundColor(Color::Yellow),
        Print("⚠ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print an informational message in cyan to stderr
///
/// Goes to stderr so that it never mixes with command output on stdout.
pub fn print_info(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stderr = std::io::stderr();
    let _ = crossterm::execute!(
        stderr,
        SetForegroundColor(Color::Cyan),
        Print("ℹ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}
