//! Opening the authorization page

use lim_core::error::AuthError;

use crate::output::print_info;

/// Something that can show the operator a URL
pub trait BrowserLauncher: Send + Sync {
    /// Open `url`; failure aborts the login
    fn open(&self, url: &str) -> Result<(), AuthError>;
}

/// Opens the system's default browser
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemBrowser;

impl BrowserLauncher for SystemBrowser {
    fn open(&self, url: &str) -> Result<(), AuthError> {
        print_info(&format!("Opening {} to log in", url));
        webbrowser::open(url).map_err(|e| AuthError::Browser(e.to_string()))
    }
}
