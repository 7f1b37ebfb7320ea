//! File-backed credential store

use std::path::{Path, PathBuf};

use super::{load_config, save_config, ConfigFile};
use crate::error::ConfigError;
use crate::traits::CredentialStore;

/// The config file, loaded for editing and written back on `persist`
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
    file: ConfigFile,
}

impl ConfigStore {
    /// Load the file at `path`, starting from defaults when it does not exist
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let file = load_config(&path)?.unwrap_or_default();
        Ok(Self { path, file })
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current contents
    pub fn file(&self) -> &ConfigFile {
        &self.file
    }

    /// Mutable access for edits that are persisted afterwards
    pub fn file_mut(&mut self) -> &mut ConfigFile {
        &mut self.file
    }
}

impl CredentialStore for ConfigStore {
    fn credential(&self) -> Option<&str> {
        self.file.api_key.as_deref()
    }

    fn set_credential(&mut self, credential: Option<String>) {
        self.file.api_key = credential;
    }

    fn persist(&self) -> Result<(), ConfigError> {
        save_config(&self.path, &self.file)
    }
}
