//! On-disk configuration file

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::serde_utils::duration_secs;
use crate::error::ConfigError;

/// Default API endpoint
pub const DEFAULT_API_ENDPOINT: &str = "https://api.limrun.com";

/// Default console endpoint (where the browser login happens)
pub const DEFAULT_CONSOLE_ENDPOINT: &str = "https://console.limrun.com";

/// Default local port for the login callback
pub const DEFAULT_CALLBACK_PORT: u16 = 32412;

/// Keys accepted by [`ConfigFile::get_value`] and [`ConfigFile::set_value`]
pub const CONFIG_KEYS: &[&str] = &[
    "api_key",
    "api_endpoint",
    "console_endpoint",
    "instance_id",
    "callback_port",
    "shutdown_grace",
    "close_timeout",
];

/// Contents of `~/.lim/config.toml`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    /// API key written by `lim login`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Base URL of the API
    pub api_endpoint: String,

    /// Base URL of the web console
    pub console_endpoint: String,

    /// Instance that `lim exec` targets when none is given
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance_id: Option<String>,

    /// Local port the login callback server binds
    pub callback_port: u16,

    /// How long the callback server may take to shut down, in seconds
    #[serde(with = "duration_secs")]
    pub shutdown_grace: Duration,

    /// How long to wait for the close frame to be sent, in seconds
    #[serde(with = "duration_secs")]
    pub close_timeout: Duration,
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            api_key: None,
            api_endpoint: DEFAULT_API_ENDPOINT.to_string(),
            console_endpoint: DEFAULT_CONSOLE_ENDPOINT.to_string(),
            instance_id: None,
            callback_port: DEFAULT_CALLBACK_PORT,
            shutdown_grace: Duration::from_secs(5),
            close_timeout: Duration::from_secs(5),
        }
    }
}

impl ConfigFile {
    /// Read a value by key, rendered as a string (`None` when unset)
    pub fn get_value(&self, key: &str) -> Result<Option<String>, ConfigError> {
        let value = match normalize_key(key).as_str() {
            "api_key" => self.api_key.clone(),
            "api_endpoint" => Some(self.api_endpoint.clone()),
            "console_endpoint" => Some(self.console_endpoint.clone()),
            "instance_id" => self.instance_id.clone(),
            "callback_port" => Some(self.callback_port.to_string()),
            "shutdown_grace" => Some(self.shutdown_grace.as_secs().to_string()),
            "close_timeout" => Some(self.close_timeout.as_secs().to_string()),
            _ => return Err(ConfigError::UnknownKey(key.to_string())),
        };
        Ok(value)
    }

    /// Set a value by key from its string form
    ///
    /// Keys may be written with dashes or underscores. An empty value clears
    /// optional keys.
    pub fn set_value(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let optional = |v: &str| (!v.is_empty()).then(|| v.to_string());

        match normalize_key(key).as_str() {
            "api_key" => self.api_key = optional(value),
            "api_endpoint" => self.api_endpoint = parse_url(key, value)?,
            "console_endpoint" => self.console_endpoint = parse_url(key, value)?,
            "instance_id" => self.instance_id = optional(value),
            "callback_port" => self.callback_port = parse_number(key, value)?,
            "shutdown_grace" => {
                self.shutdown_grace = Duration::from_secs(parse_number(key, value)?)
            }
            "close_timeout" => self.close_timeout = Duration::from_secs(parse_number(key, value)?),
            _ => return Err(ConfigError::UnknownKey(key.to_string())),
        }
        Ok(())
    }
}

fn normalize_key(key: &str) -> String {
    key.trim().replace('-', "_")
}

fn parse_url(key: &str, value: &str) -> Result<String, ConfigError> {
    url::Url::parse(value).map_err(|e| ConfigError::InvalidValue {
        key: key.to_string(),
        reason: e.to_string(),
    })?;
    Ok(value.to_string())
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    value.parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        key: key.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ConfigFile::default();
        assert_eq!(config.api_endpoint, "https://api.limrun.com");
        assert_eq!(config.console_endpoint, "https://console.limrun.com");
        assert_eq!(config.callback_port, 32412);
        assert!(config.api_key.is_none());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let config: ConfigFile = toml::from_str(r#"api_key = "lim_123""#).unwrap();
        assert_eq!(config.api_key.as_deref(), Some("lim_123"));
        assert_eq!(config.callback_port, DEFAULT_CALLBACK_PORT);
        assert_eq!(config.shutdown_grace, Duration::from_secs(5));
    }

    #[test]
    fn test_unset_key_is_not_written() {
        let content = toml::to_string(&ConfigFile::default()).unwrap();
        assert!(!content.contains("api_key"));
        assert!(!content.contains("instance_id"));
    }

    #[test]
    fn test_set_value_accepts_dashed_keys() {
        let mut config = ConfigFile::default();
        config.set_value("instance-id", "ios_abc").unwrap();
        config.set_value("callback_port", "40000").unwrap();
        assert_eq!(config.instance_id.as_deref(), Some("ios_abc"));
        assert_eq!(config.get_value("callback-port").unwrap().as_deref(), Some("40000"));
    }

    #[test]
    fn test_set_empty_clears_optional() {
        let mut config = ConfigFile {
            api_key: Some("lim_x".into()),
            ..Default::default()
        };
        config.set_value("api_key", "").unwrap();
        assert!(config.api_key.is_none());
    }

    #[test]
    fn test_set_value_validates() {
        let mut config = ConfigFile::default();
        assert!(matches!(
            config.set_value("callback_port", "not-a-port"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            config.set_value("api_endpoint", "no scheme"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            config.set_value("colour", "blue"),
            Err(ConfigError::UnknownKey(_))
        ));
    }

    #[test]
    fn test_every_listed_key_is_readable() {
        let config = ConfigFile::default();
        for key in CONFIG_KEYS {
            assert!(config.get_value(key).is_ok(), "key {key} not readable");
        }
    }
}
