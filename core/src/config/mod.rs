use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::SessionError;

/// How the gateway authenticates against the remote SSH server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AuthMethod {
    #[default]
    Password,
    Key,
    Agent,
}

impl std::str::FromStr for AuthMethod {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "password" => Ok(AuthMethod::Password),
            "key" => Ok(AuthMethod::Key),
            "agent" => Ok(AuthMethod::Agent),
            other => Err(SessionError::InvalidConfig(format!(
                "Unknown SSH auth method: {other}"
            ))),
        }
    }
}

/// Connection settings for the remote SFTP host.
///
/// - `port`: defaults to 22.
/// - `connect_timeout_secs`: dial timeout, defaults to one minute.
/// - `operation_timeout_secs`: blocking timeout applied to every SSH call;
///   `0` leaves calls unbounded.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteConfig {
    pub host: String,
    #[serde(default = "default_ssh_port")]
    pub port: u16,
    pub username: String,
    #[serde(default)]
    pub auth_method: AuthMethod,
    pub password: Option<String>,
    pub key_path: Option<String>,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default)]
    pub operation_timeout_secs: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: default_ssh_port(),
            username: String::new(),
            auth_method: AuthMethod::default(),
            password: None,
            key_path: None,
            connect_timeout_secs: default_connect_timeout_secs(),
            operation_timeout_secs: 0,
        }
    }
}

impl RemoteConfig {
    /// `host:port` as handed to the TCP dialer.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        (self.connect_timeout_secs > 0).then(|| Duration::from_secs(self.connect_timeout_secs))
    }

    pub fn operation_timeout(&self) -> Option<Duration> {
        (self.operation_timeout_secs > 0).then(|| Duration::from_secs(self.operation_timeout_secs))
    }

    /// Return a copy with `~` in the key path expanded.
    pub fn expand(mut self) -> Self {
        self.key_path = self.key_path.map(|s| {
            let stripped = s.trim().trim_matches('"').trim_matches('\'');
            shellexpand::tilde(stripped).into_owned()
        });
        self
    }
}

/// Validate the remote config before attempting a connection.
///
/// Checks:
/// - `host` is not empty
/// - `username` is not empty
/// - `port` is not zero
/// - When `auth_method` is `Key`, `key_path` must be present and non-empty
pub fn validate_remote_config(config: &RemoteConfig) -> Result<(), SessionError> {
    if config.host.trim().is_empty() {
        return Err(SessionError::InvalidConfig(
            "SFTP host must not be empty".to_string(),
        ));
    }

    if config.username.trim().is_empty() {
        return Err(SessionError::InvalidConfig(
            "SFTP username must not be empty".to_string(),
        ));
    }

    if config.port == 0 {
        return Err(SessionError::InvalidConfig(
            "SFTP port must not be zero".to_string(),
        ));
    }

    if config.auth_method == AuthMethod::Key
        && config.key_path.as_deref().map_or(true, |p| p.trim().is_empty())
    {
        return Err(SessionError::InvalidConfig(
            "Key authentication requires a key path".to_string(),
        ));
    }

    Ok(())
}

// --- Default value functions ---

fn default_ssh_port() -> u16 {
    22
}

fn default_connect_timeout_secs() -> u64 {
    60
}
