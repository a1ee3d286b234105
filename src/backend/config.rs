use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::backend::twitch::localhost_redirect_uri;

pub const CONFIG_ENV: &str = "TWITCHCORD_CONFIG";
const CONFIG_FILE: &str = "config.toml";

#[derive(Debug)]
pub enum ConfigError {
    Io(String),
    Parse(String),
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(msg) => write!(f, "Failed to read config: {}", msg),
            ConfigError::Parse(msg) => write!(f, "Failed to parse config: {}", msg),
            ConfigError::Invalid(msg) => write!(f, "Invalid config: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::Io(err.to_string())
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::Parse(err.to_string())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub discord: DiscordConfig,
    #[serde(default)]
    pub twitch: TwitchConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub followers: FollowerConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct DiscordConfig {
    pub token: String,
    /// Taken from the READY event when not set
    pub application_id: Option<String>,
    pub allowed_channel_id: Option<String>,
    pub ephemeral: bool,
    pub register_commands: bool,
    pub follower_webhook_url: Option<String>,
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            application_id: None,
            allowed_channel_id: None,
            ephemeral: false,
            register_commands: true,
            follower_webhook_url: None,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum AuthMode {
    #[default]
    Redirect,
    DeviceCode,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct TwitchConfig {
    pub client_id: String,
    pub client_secret: String,
    pub broadcaster_id: String,
    pub scopes: Vec<String>,
    pub auth_mode: AuthMode,
    /// Defaults to `http://localhost:<server.port>`
    pub redirect_uri: Option<String>,
    pub device_code_timeout_secs: u64,
    pub open_browser: bool,
}

impl Default for TwitchConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            broadcaster_id: String::new(),
            scopes: default_scopes(),
            auth_mode: AuthMode::default(),
            redirect_uri: None,
            device_code_timeout_secs: 600,
            open_browser: true,
        }
    }
}

fn default_scopes() -> Vec<String> {
    [
        "channel:read:polls",
        "channel:manage:polls",
        "channel:read:predictions",
        "channel:manage:predictions",
        "moderator:read:followers",
    ]
    .iter()
    .map(|scope| scope.to_string())
    .collect()
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    Json,
    #[default]
    Sqlite,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub path: Option<PathBuf>,
}

impl StorageConfig {
    pub fn resolved_path(&self) -> PathBuf {
        match (&self.path, self.backend) {
            (Some(path), _) => path.clone(),
            (None, StorageBackend::Json) => PathBuf::from("data/twitchcord.json"),
            (None, StorageBackend::Sqlite) => PathBuf::from("data/twitchcord.db"),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct FollowerConfig {
    pub enabled: bool,
    pub poll_interval_secs: u64,
}

impl Default for FollowerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            poll_interval_secs: 60,
        }
    }
}

impl FollowerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
        }
    }
}

impl AppConfig {
    fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Secrets in the environment take precedence over the file
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(token) = non_empty("DISCORD_TOKEN") {
            self.discord.token = token;
        }
        if let Some(client_id) = non_empty("TWITCH_CLIENT_ID") {
            self.twitch.client_id = client_id;
        }
        if let Some(client_secret) = non_empty("TWITCH_CLIENT_SECRET") {
            self.twitch.client_secret = client_secret;
        }
        if let Some(broadcaster_id) = non_empty("BROADCASTER_ID") {
            self.twitch.broadcaster_id = broadcaster_id;
        }
        if let Some(channel_id) = non_empty("ALLOWED_CHANNEL_ID") {
            self.discord.allowed_channel_id = Some(channel_id);
        }
        if let Some(url) = non_empty("FOLLOWER_WEBHOOK_URL") {
            self.discord.follower_webhook_url = Some(url);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut missing = Vec::new();
        if self.discord.token.trim().is_empty() {
            missing.push("discord.token (DISCORD_TOKEN)");
        }
        if self.twitch.client_id.trim().is_empty() {
            missing.push("twitch.client_id (TWITCH_CLIENT_ID)");
        }
        if self.twitch.broadcaster_id.trim().is_empty() {
            missing.push("twitch.broadcaster_id (BROADCASTER_ID)");
        }
        if self.twitch.auth_mode == AuthMode::Redirect && self.twitch.client_secret.trim().is_empty()
        {
            missing.push("twitch.client_secret (TWITCH_CLIENT_SECRET)");
        }

        if !missing.is_empty() {
            return Err(ConfigError::Invalid(format!("missing {}", missing.join(", "))));
        }
        Ok(())
    }

    pub fn redirect_uri(&self) -> String {
        self.twitch
            .redirect_uri
            .clone()
            .unwrap_or_else(|| localhost_redirect_uri(self.server.port))
    }
}

/// Location of `config.toml`: `$TWITCHCORD_CONFIG`, else the project root,
/// else the working directory
pub fn config_path() -> PathBuf {
    if let Ok(path) = std::env::var(CONFIG_ENV) {
        return PathBuf::from(path);
    }
    match project_root::get_project_root() {
        Ok(root) => root.join(CONFIG_FILE),
        Err(_) => PathBuf::from(CONFIG_FILE),
    }
}

/// Read the config file (if present), apply environment overrides and
/// check that everything needed at startup is there
pub fn load_config() -> Result<AppConfig, ConfigError> {
    let path = config_path();
    let mut config = if path.exists() {
        log::info!("Loading config from {}", path.display());
        AppConfig::from_file(&path)?
    } else {
        log::warn!(
            "{} not found, using defaults and environment",
            path.display()
        );
        AppConfig::default()
    };

    config.apply_env(|key| std::env::var(key).ok());
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            [discord]
            token = "discord-token"
            allowed_channel_id = "42"

            [twitch]
            client_id = "cid"
            broadcaster_id = "1001"
            auth_mode = "device_code"

            [storage]
            backend = "json"
            "#,
        )
        .unwrap();

        assert!(config.discord.register_commands);
        assert_eq!(config.twitch.auth_mode, AuthMode::DeviceCode);
        assert_eq!(config.twitch.device_code_timeout_secs, 600);
        assert_eq!(config.twitch.scopes.len(), 5);
        assert_eq!(
            config.storage.resolved_path(),
            PathBuf::from("data/twitchcord.json")
        );
        assert_eq!(config.followers.poll_interval(), Duration::from_secs(60));
        assert_eq!(config.redirect_uri(), "http://localhost:3000");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_environment_overrides_file() {
        let mut config = AppConfig::default();
        config.discord.token = "from-file".to_string();

        let env: HashMap<&str, &str> = [
            ("DISCORD_TOKEN", "from-env"),
            ("TWITCH_CLIENT_ID", "cid"),
            ("TWITCH_CLIENT_SECRET", "secret"),
            ("BROADCASTER_ID", "1001"),
            ("FOLLOWER_WEBHOOK_URL", ""),
        ]
        .into_iter()
        .collect();
        config.apply_env(|key| env.get(key).map(|value| value.to_string()));

        assert_eq!(config.discord.token, "from-env");
        assert_eq!(config.twitch.client_secret, "secret");
        assert_eq!(config.discord.follower_webhook_url, None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_lists_missing_settings() {
        let mut config = AppConfig::default();
        config.discord.token = "token".to_string();

        match config.validate() {
            Err(ConfigError::Invalid(msg)) => {
                assert!(msg.contains("twitch.client_id"));
                assert!(msg.contains("twitch.broadcaster_id"));
                assert!(msg.contains("twitch.client_secret"));
                assert!(!msg.contains("discord.token"));
            }
            other => panic!("unexpected result: {:?}", other),
        }

        config.twitch.auth_mode = AuthMode::DeviceCode;
        config.twitch.client_id = "cid".to_string();
        config.twitch.broadcaster_id = "1001".to_string();
        assert!(config.validate().is_ok());
    }
}
