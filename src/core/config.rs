//! Layered configuration.
//!
//! Sources, lowest priority first:
//! 1. Built-in defaults ([`Config::default`])
//! 2. `fleetbot.toml` in the working directory (or the file given via `--config`)
//! 3. `FLEETBOT_*` environment variables, `__` separating nested keys
//!    (e.g. `FLEETBOT_DISPATCH__WORKERS=8`)
//!
//! The bot token additionally falls back to `TELOXIDE_TOKEN` and `BOT_TOKEN`.

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use secrecy::SecretString;
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// Config file looked up in the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "fleetbot.toml";

/// Prefix of the environment variables merged on top of the config file.
pub const ENV_PREFIX: &str = "FLEETBOT_";

/// Languages with a bundled translation.
pub const SUPPORTED_LANGUAGES: &[&str] = &["ru", "en"];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Figment(#[from] figment::Error),

    #[error("unsupported language '{0}' (expected one of: ru, en)")]
    UnsupportedLanguage(String),

    #[error("dispatch.workers must be at least 1")]
    NoWorkers,

    #[error("history_page_size must be at least 1")]
    EmptyPage,

    #[error("invalid help_url: {0}")]
    InvalidHelpUrl(#[from] url::ParseError),
}

/// Complete bot configuration.
#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Telegram bot token. Never serialized.
    #[serde(deserialize_with = "deserialize_secret", skip_serializing)]
    pub bot_token: Option<SecretString>,
    /// Custom Bot API server (e.g. a local `telegram-bot-api` instance).
    pub api_url: Option<String>,
    /// Language of all bot messages (`ru` or `en`).
    pub language: String,
    /// SQLite database file.
    pub database_path: String,
    /// Optional file mirroring the console log.
    pub log_file: Option<String>,
    /// Telegram user ids registered as admins at startup.
    pub bootstrap_admins: Vec<i64>,
    /// Records per page in the maintenance history.
    pub history_page_size: usize,
    /// Documentation link offered under `/help`.
    pub help_url: Option<String>,
    pub dispatch: DispatchConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bot_token: None,
            api_url: None,
            language: "ru".to_string(),
            database_path: "vehicles.db".to_string(),
            log_file: None,
            bootstrap_admins: Vec::new(),
            history_page_size: 5,
            help_url: None,
            dispatch: DispatchConfig::default(),
        }
    }
}

/// Update loop tuning.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Long-polling timeout passed to `getUpdates` (seconds).
    pub poll_timeout_secs: u64,
    /// Number of lanes updates are partitioned into. 1 means strictly sequential.
    pub workers: usize,
    /// Idle time after which an unfinished flow is dropped (seconds, 0 disables).
    pub flow_idle_timeout_secs: u64,
    /// Delay before polling again after a transport error (seconds).
    pub retry_delay_secs: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            poll_timeout_secs: 30,
            workers: 4,
            flow_idle_timeout_secs: 3600,
            retry_delay_secs: 5,
        }
    }
}

impl DispatchConfig {
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_secs(self.poll_timeout_secs)
    }

    pub fn flow_idle_timeout(&self) -> Option<Duration> {
        (self.flow_idle_timeout_secs > 0).then(|| Duration::from_secs(self.flow_idle_timeout_secs))
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }
}

impl Config {
    /// Loads the configuration from defaults, the config file and the environment.
    ///
    /// A missing config file is not an error; figment simply skips it.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

        let mut config: Config = Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(&path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;

        if config.bot_token.is_none() {
            config.bot_token = env::var("TELOXIDE_TOKEN")
                .or_else(|_| env::var("BOT_TOKEN"))
                .ok()
                .filter(|token| !token.is_empty())
                .map(SecretString::from);
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !SUPPORTED_LANGUAGES.contains(&self.language.as_str()) {
            return Err(ConfigError::UnsupportedLanguage(self.language.clone()));
        }
        if self.dispatch.workers == 0 {
            return Err(ConfigError::NoWorkers);
        }
        if self.history_page_size == 0 {
            return Err(ConfigError::EmptyPage);
        }
        if let Some(help_url) = &self.help_url {
            url::Url::parse(help_url)?;
        }
        Ok(())
    }
}

fn deserialize_secret<'de, D>(deserializer: D) -> Result<Option<SecretString>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.filter(|token| !token.is_empty()).map(SecretString::from))
}
