use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use thiserror::Error;

/// Errors raised while assembling the configuration
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database credentials not set. Required: {}", .0.join(", "))]
    MissingCredentials(Vec<&'static str>),
}

/// Application configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub database: DatabaseSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    /// Full DSN; when set, the discrete credential fields are not required
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default = "default_statement_timeout_ms")]
    pub statement_timeout_ms: u64,
    #[serde(default = "default_acquire_timeout_secs")]
    pub acquire_timeout_secs: u64,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url: None,
            host: None,
            port: default_port(),
            name: None,
            user: None,
            password: None,
            statement_timeout_ms: default_statement_timeout_ms(),
            acquire_timeout_secs: default_acquire_timeout_secs(),
        }
    }
}

impl DatabaseSettings {
    /// Names of the environment variables that still need a value
    pub fn missing_credentials(&self) -> Vec<&'static str> {
        if self.url.as_deref().is_some_and(|u| !u.is_empty()) {
            return Vec::new();
        }

        [
            ("DB_HOST", &self.host),
            ("DB_NAME", &self.name),
            ("DB_USER", &self.user),
            ("DB_PASSWORD", &self.password),
        ]
        .into_iter()
        .filter(|(_, value)| value.as_deref().map_or(true, str::is_empty))
        .map(|(name, _)| name)
        .collect()
    }

    pub fn require_credentials(&self) -> Result<(), SettingsError> {
        let missing = self.missing_credentials();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(SettingsError::MissingCredentials(missing))
        }
    }
}

fn default_port() -> u16 { 5432 }
fn default_statement_timeout_ms() -> u64 { 2000 }
fn default_acquire_timeout_secs() -> u64 { 5 }

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String { "info".to_string() }
fn default_log_format() -> String { "compact".to_string() }

/// Flat variables understood for compatibility with existing deployments,
/// mapped onto their nested keys
const LEGACY_DATABASE_VARS: &[(&str, &str)] = &[
    ("DATABASE_URL", "database.url"),
    ("DB_HOST", "database.host"),
    ("DB_PORT", "database.port"),
    ("DB_NAME", "database.name"),
    ("DB_USER", "database.user"),
    ("DB_PASSWORD", "database.password"),
];

impl Settings {
    /// Load configuration from files and environment variables
    ///
    /// Later sources override earlier ones:
    /// 1. Default values in the structs
    /// 2. `config/default.toml`, then `config/local.toml`
    /// 3. Environment variables prefixed with `TABLETOP`
    ///    (e.g. `TABLETOP__LOGGING__LEVEL` -> logging.level)
    /// 4. `DB_HOST`, `DB_PORT`, `DB_NAME`, `DB_USER`, `DB_PASSWORD`, `DATABASE_URL`
    pub fn load() -> Result<Self, SettingsError> {
        let settings = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(
                Environment::with_prefix("TABLETOP")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let settings = apply_legacy_env(settings, |key| std::env::var(key).ok())?;

        Ok(settings.try_deserialize()?)
    }
}

/// Override nested keys with the flat legacy variables that are set
fn apply_legacy_env<F>(settings: Config, lookup: F) -> Result<Config, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut builder = Config::builder().add_source(settings);

    for (var, key) in LEGACY_DATABASE_VARS {
        if let Some(value) = lookup(var).filter(|v| !v.is_empty()) {
            builder = builder.set_override(*key, value)?;
        }
    }

    builder.build()
}
