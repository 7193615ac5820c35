use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct WebConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub web: WebConfig,
    // Populated from the .env file
    pub database_path: String,
    pub media_path: String,
    pub allowed_origins: String,
    pub log_level: String,
    pub session_secret_key: String,
    pub use_secure_cookies: bool,
    pub session_ttl_hours: i64,
    pub remember_me_ttl_days: i64,
}

fn required_var(name: &str) -> Result<String, config::ConfigError> {
    env::var(name).map_err(|_| {
        config::ConfigError::Message(format!(
            "FATAL: Environment variable '{}' is not set in your .env file.",
            name
        ))
    })
}

fn require_absolute(name: &str, value: &str) -> Result<(), config::ConfigError> {
    if Path::new(value).is_relative() {
        return Err(config::ConfigError::Message(format!(
            "FATAL: The '{}' in your .env file is a relative path ('{}'). It MUST be an absolute path.",
            name, value
        )));
    }
    Ok(())
}

/// Parses an optional positive integer, falling back to `default`.
fn positive_var(name: &str, default: i64) -> Result<i64, config::ConfigError> {
    match env::var(name) {
        Err(_) => Ok(default),
        Ok(raw) => match raw.trim().parse::<i64>() {
            Ok(value) if value > 0 => Ok(value),
            _ => Err(config::ConfigError::Message(format!(
                "FATAL: '{}' must be a positive whole number, got '{}'.",
                name, raw
            ))),
        },
    }
}

impl Config {
    pub fn from_env(env_path: &Path) -> Result<Self, config::ConfigError> {
        dotenvy::from_path(env_path).map_err(|e| {
            config::ConfigError::Message(format!(
                "FATAL: Failed to load .env file from '{}'. Error: {}",
                env_path.display(),
                e
            ))
        })?;

        let database_path = required_var("DATABASE_PATH")?;
        let media_path = required_var("MEDIA_PATH")?;
        require_absolute("DATABASE_PATH", &database_path)?;
        require_absolute("MEDIA_PATH", &media_path)?;

        // 128 hex characters decode to the 64-byte cookie signing key.
        let session_secret_key = required_var("SESSION_SECRET_KEY")?;
        if session_secret_key.len() != 128 || !session_secret_key.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(config::ConfigError::Message(
                "FATAL: 'SESSION_SECRET_KEY' must be 128 hexadecimal characters long (64 bytes).".to_string(),
            ));
        }

        let allowed_origins = env::var("ALLOWED_ORIGINS").unwrap_or_default();
        let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        let use_secure_cookies = env::var("USE_SECURE_COOKIES")
            .unwrap_or_else(|_| "false".to_string())
            .parse::<bool>()
            .unwrap_or(false);
        let session_ttl_hours = positive_var("SESSION_TTL_HOURS", 24)?;
        let remember_me_ttl_days = positive_var("REMEMBER_ME_TTL_DAYS", 30)?;

        config::Config::builder()
            .add_source(config::File::new("config/default.toml", config::FileFormat::Toml))
            .set_override("database_path", database_path)?
            .set_override("media_path", media_path)?
            .set_override("session_secret_key", session_secret_key)?
            .set_override("allowed_origins", allowed_origins)?
            .set_override("log_level", log_level)?
            .set_override("use_secure_cookies", use_secure_cookies)?
            .set_override("session_ttl_hours", session_ttl_hours)?
            .set_override("remember_me_ttl_days", remember_me_ttl_days)?
            .build()?
            .try_deserialize()
    }

    /// The SQLite file holding every table.
    pub fn db_path(&self) -> PathBuf {
        PathBuf::from(&self.database_path).join("blogcms").join("blogcms.db")
    }

    pub fn media_root(&self) -> PathBuf {
        PathBuf::from(&self.media_path)
    }

    /// How long a login lasts, longer when the user asked to be remembered.
    pub fn session_ttl(&self, remember: bool) -> chrono::Duration {
        if remember {
            chrono::Duration::days(self.remember_me_ttl_days)
        } else {
            chrono::Duration::hours(self.session_ttl_hours)
        }
    }
}
