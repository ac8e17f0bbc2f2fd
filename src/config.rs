//! Configuration loading for HabitCoach.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::Error;
pub type Result<T> = std::result::Result<T, Error>;

/// Get the HabitCoach home directory (~/.habitcoach).
pub fn get_home_dir() -> Result<PathBuf> {
    let home = directories::UserDirs::new()
        .ok_or_else(|| Error::Config("Could not determine home directory".to_string()))?;

    Ok(home.home_dir().join(".habitcoach"))
}

/// Get the settings file path.
pub fn get_settings_path() -> Result<PathBuf> {
    Ok(get_home_dir()?.join("settings.json"))
}

/// Load settings from ~/.habitcoach/settings.json
pub fn load_settings() -> Result<Settings> {
    let path = get_settings_path()?;

    if !path.exists() {
        return Err(Error::Config(format!(
            "Settings file not found at {}",
            path.display()
        )));
    }

    let content = std::fs::read_to_string(&path)?;
    let mut settings: Settings = serde_json::from_str(&content)?;
    apply_env_overrides(&mut settings);
    validate_settings(&settings)?;

    tracing::debug!("Loaded settings from {}", path.display());
    Ok(settings)
}

/// Load settings or return default if not found.
pub fn load_settings_or_default() -> Settings {
    load_settings().unwrap_or_else(|e| {
        tracing::warn!("Failed to load settings: {}, using defaults", e);
        let mut settings = Settings::default();
        apply_env_overrides(&mut settings);
        settings
    })
}

fn apply_env_overrides(settings: &mut Settings) {
    if settings.ai.api_key.is_none() {
        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            if !key.trim().is_empty() {
                settings.ai.api_key = Some(key);
            }
        }
    }
}

pub fn validate_settings(settings: &Settings) -> Result<()> {
    if settings
        .scheduler
        .default_timezone
        .parse::<chrono_tz::Tz>()
        .is_err()
    {
        return Err(Error::Config(format!(
            "scheduler.default_timezone '{}' is not a valid IANA zone",
            settings.scheduler.default_timezone
        )));
    }
    if crate::scheduler::parse_checkin_time(&settings.scheduler.default_checkin_time).is_none() {
        return Err(Error::Config(format!(
            "scheduler.default_checkin_time '{}' must be HH:MM",
            settings.scheduler.default_checkin_time
        )));
    }
    if settings.scheduler.tick_seconds == 0 {
        return Err(Error::Config("scheduler.tick_seconds must be > 0".to_string()));
    }
    if settings.outbox.capacity == 0 {
        return Err(Error::Config("outbox.capacity must be > 0".to_string()));
    }
    if let Err(e) = tracing_subscriber::EnvFilter::try_new(&settings.logging.level) {
        return Err(Error::Config(format!(
            "logging.level '{}' is not a valid filter: {}",
            settings.logging.level, e
        )));
    }
    Ok(())
}

/// HTTP server configuration.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Server {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

impl Default for Server {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            allowed_origins: Vec::new(),
        }
    }
}

/// Proactive check-in scheduler configuration.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Scheduler {
    #[serde(default = "default_tick_seconds")]
    pub tick_seconds: u64,
    #[serde(default = "default_timezone")]
    pub default_timezone: String,
    #[serde(default = "default_checkin_time")]
    pub default_checkin_time: String,
}

fn default_tick_seconds() -> u64 {
    5
}

fn default_timezone() -> String {
    "America/Los_Angeles".to_string()
}

fn default_checkin_time() -> String {
    "09:00".to_string()
}

impl Default for Scheduler {
    fn default() -> Self {
        Self {
            tick_seconds: default_tick_seconds(),
            default_timezone: default_timezone(),
            default_checkin_time: default_checkin_time(),
        }
    }
}

/// Outbound message queue configuration.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Outbox {
    #[serde(default = "default_outbox_capacity")]
    pub capacity: usize,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_long_poll_seconds")]
    pub long_poll_seconds: u64,
}

fn default_outbox_capacity() -> usize {
    100
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_long_poll_seconds() -> u64 {
    25
}

impl Default for Outbox {
    fn default() -> Self {
        Self {
            capacity: default_outbox_capacity(),
            poll_interval_ms: default_poll_interval_ms(),
            long_poll_seconds: default_long_poll_seconds(),
        }
    }
}

/// Log output configuration. `RUST_LOG` takes precedence over `level`.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Logging {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Directory for the rolling log file. Defaults to the platform data dir.
    pub dir: Option<PathBuf>,
    #[serde(default = "default_log_file")]
    pub file_name: String,
}

fn default_log_level() -> String {
    "info,habitcoach=debug".to_string()
}

fn default_log_file() -> String {
    "habitcoach.log".to_string()
}

impl Default for Logging {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            dir: None,
            file_name: default_log_file(),
        }
    }
}

/// Storage configuration.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct Storage {
    /// Database path. Defaults to ~/.habitcoach/habitcoach.db
    pub path: Option<PathBuf>,
}

/// Conversational AI provider configuration.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Ai {
    #[serde(default = "default_ai_provider")]
    pub provider: String,
    pub model: Option<String>,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    #[serde(default = "default_ai_timeout")]
    pub timeout_seconds: u64,
}

fn default_ai_provider() -> String {
    "openai".to_string()
}

fn default_ai_timeout() -> u64 {
    60
}

impl Default for Ai {
    fn default() -> Self {
        Self {
            provider: default_ai_provider(),
            model: None,
            api_key: None,
            base_url: None,
            timeout_seconds: default_ai_timeout(),
        }
    }
}

/// HabitCoach settings.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct Settings {
    #[serde(default)]
    pub server: Server,

    #[serde(default)]
    pub scheduler: Scheduler,

    #[serde(default)]
    pub outbox: Outbox,

    #[serde(default)]
    pub storage: Storage,

    #[serde(default)]
    pub ai: Ai,

    #[serde(default)]
    pub logging: Logging,
}

impl Settings {
    /// Resolve the database path, falling back to the home directory.
    pub fn database_path(&self) -> Result<PathBuf> {
        match &self.storage.path {
            Some(path) => Ok(path.clone()),
            None => Ok(get_home_dir()?.join("habitcoach.db")),
        }
    }
}
