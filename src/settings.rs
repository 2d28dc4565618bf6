use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, warn};

pub const SETTINGS_FILE: &str = "settings.json";

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

// Accepts both the numeric form (1-5) and the string form ("trace", "debug", etc.)
impl<'de> Deserialize<'de> for LogLevel {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct LogLevelVisitor;

        impl<'de> Visitor<'de> for LogLevelVisitor {
            type Value = LogLevel;

            fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
                formatter.write_str("a string or integer representing log level")
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<LogLevel, E> {
                match value.to_lowercase().as_str() {
                    "trace" => Ok(LogLevel::Trace),
                    "debug" => Ok(LogLevel::Debug),
                    "info" => Ok(LogLevel::Info),
                    "warn" => Ok(LogLevel::Warn),
                    "error" => Ok(LogLevel::Error),
                    _ => Err(E::unknown_variant(
                        value,
                        &["trace", "debug", "info", "warn", "error"],
                    )),
                }
            }

            fn visit_u64<E: de::Error>(self, value: u64) -> Result<LogLevel, E> {
                match value {
                    1 => Ok(LogLevel::Trace),
                    2 => Ok(LogLevel::Debug),
                    3 => Ok(LogLevel::Info),
                    4 => Ok(LogLevel::Warn),
                    5 => Ok(LogLevel::Error),
                    _ => Err(E::invalid_value(de::Unexpected::Unsigned(value), &"1-5")),
                }
            }
        }

        deserializer.deserialize_any(LogLevelVisitor)
    }
}

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => tracing::Level::TRACE,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}

/// Settle delays around the simulated copy and paste. Clipboards populate
/// asynchronously on every platform, so each step waits before reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettleTiming {
    pub after_copy: Duration,
    pub before_paste: Duration,
    pub before_restore: Duration,
}

impl Default for SettleTiming {
    fn default() -> Self {
        Self {
            after_copy: Duration::from_millis(default_capture_settle_ms()),
            before_paste: Duration::from_millis(default_paste_settle_ms()),
            before_restore: Duration::from_millis(default_restore_settle_ms()),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct AppSettings {
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Environment variable checked first for the API key
    #[serde(default = "default_api_key_env_var")]
    pub api_key_env_var: String,
    /// Fallback key used when the environment variable is unset
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_capture_settle_ms")]
    pub capture_settle_ms: u64,
    #[serde(default = "default_paste_settle_ms")]
    pub paste_settle_ms: u64,
    #[serde(default = "default_restore_settle_ms")]
    pub restore_settle_ms: u64,
    #[serde(default = "default_log_level")]
    pub log_level: LogLevel,
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_api_key_env_var() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_capture_settle_ms() -> u64 {
    120
}

fn default_paste_settle_ms() -> u64 {
    80
}

fn default_restore_settle_ms() -> u64 {
    150
}

fn default_log_level() -> LogLevel {
    LogLevel::Debug
}

pub fn get_default_settings() -> AppSettings {
    AppSettings {
        model: default_model(),
        base_url: default_base_url(),
        api_key_env_var: default_api_key_env_var(),
        api_key: None,
        request_timeout_secs: default_request_timeout_secs(),
        capture_settle_ms: default_capture_settle_ms(),
        paste_settle_ms: default_paste_settle_ms(),
        restore_settle_ms: default_restore_settle_ms(),
        log_level: default_log_level(),
    }
}

impl AppSettings {
    pub fn settle_timing(&self) -> SettleTiming {
        SettleTiming {
            after_copy: Duration::from_millis(self.capture_settle_ms),
            before_paste: Duration::from_millis(self.paste_settle_ms),
            before_restore: Duration::from_millis(self.restore_settle_ms),
        }
    }

    /// Upper bound on one rewrite run: the request timeout plus every settle
    /// delay.
    pub fn longest_run(&self) -> Duration {
        let timing = self.settle_timing();
        Duration::from_secs(self.request_timeout_secs)
            + timing.after_copy
            + timing.before_paste
            + timing.before_restore
    }
}

pub fn settings_path(data_dir: &Path) -> PathBuf {
    data_dir.join(SETTINGS_FILE)
}

/// Read settings from the data directory. A missing file is created with
/// defaults; a corrupt one is left alone and defaults are used.
pub fn load_or_create_app_settings(data_dir: &Path) -> AppSettings {
    let path = settings_path(data_dir);
    match fs::read_to_string(&path) {
        Ok(contents) => match serde_json::from_str::<AppSettings>(&contents) {
            Ok(settings) => {
                debug!("Found existing settings: {:?}", settings.redacted());
                settings
            }
            Err(e) => {
                warn!("Failed to parse {}: {}, using defaults", path.display(), e);
                get_default_settings()
            }
        },
        Err(_) => {
            let settings = get_default_settings();
            if let Err(e) = write_settings(data_dir, &settings) {
                warn!("Failed to create {}: {}", path.display(), e);
            }
            settings
        }
    }
}

pub fn write_settings(data_dir: &Path, settings: &AppSettings) -> anyhow::Result<()> {
    fs::create_dir_all(data_dir)?;
    fs::write(settings_path(data_dir), serde_json::to_string_pretty(settings)?)?;
    Ok(())
}

impl AppSettings {
    /// Copy safe to log
    fn redacted(&self) -> AppSettings {
        let mut copy = self.clone();
        if copy.api_key.is_some() {
            copy.api_key = Some("***".to_string());
        }
        copy
    }
}
