//! Environment-driven runtime configuration.
//!
//! # Responsibility
//! - Read `FOCUS_*` variables once and expose typed values with defaults.
//!
//! # Invariants
//! - An unknown timezone name falls back to UTC with a warning; it is never
//!   a hard error.
//! - Malformed numeric/time values are rejected with `ConfigError`.

use crate::service::relocation_service::DEFAULT_RELOCATION_HORIZON_DAYS;
use crate::service::reminder_service::DEFAULT_WORRY_TIME;
use chrono::NaiveTime;
use chrono_tz::Tz;
use log::warn;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

pub const ENV_TIMEZONE: &str = "FOCUS_TIMEZONE";
pub const ENV_RELOCATION_HORIZON_DAYS: &str = "FOCUS_RELOCATION_HORIZON_DAYS";
pub const ENV_WORRY_TIME: &str = "FOCUS_WORRY_TIME";
pub const ENV_DB_PATH: &str = "FOCUS_DB_PATH";
pub const ENV_LOG_LEVEL: &str = "FOCUS_LOG_LEVEL";
pub const ENV_LOG_DIR: &str = "FOCUS_LOG_DIR";

const DEFAULT_DB_FILE_NAME: &str = "focus.sqlite3";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidValue { key, value, reason } => {
                write!(f, "invalid value `{value}` for {key}: {reason}")
            }
        }
    }
}

impl Error for ConfigError {}

/// Core runtime settings.
#[derive(Debug, Clone, PartialEq)]
pub struct CoreConfig {
    /// Zone in which "today", local midnight and worry times are computed.
    pub timezone: Tz,
    pub relocation_horizon_days: u32,
    pub default_worry_time: NaiveTime,
    pub db_path: PathBuf,
    pub log_level: String,
    /// File logging is enabled only when set.
    pub log_dir: Option<PathBuf>,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            timezone: Tz::UTC,
            relocation_horizon_days: DEFAULT_RELOCATION_HORIZON_DAYS,
            default_worry_time: DEFAULT_WORRY_TIME,
            db_path: std::env::temp_dir().join(DEFAULT_DB_FILE_NAME),
            log_level: crate::logging::default_log_level().to_string(),
            log_dir: None,
        }
    }
}

impl CoreConfig {
    /// Reads configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads configuration through `lookup`; blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let mut config = Self::default();

        if let Some(name) = read(ENV_TIMEZONE) {
            config.timezone = parse_timezone(&name);
        }
        if let Some(raw) = read(ENV_RELOCATION_HORIZON_DAYS) {
            config.relocation_horizon_days = parse_horizon(&raw)?;
        }
        if let Some(raw) = read(ENV_WORRY_TIME) {
            config.default_worry_time = NaiveTime::parse_from_str(&raw, "%H:%M").map_err(|err| {
                ConfigError::InvalidValue {
                    key: ENV_WORRY_TIME,
                    value: raw.clone(),
                    reason: err.to_string(),
                }
            })?;
        }
        if let Some(path) = read(ENV_DB_PATH) {
            config.db_path = PathBuf::from(path);
        }
        if let Some(level) = read(ENV_LOG_LEVEL) {
            config.log_level = level;
        }
        config.log_dir = read(ENV_LOG_DIR).map(PathBuf::from);

        Ok(config)
    }
}

fn parse_timezone(name: &str) -> Tz {
    match name.parse::<Tz>() {
        Ok(timezone) => timezone,
        Err(_) => {
            warn!(
                "event=config_timezone module=config status=fallback value={} fallback=UTC",
                name
            );
            Tz::UTC
        }
    }
}

fn parse_horizon(raw: &str) -> Result<u32, ConfigError> {
    let invalid = |reason: &str| ConfigError::InvalidValue {
        key: ENV_RELOCATION_HORIZON_DAYS,
        value: raw.to_string(),
        reason: reason.to_string(),
    };
    match raw.parse::<u32>() {
        Ok(0) => Err(invalid("must be greater than zero")),
        Ok(days) => Ok(days),
        Err(_) => Err(invalid("expected a positive integer")),
    }
}
