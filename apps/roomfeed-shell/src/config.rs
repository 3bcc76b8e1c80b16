//! Environment-backed runtime configuration for `roomfeed-shell`.

use std::{env, error::Error, fmt};

const DEFAULT_CURRENT_USER: &str = "uid-demo";
const DEFAULT_PAGE_SIZE: usize = 15;
const DEFAULT_BOTTOM_THRESHOLD_PCT: f64 = 30.0;
const DEFAULT_SETTLE_DELAY_MS: u64 = 200;

/// Runtime configuration used by the shell.
#[derive(Debug, Clone, PartialEq)]
pub struct ShellConfig {
    /// User id attributed to likes and admin actions.
    pub current_user: String,
    /// Messages fetched per pagination page.
    pub page_size: usize,
    /// Bottom-proximity threshold for auto-scroll, in percent.
    pub bottom_threshold_pct: f64,
    /// Fallback render-settling delay before scroll corrections.
    pub settle_delay_ms: u64,
}

impl ShellConfig {
    /// Parse configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(mut lookup: F) -> Result<Self, ConfigError>
    where
        F: FnMut(&str) -> Option<String>,
    {
        let current_user = optional_trimmed_env("ROOMFEED_USER", &mut lookup)
            .unwrap_or_else(|| DEFAULT_CURRENT_USER.to_owned());
        let page_size =
            parse_optional_usize("ROOMFEED_PAGE_SIZE", DEFAULT_PAGE_SIZE, &mut lookup)?;
        let bottom_threshold_pct = parse_optional_f64(
            "ROOMFEED_SCROLL_THRESHOLD_PCT",
            DEFAULT_BOTTOM_THRESHOLD_PCT,
            &mut lookup,
        )?;
        let settle_delay_ms =
            parse_optional_u64("ROOMFEED_SETTLE_DELAY_MS", DEFAULT_SETTLE_DELAY_MS, &mut lookup)?;

        if page_size == 0 {
            return Err(ConfigError::InvalidValue {
                key: "ROOMFEED_PAGE_SIZE",
                value: "0".to_owned(),
                reason: "must be at least 1".to_owned(),
            });
        }
        if bottom_threshold_pct <= 0.0 {
            return Err(ConfigError::InvalidValue {
                key: "ROOMFEED_SCROLL_THRESHOLD_PCT",
                value: bottom_threshold_pct.to_string(),
                reason: "must be greater than 0".to_owned(),
            });
        }

        Ok(Self {
            current_user,
            page_size,
            bottom_threshold_pct,
            settle_delay_ms,
        })
    }
}

/// Errors produced while parsing runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// An environment variable could not be parsed.
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidValue { key, value, reason } => {
                write!(f, "invalid {key}='{value}': {reason}")
            }
        }
    }
}

impl Error for ConfigError {}

fn optional_trimmed_env<F>(key: &'static str, lookup: &mut F) -> Option<String>
where
    F: FnMut(&str) -> Option<String>,
{
    lookup(key)
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}

fn parse_optional_usize<F>(
    key: &'static str,
    default: usize,
    lookup: &mut F,
) -> Result<usize, ConfigError>
where
    F: FnMut(&str) -> Option<String>,
{
    let Some(value) = lookup(key) else {
        return Ok(default);
    };
    value
        .parse::<usize>()
        .map_err(|err| ConfigError::InvalidValue {
            key,
            value,
            reason: err.to_string(),
        })
}

fn parse_optional_u64<F>(
    key: &'static str,
    default: u64,
    lookup: &mut F,
) -> Result<u64, ConfigError>
where
    F: FnMut(&str) -> Option<String>,
{
    let Some(value) = lookup(key) else {
        return Ok(default);
    };
    value
        .parse::<u64>()
        .map_err(|err| ConfigError::InvalidValue {
            key,
            value,
            reason: err.to_string(),
        })
}

fn parse_optional_f64<F>(
    key: &'static str,
    default: f64,
    lookup: &mut F,
) -> Result<f64, ConfigError>
where
    F: FnMut(&str) -> Option<String>,
{
    let Some(value) = lookup(key) else {
        return Ok(default);
    };
    value
        .parse::<f64>()
        .map_err(|err| ConfigError::InvalidValue {
            key,
            value,
            reason: err.to_string(),
        })
}
