use std::collections::HashMap;
use std::env;
use std::ops::RangeInclusive;
use std::path::PathBuf;
use std::time::Duration;

use jotter_core::debounce::SaveDebouncer;
use jotter_core::models::MAX_CONTENT_BYTES;
use jotter_core::util::is_http_url;
use thiserror::Error;

const MAX_BODY_BYTES_CEILING: usize = 64 * 1024 * 1024;
const AUTOSAVE_QUIET_MS: RangeInclusive<u64> = 10..=60_000;
const AUTOSAVE_MAX_WAIT_CEILING_MS: u64 = 600_000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub bind_addr: String,
    pub data_dir: PathBuf,
    /// Request body limit. Larger than the content limit so that form encoding
    /// of a maximum-size note still fits.
    pub max_body_bytes: usize,
    /// Base used to build absolute share URLs, without a trailing slash.
    pub public_base_url: Option<String>,
    /// Autosave waits this long after the last edit before saving.
    pub autosave_quiet: Duration,
    /// Upper bound on how long an edit may stay unsaved.
    pub autosave_max_wait: Duration,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let values: HashMap<String, String> = env::vars().collect();
        Self::from_lookup(|name| values.get(name).cloned())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let bind_addr = value_or_default(&lookup, "JOTTER_BIND_ADDR", "127.0.0.1:8080");
        let data_dir = PathBuf::from(value_or_default(&lookup, "JOTTER_DATA_DIR", "data"));

        let max_body_bytes = value_or_default(&lookup, "JOTTER_MAX_BODY_BYTES", "8388608")
            .parse::<usize>()
            .map_err(|_| {
                ConfigError::Invalid(format!(
                    "JOTTER_MAX_BODY_BYTES must be an integer in [{MAX_CONTENT_BYTES}, {MAX_BODY_BYTES_CEILING}]"
                ))
            })?;
        if !(MAX_CONTENT_BYTES..=MAX_BODY_BYTES_CEILING).contains(&max_body_bytes) {
            return Err(ConfigError::Invalid(format!(
                "JOTTER_MAX_BODY_BYTES must be in [{MAX_CONTENT_BYTES}, {MAX_BODY_BYTES_CEILING}]"
            )));
        }

        let public_base_url = optional_trimmed(&lookup, "JOTTER_PUBLIC_BASE_URL")
            .map(|value| trim_trailing(&value).to_string());
        if let Some(url) = public_base_url.as_deref() {
            if !is_http_url(url) {
                return Err(ConfigError::Invalid(
                    "JOTTER_PUBLIC_BASE_URL must start with http:// or https://".to_string(),
                ));
            }
        }

        let quiet_ms = parse_millis(&lookup, "JOTTER_AUTOSAVE_QUIET_MS", 750, AUTOSAVE_QUIET_MS)?;
        let max_wait_ms = parse_millis(
            &lookup,
            "JOTTER_AUTOSAVE_MAX_WAIT_MS",
            5_000,
            quiet_ms..=AUTOSAVE_MAX_WAIT_CEILING_MS,
        )?;

        Ok(Self {
            bind_addr,
            data_dir,
            max_body_bytes,
            public_base_url,
            autosave_quiet: Duration::from_millis(quiet_ms),
            autosave_max_wait: Duration::from_millis(max_wait_ms),
        })
    }

    /// Save scheduling shared by the editor script and buffered drafts.
    pub const fn debouncer(&self) -> SaveDebouncer {
        SaveDebouncer::new(self.autosave_quiet, self.autosave_max_wait)
    }
}

fn parse_millis(
    lookup: impl Fn(&str) -> Option<String>,
    name: &str,
    default: u64,
    range: RangeInclusive<u64>,
) -> Result<u64, ConfigError> {
    let invalid = || {
        ConfigError::Invalid(format!(
            "{name} must be a number of milliseconds in [{}, {}]",
            range.start(),
            range.end()
        ))
    };
    let value = optional_trimmed(lookup, name)
        .map_or(Ok(default), |value| value.parse::<u64>())
        .map_err(|_| invalid())?;
    if range.contains(&value) {
        Ok(value)
    } else {
        Err(invalid())
    }
}

fn value_or_default(lookup: impl Fn(&str) -> Option<String>, name: &str, default: &str) -> String {
    optional_trimmed(lookup, name).unwrap_or_else(|| default.to_string())
}

fn optional_trimmed(lookup: impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    lookup(name).and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

fn trim_trailing(value: &str) -> &str {
    value.trim_end_matches('/')
}

#[cfg(test)]
pub(crate) fn test_config(data_dir: PathBuf) -> AppConfig {
    AppConfig {
        bind_addr: "127.0.0.1:0".to_string(),
        data_dir,
        max_body_bytes: 8 * 1024 * 1024,
        public_base_url: None,
        autosave_quiet: Duration::from_secs(60),
        autosave_max_wait: Duration::from_secs(60),
    }
}
