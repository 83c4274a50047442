//! Session configuration.
//!
//! `SessionConfig` carries the timing knobs of a draft session. It can be
//! built in code (`SessionConfig::default()`) or parsed from a JSON file with
//! durations expressed in milliseconds.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Error, Result};

const CONFIG_SCHEMA_VERSION: u32 = 1;

const MIN_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_REQUEST_TIMEOUT: Duration = Duration::from_secs(20);
const MAX_RETRIES_LIMIT: u32 = 10;
const MAX_UNDO_CAPACITY: usize = 100;

/// Bounded retry with exponential backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    pub base_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_backoff: Duration::from_millis(100),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry` (1-based): 100, 200, 400 ms by default.
    pub fn backoff(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(16);
        self.base_backoff.saturating_mul(1 << exponent)
    }

    pub const fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// Cache entries older than this are stale
    pub cache_ttl: Duration,
    /// Deadline for a single store call
    pub request_timeout: Duration,
    pub retry: RetryPolicy,
    /// Period of the background reconciliation timer
    pub sync_interval: Duration,
    /// Undo entries kept before the oldest is dropped
    pub undo_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(5 * 60),
            request_timeout: Duration::from_secs(15),
            retry: RetryPolicy::default(),
            sync_interval: Duration::from_secs(60),
            undo_capacity: 10,
        }
    }
}

impl SessionConfig {
    pub fn validate(&self) -> Result<()> {
        if self.cache_ttl.is_zero() {
            return Err(invalid("cache_ttl must be positive"));
        }
        if !(MIN_REQUEST_TIMEOUT..=MAX_REQUEST_TIMEOUT).contains(&self.request_timeout) {
            return Err(invalid(format!(
                "request_timeout must be between {}s and {}s",
                MIN_REQUEST_TIMEOUT.as_secs(),
                MAX_REQUEST_TIMEOUT.as_secs()
            )));
        }
        if self.retry.max_retries > MAX_RETRIES_LIMIT {
            return Err(invalid(format!(
                "max_retries must be at most {MAX_RETRIES_LIMIT}"
            )));
        }
        if self.sync_interval.is_zero() {
            return Err(invalid("sync_interval must be positive"));
        }
        if !(1..=MAX_UNDO_CAPACITY).contains(&self.undo_capacity) {
            return Err(invalid(format!(
                "undo_capacity must be between 1 and {MAX_UNDO_CAPACITY}"
            )));
        }
        Ok(())
    }

    /// Read and validate a JSON config file.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        parse_session_config(&raw).map_err(|error| match error {
            Error::Validation(message) => invalid(format!("{}: {message}", path.display())),
            other => other,
        })
    }
}

/// Parse a session config from a raw JSON payload.
///
/// Keys left out of the payload keep their defaults.
pub fn parse_session_config(payload: &str) -> Result<SessionConfig> {
    let file: SessionConfigFile = serde_json::from_str(payload)
        .map_err(|error| invalid(format!("invalid session config JSON: {error}")))?;
    file.into_config()
}

// ---------------------------------------------------------------------------
// Private
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
struct SessionConfigFile {
    schema_version: u32,
    #[serde(default)]
    cache_ttl_ms: Option<u64>,
    #[serde(default)]
    request_timeout_ms: Option<u64>,
    #[serde(default)]
    sync_interval_ms: Option<u64>,
    #[serde(default)]
    undo_capacity: Option<usize>,
    #[serde(default)]
    retry: Option<RetryFile>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
struct RetryFile {
    #[serde(default)]
    max_retries: Option<u32>,
    #[serde(default)]
    base_backoff_ms: Option<u64>,
}

impl SessionConfigFile {
    fn into_config(self) -> Result<SessionConfig> {
        if self.schema_version != CONFIG_SCHEMA_VERSION {
            return Err(invalid(format!(
                "unsupported session config schema_version {} (expected {})",
                self.schema_version, CONFIG_SCHEMA_VERSION
            )));
        }

        let defaults = SessionConfig::default();
        let retry = self.retry.map_or(defaults.retry, |retry| RetryPolicy {
            max_retries: retry.max_retries.unwrap_or(defaults.retry.max_retries),
            base_backoff: retry
                .base_backoff_ms
                .map_or(defaults.retry.base_backoff, Duration::from_millis),
        });

        let config = SessionConfig {
            cache_ttl: self
                .cache_ttl_ms
                .map_or(defaults.cache_ttl, Duration::from_millis),
            request_timeout: self
                .request_timeout_ms
                .map_or(defaults.request_timeout, Duration::from_millis),
            retry,
            sync_interval: self
                .sync_interval_ms
                .map_or(defaults.sync_interval, Duration::from_millis),
            undo_capacity: self.undo_capacity.unwrap_or(defaults.undo_capacity),
        };
        config.validate()?;
        Ok(config)
    }
}

fn invalid(message: impl Into<String>) -> Error {
    Error::Validation(message.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = SessionConfig::default();
        config.validate().unwrap();
        assert_eq!(config.retry.max_attempts(), 4);
    }

    #[test]
    fn backoff_doubles() {
        let retry = RetryPolicy::default();
        assert_eq!(retry.backoff(1), Duration::from_millis(100));
        assert_eq!(retry.backoff(2), Duration::from_millis(200));
        assert_eq!(retry.backoff(3), Duration::from_millis(400));
    }

    #[test]
    fn parse_overrides_only_given_keys() {
        let payload = r#"
        {
          "schema_version": 1,
          "cache_ttl_ms": 60000,
          "retry": { "max_retries": 5 }
        }
        "#;
        let config = parse_session_config(payload).unwrap();
        assert_eq!(config.cache_ttl, Duration::from_secs(60));
        assert_eq!(config.retry.max_retries, 5);
        assert_eq!(config.retry.base_backoff, Duration::from_millis(100));
        assert_eq!(config.request_timeout, Duration::from_secs(15));
    }

    #[test]
    fn parse_rejects_unknown_fields() {
        let payload = r#"{ "schema_version": 1, "ttl": 5 }"#;
        let error = parse_session_config(payload).unwrap_err();
        assert!(error.to_string().contains("unknown field"));
    }

    #[test]
    fn parse_rejects_invalid_schema_version() {
        let error = parse_session_config(r#"{ "schema_version": 9 }"#).unwrap_err();
        assert!(error.to_string().contains("schema_version"));
    }

    #[test]
    fn request_timeout_is_bounded() {
        let payload = r#"{ "schema_version": 1, "request_timeout_ms": 5000 }"#;
        let error = parse_session_config(payload).unwrap_err();
        assert!(error.to_string().contains("request_timeout"));

        let payload = r#"{ "schema_version": 1, "request_timeout_ms": 20000 }"#;
        assert_eq!(
            parse_session_config(payload).unwrap().request_timeout,
            Duration::from_secs(20)
        );
    }

    #[test]
    fn undo_capacity_is_bounded() {
        let config = SessionConfig {
            undo_capacity: 0,
            ..SessionConfig::default()
        };
        assert!(matches!(config.validate(), Err(Error::Validation(_))));
    }

    #[test]
    fn load_from_path_reports_location() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("redraft.json");
        std::fs::write(&path, r#"{ "schema_version": 2 }"#).unwrap();

        let error = SessionConfig::load_from_path(&path).unwrap_err();
        assert!(error.to_string().contains("redraft.json"));
    }
}
