//! Runtime configuration.
//!
//! # Responsibility
//! - Resolve database and logging settings from the process environment.
//! - Carry write-retry tuning for the task list manager.
//!
//! # Invariants
//! - Blank environment values are treated as unset.
//! - `RetryPolicy::max_attempts` is always at least 1.

use crate::logging::default_log_level;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::time::Duration;

pub const DB_PATH_ENV: &str = "TASKLIST_DB_PATH";
pub const LOG_LEVEL_ENV: &str = "TASKLIST_LOG_LEVEL";
pub const LOG_DIR_ENV: &str = "TASKLIST_LOG_DIR";
pub const WRITE_ATTEMPTS_ENV: &str = "TASKLIST_WRITE_ATTEMPTS";

const DEFAULT_DB_FILE_NAME: &str = "tasklist.sqlite3";
const DEFAULT_INITIAL_BACKOFF: Duration = Duration::from_millis(50);
const MAX_WRITE_ATTEMPTS: u32 = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    InvalidValue { name: &'static str, value: String },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidValue { name, value } => {
                write!(f, "invalid value `{value}` for {name}")
            }
        }
    }
}

impl Error for ConfigError {}

/// Retry tuning for persistence writes.
///
/// The delay doubles after every failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
}

impl RetryPolicy {
    /// Single attempt; failures are reported and never retried.
    pub const fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff: DEFAULT_INITIAL_BACKOFF,
        }
    }

    pub fn with_attempts(max_attempts: u32, initial_backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.clamp(1, MAX_WRITE_ATTEMPTS),
            initial_backoff,
        }
    }

    /// Delay before attempt number `attempt` (1-based; the first attempt
    /// has no delay).
    pub fn backoff_before(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::ZERO;
        }
        let exponent = (attempt - 2).min(16);
        self.initial_backoff.saturating_mul(1 << exponent)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::no_retry()
    }
}

/// Settings for `TaskListManager`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ManagerConfig {
    pub write_retry: RetryPolicy,
}

/// Process-level settings resolved from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreConfig {
    pub db_path: PathBuf,
    pub log_level: String,
    /// Logging stays disabled when unset.
    pub log_dir: Option<PathBuf>,
    pub manager: ManagerConfig,
}

impl CoreConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Resolves settings through `lookup`, which maps a variable name to its
    /// raw value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let read = |name: &str| {
            lookup(name)
                .map(|raw| raw.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let db_path = read(DB_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| std::env::temp_dir().join(DEFAULT_DB_FILE_NAME));
        let log_level = read(LOG_LEVEL_ENV).unwrap_or_else(|| default_log_level().to_string());
        let log_dir = read(LOG_DIR_ENV).map(PathBuf::from);

        let write_retry = match read(WRITE_ATTEMPTS_ENV) {
            Some(raw) => {
                let attempts = raw
                    .parse::<u32>()
                    .ok()
                    .filter(|value| *value >= 1)
                    .ok_or(ConfigError::InvalidValue {
                        name: WRITE_ATTEMPTS_ENV,
                        value: raw,
                    })?;
                RetryPolicy::with_attempts(attempts, DEFAULT_INITIAL_BACKOFF)
            }
            None => RetryPolicy::default(),
        };

        Ok(Self {
            db_path,
            log_level,
            log_dir,
            manager: ManagerConfig { write_retry },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{
        ConfigError, CoreConfig, RetryPolicy, DB_PATH_ENV, LOG_DIR_ENV, WRITE_ATTEMPTS_ENV,
    };
    use std::collections::HashMap;
    use std::path::PathBuf;
    use std::time::Duration;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn defaults_apply_when_environment_is_empty() {
        let config = CoreConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(
            config.db_path,
            std::env::temp_dir().join("tasklist.sqlite3")
        );
        assert!(config.log_dir.is_none());
        assert_eq!(config.manager.write_retry, RetryPolicy::no_retry());
    }

    #[test]
    fn blank_values_are_treated_as_unset() {
        let config = CoreConfig::from_lookup(lookup(&[(DB_PATH_ENV, "  "), (LOG_DIR_ENV, "")]))
            .unwrap();
        assert!(config.db_path.ends_with("tasklist.sqlite3"));
        assert!(config.log_dir.is_none());
    }

    #[test]
    fn explicit_values_override_defaults() {
        let config = CoreConfig::from_lookup(lookup(&[
            (DB_PATH_ENV, "/data/tasks.db"),
            (LOG_DIR_ENV, "/data/logs"),
            (WRITE_ATTEMPTS_ENV, "3"),
        ]))
        .unwrap();
        assert_eq!(config.db_path, PathBuf::from("/data/tasks.db"));
        assert_eq!(config.log_dir, Some(PathBuf::from("/data/logs")));
        assert_eq!(config.manager.write_retry.max_attempts, 3);
    }

    #[test]
    fn zero_or_garbage_attempts_are_rejected() {
        for raw in ["0", "many"] {
            let err = CoreConfig::from_lookup(lookup(&[(WRITE_ATTEMPTS_ENV, raw)])).unwrap_err();
            assert_eq!(
                err,
                ConfigError::InvalidValue {
                    name: WRITE_ATTEMPTS_ENV,
                    value: raw.to_string()
                }
            );
        }
    }

    #[test]
    fn backoff_doubles_after_first_retry() {
        let policy = RetryPolicy::with_attempts(4, Duration::from_millis(10));
        assert_eq!(policy.backoff_before(1), Duration::ZERO);
        assert_eq!(policy.backoff_before(2), Duration::from_millis(10));
        assert_eq!(policy.backoff_before(3), Duration::from_millis(20));
        assert_eq!(policy.backoff_before(4), Duration::from_millis(40));
    }
}
