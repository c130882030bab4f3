//! Environment-driven configuration for the infrastructure layer.

use std::time::Duration;

use thiserror::Error;

pub const DATABASE_URL: &str = "GROWLEDGER_DATABASE_URL";
/// Fallback when [`DATABASE_URL`] is unset.
pub const LEGACY_DATABASE_URL: &str = "DATABASE_URL";
pub const DB_MAX_CONNECTIONS: &str = "GROWLEDGER_DB_MAX_CONNECTIONS";
pub const DB_ACQUIRE_TIMEOUT_MS: &str = "GROWLEDGER_DB_ACQUIRE_TIMEOUT_MS";
pub const COMMIT_RETRIES: &str = "GROWLEDGER_COMMIT_RETRIES";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value '{value}' for {key}")]
    Invalid { key: &'static str, value: String },

    #[error("{0} must be set")]
    Missing(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InfraConfig {
    /// Absent when running purely in memory.
    pub database_url: Option<String>,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
    /// Attempts at the optimistic read/compute/commit cycle before giving up.
    pub commit_retries: u32,
}

impl Default for InfraConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            max_connections: 10,
            acquire_timeout: Duration::from_millis(5_000),
            commit_retries: 5,
        }
    }
}

impl InfraConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (tests pass a closure over a map).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let database_url = lookup(DATABASE_URL)
            .or_else(|| lookup(LEGACY_DATABASE_URL))
            .filter(|url| !url.trim().is_empty());

        let max_connections = parse_or(&lookup, DB_MAX_CONNECTIONS, defaults.max_connections)?;
        if max_connections == 0 {
            return Err(invalid(DB_MAX_CONNECTIONS, "0"));
        }

        let acquire_timeout_ms = parse_or(&lookup, DB_ACQUIRE_TIMEOUT_MS, defaults.acquire_timeout.as_millis() as u64)?;

        let commit_retries = parse_or(&lookup, COMMIT_RETRIES, defaults.commit_retries)?;
        if commit_retries == 0 {
            return Err(invalid(COMMIT_RETRIES, "0"));
        }

        Ok(Self {
            database_url,
            max_connections,
            acquire_timeout: Duration::from_millis(acquire_timeout_ms),
            commit_retries,
        })
    }

    pub fn require_database_url(&self) -> Result<&str, ConfigError> {
        self.database_url.as_deref().ok_or(ConfigError::Missing(DATABASE_URL))
    }
}

fn invalid(key: &'static str, value: &str) -> ConfigError {
    ConfigError::Invalid {
        key,
        value: value.to_string(),
    }
}

fn parse_or<T: core::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| invalid(key, &raw)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = InfraConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, InfraConfig::default());
        assert_eq!(config.require_database_url(), Err(ConfigError::Missing(DATABASE_URL)));
    }

    #[test]
    fn explicit_values_win() {
        let config = InfraConfig::from_lookup(lookup(&[
            (LEGACY_DATABASE_URL, "postgres://legacy"),
            (DATABASE_URL, "postgres://primary"),
            (DB_MAX_CONNECTIONS, "4"),
            (DB_ACQUIRE_TIMEOUT_MS, "250"),
            (COMMIT_RETRIES, "2"),
        ]))
        .unwrap();

        assert_eq!(config.database_url.as_deref(), Some("postgres://primary"));
        assert_eq!(config.max_connections, 4);
        assert_eq!(config.acquire_timeout, Duration::from_millis(250));
        assert_eq!(config.commit_retries, 2);
    }

    #[test]
    fn legacy_database_url_is_a_fallback() {
        let config = InfraConfig::from_lookup(lookup(&[(LEGACY_DATABASE_URL, "postgres://legacy")])).unwrap();
        assert_eq!(config.require_database_url(), Ok("postgres://legacy"));
    }

    #[test]
    fn bad_values_are_rejected() {
        let err = InfraConfig::from_lookup(lookup(&[(DB_MAX_CONNECTIONS, "many")])).unwrap_err();
        assert_eq!(
            err,
            ConfigError::Invalid {
                key: DB_MAX_CONNECTIONS,
                value: "many".to_string()
            }
        );
        assert!(InfraConfig::from_lookup(lookup(&[(COMMIT_RETRIES, "0")])).is_err());
    }
}
