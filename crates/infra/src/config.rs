//! Process configuration loaded from environment variables.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Invalid configuration value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{key} must be {expected}, got '{value}'")]
    Invalid {
        key: &'static str,
        expected: &'static str,
        value: String,
    },
}

/// Ledger service configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// HTTP port to bind (`API_PORT`, default 8080).
    pub api_port: u16,
    /// Postgres connection URL (`DATABASE_URL`). Absent: in-memory store.
    pub database_url: Option<String>,
    /// Pool size (`DATABASE_MAX_CONNECTIONS`, default 10).
    pub max_connections: u32,
    /// Per-unit row lock wait bound (`DATABASE_LOCK_TIMEOUT_MS`).
    pub lock_timeout_ms: Option<u64>,
    /// Apply the bundled schema at startup (`RUN_MIGRATIONS`, default true).
    pub run_migrations: bool,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            api_port: 8080,
            database_url: None,
            max_connections: 10,
            lock_timeout_ms: None,
            run_migrations: true,
        }
    }
}

impl LedgerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let config = Self {
            api_port: parse_or(get("API_PORT"), "API_PORT", "a port number", defaults.api_port)?,
            database_url: get("DATABASE_URL"),
            max_connections: parse_or(
                get("DATABASE_MAX_CONNECTIONS"),
                "DATABASE_MAX_CONNECTIONS",
                "a positive integer",
                defaults.max_connections,
            )?,
            lock_timeout_ms: get("DATABASE_LOCK_TIMEOUT_MS")
                .map(|v| parse("DATABASE_LOCK_TIMEOUT_MS", "milliseconds", v))
                .transpose()?,
            run_migrations: match get("RUN_MIGRATIONS") {
                None => defaults.run_migrations,
                Some(v) => parse_bool("RUN_MIGRATIONS", v)?,
            },
        };

        if config.max_connections == 0 {
            return Err(ConfigError::Invalid {
                key: "DATABASE_MAX_CONNECTIONS",
                expected: "a positive integer",
                value: "0".to_string(),
            });
        }
        Ok(config)
    }

    pub fn lock_timeout(&self) -> Option<Duration> {
        self.lock_timeout_ms.map(Duration::from_millis)
    }
}

fn parse<T: std::str::FromStr>(
    key: &'static str,
    expected: &'static str,
    value: String,
) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Invalid { key, expected, value })
}

fn parse_or<T: std::str::FromStr>(
    value: Option<String>,
    key: &'static str,
    expected: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match value {
        Some(v) => parse(key, expected, v),
        None => Ok(default),
    }
}

fn parse_bool(key: &'static str, value: String) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            key,
            expected: "a boolean",
            value,
        }),
    }
}
