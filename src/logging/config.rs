use serde::{Deserialize, Serialize};

use crate::config::Environment;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "trace" => Some(LogLevel::Trace),
            "debug" => Some(LogLevel::Debug),
            "info" => Some(LogLevel::Info),
            "warn" | "warning" => Some(LogLevel::Warn),
            "error" => Some(LogLevel::Error),
            _ => None,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Trace => write!(f, "trace"),
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}

/// Where and how verbosely to log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    pub level: LogLevel,
    pub directory: String,
    /// JSON lines instead of human-readable output.
    pub json: bool,
    pub environment: Environment,
}

impl LogConfig {
    pub fn from_env(environment: Environment) -> Self {
        Self::from_lookup(environment, |key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(environment: Environment, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let is_production = environment == Environment::Production;
        let fallback = if is_production {
            LogLevel::Info
        } else {
            LogLevel::Debug
        };
        Self {
            level: lookup("LOG_LEVEL")
                .and_then(|v| LogLevel::parse(&v))
                .unwrap_or(fallback),
            directory: lookup("LOG_DIR")
                .filter(|d| !d.trim().is_empty())
                .unwrap_or_else(|| "logs".to_string()),
            json: is_production,
            environment,
        }
    }

    /// Directive used when `RUST_LOG` is not set.
    pub fn default_directive(&self) -> String {
        format!(
            "staffing_backend={},tower_http=debug,axum=debug,sqlx=warn",
            self.level
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(environment: Environment, pairs: &[(&str, &str)]) -> LogConfig {
        let map: HashMap<&str, &str> = pairs.iter().copied().collect();
        LogConfig::from_lookup(environment, |key| map.get(key).map(|v| v.to_string()))
    }

    #[test]
    fn test_level_defaults_follow_environment() {
        assert_eq!(config(Environment::Development, &[]).level, LogLevel::Debug);
        let prod = config(Environment::Production, &[]);
        assert_eq!(prod.level, LogLevel::Info);
        assert!(prod.json);
        assert_eq!(prod.directory, "logs");
    }

    #[test]
    fn test_overrides_and_directive() {
        let cfg = config(
            Environment::Development,
            &[("LOG_LEVEL", "WARN"), ("LOG_DIR", "/tmp/staffing")],
        );
        assert_eq!(cfg.level, LogLevel::Warn);
        assert_eq!(cfg.directory, "/tmp/staffing");
        assert!(cfg.default_directive().starts_with("staffing_backend=warn"));
    }

    #[test]
    fn test_unknown_level_falls_back() {
        assert_eq!(
            config(Environment::Test, &[("LOG_LEVEL", "loud")]).level,
            LogLevel::Debug
        );
    }
}
