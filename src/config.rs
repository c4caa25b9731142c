//! Runtime configuration, read from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::gemini::{DEFAULT_GEMINI_MODEL, GEMINI_API_BASE};

/// Default port if not specified via environment variable.
pub const DEFAULT_PORT: u16 = 3000;

/// Default database path if not specified via environment variable.
pub const DEFAULT_DB_PATH: &str = "sqlite:cyclewise.db?mode=rwc";

/// Default timeout for a single text-generation call.
pub const DEFAULT_AI_TIMEOUT_SECS: u64 = 30;

/// Default recency window for symptom analysis.
pub const DEFAULT_SYMPTOM_WINDOW_DAYS: u32 = 7;

/// Service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_url: String,

    /// Gemini API key. Insights are disabled when unset.
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub gemini_base_url: String,
    pub ai_timeout_secs: u64,

    /// Days of symptom history fed into analyses and insights.
    pub symptom_window_days: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            database_url: DEFAULT_DB_PATH.to_string(),
            gemini_api_key: None,
            gemini_model: DEFAULT_GEMINI_MODEL.to_string(),
            gemini_base_url: GEMINI_API_BASE.to_string(),
            ai_timeout_secs: DEFAULT_AI_TIMEOUT_SECS,
            symptom_window_days: DEFAULT_SYMPTOM_WINDOW_DAYS,
        }
    }
}

impl Config {
    /// Load configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    ///
    /// Missing or unparseable values fall back to the defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        Self {
            port: parsed(&lookup, "CYCLEWISE_PORT").unwrap_or(defaults.port),
            database_url: lookup("CYCLEWISE_DATABASE_URL").unwrap_or(defaults.database_url),
            gemini_api_key: lookup("GEMINI_API_KEY").filter(|k| !k.trim().is_empty()),
            gemini_model: lookup("CYCLEWISE_GEMINI_MODEL").unwrap_or(defaults.gemini_model),
            gemini_base_url: lookup("CYCLEWISE_GEMINI_BASE_URL")
                .unwrap_or(defaults.gemini_base_url),
            ai_timeout_secs: parsed(&lookup, "CYCLEWISE_AI_TIMEOUT_SECS")
                .unwrap_or(defaults.ai_timeout_secs),
            symptom_window_days: parsed(&lookup, "CYCLEWISE_SYMPTOM_WINDOW_DAYS")
                .unwrap_or(defaults.symptom_window_days),
        }
    }

    /// Get the AI timeout as a Duration.
    pub fn ai_timeout(&self) -> Duration {
        Duration::from_secs(self.ai_timeout_secs)
    }
}

fn parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    lookup(key).and_then(|v| v.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = Config::from_lookup(lookup_from(&[]));

        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.database_url, DEFAULT_DB_PATH);
        assert!(config.gemini_api_key.is_none());
        assert_eq!(config.gemini_model, "gemini-pro");
        assert_eq!(config.symptom_window_days, 7);
        assert_eq!(config.ai_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup_from(&[
            ("CYCLEWISE_PORT", "8080"),
            ("CYCLEWISE_DATABASE_URL", "sqlite::memory:"),
            ("GEMINI_API_KEY", "secret"),
            ("CYCLEWISE_SYMPTOM_WINDOW_DAYS", "14"),
            ("CYCLEWISE_AI_TIMEOUT_SECS", "5"),
        ]));

        assert_eq!(config.port, 8080);
        assert_eq!(config.database_url, "sqlite::memory:");
        assert_eq!(config.gemini_api_key.as_deref(), Some("secret"));
        assert_eq!(config.symptom_window_days, 14);
        assert_eq!(config.ai_timeout_secs, 5);
    }

    #[test]
    fn test_unparseable_values_fall_back() {
        let config = Config::from_lookup(lookup_from(&[
            ("CYCLEWISE_PORT", "not-a-port"),
            ("CYCLEWISE_SYMPTOM_WINDOW_DAYS", "-3"),
            ("GEMINI_API_KEY", "   "),
        ]));

        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.symptom_window_days, DEFAULT_SYMPTOM_WINDOW_DAYS);
        assert!(config.gemini_api_key.is_none());
    }
}
