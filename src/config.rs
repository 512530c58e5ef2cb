//! Relay configuration.
//!
//! Every section deserializes with defaults, so a partial JSON document (or
//! none at all) yields a working configuration. [`RelayConfig::from_env`]
//! overlays environment variables on top of the defaults.

use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{Result, SearchError};

/// Throttled queue settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Minimum milliseconds between two consecutive dispatches.
    #[serde(default = "default_min_interval_ms")]
    pub min_interval_ms: u64,
    /// Deadline for a single attempt in milliseconds.
    #[serde(default = "default_call_timeout_ms")]
    pub call_timeout_ms: u64,
    /// Pause before retrying a failed attempt in milliseconds.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    /// Retries after the first attempt.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Case-insensitive regexes; a matching error message is never retried.
    #[serde(default = "default_fatal_patterns")]
    pub fatal_patterns: Vec<String>,
}

fn default_min_interval_ms() -> u64 {
    1000
}

fn default_call_timeout_ms() -> u64 {
    20_000
}

fn default_retry_delay_ms() -> u64 {
    1000
}

fn default_max_retries() -> u32 {
    1
}

fn default_fatal_patterns() -> Vec<String> {
    vec![
        "bad request".to_string(),
        "invalid argument".to_string(),
        "permanently blocked".to_string(),
    ]
}

impl QueueConfig {
    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms)
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            min_interval_ms: default_min_interval_ms(),
            call_timeout_ms: default_call_timeout_ms(),
            retry_delay_ms: default_retry_delay_ms(),
            max_retries: default_max_retries(),
            fatal_patterns: default_fatal_patterns(),
        }
    }
}

/// Primary/secondary race settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RaceConfig {
    /// How long the primary runs alone before the secondary is started.
    #[serde(default = "default_grace_period_ms")]
    pub grace_period_ms: u64,
}

fn default_grace_period_ms() -> u64 {
    5000
}

impl RaceConfig {
    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period_ms)
    }
}

impl Default for RaceConfig {
    fn default() -> Self {
        Self {
            grace_period_ms: default_grace_period_ms(),
        }
    }
}

/// Provider-side input and output limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryLimits {
    #[serde(default = "default_max_words")]
    pub max_words: usize,
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
    /// Cap applied to each result sequence.
    #[serde(default = "default_max_results")]
    pub max_results: usize,
}

fn default_max_words() -> usize {
    60
}

fn default_max_chars() -> usize {
    400
}

fn default_max_results() -> usize {
    10
}

impl Default for QueryLimits {
    fn default() -> Self {
        Self {
            max_words: default_max_words(),
            max_chars: default_max_chars(),
            max_results: default_max_results(),
        }
    }
}

/// Endpoints and credentials of the three providers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvidersConfig {
    /// Bearer credential for the primary API.
    #[serde(default)]
    pub primary_api_key: Option<String>,
    /// Base URL of the primary API.
    #[serde(default = "default_primary_url")]
    pub primary_url: String,
    /// API key for the Tavily fallback.
    #[serde(default)]
    pub tavily_api_key: Option<String>,
    #[serde(default = "default_tavily_url")]
    pub tavily_url: String,
    /// Base URL of a SearXNG instance; unset disables the supplemental source.
    #[serde(default)]
    pub searxng_url: Option<String>,
}

fn default_primary_url() -> String {
    "https://api.search.example.com/v1".to_string()
}

fn default_tavily_url() -> String {
    "https://api.tavily.com".to_string()
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            primary_api_key: None,
            primary_url: default_primary_url(),
            tavily_api_key: None,
            tavily_url: default_tavily_url(),
            searxng_url: None,
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RelayConfig {
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub race: RaceConfig,
    #[serde(default)]
    pub query: QueryLimits,
    #[serde(default)]
    pub providers: ProvidersConfig,
}

impl RelayConfig {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        config.queue.min_interval_ms =
            env_parse("SEARCH_RELAY_MIN_INTERVAL_MS").unwrap_or(config.queue.min_interval_ms);
        config.queue.call_timeout_ms =
            env_parse("SEARCH_RELAY_CALL_TIMEOUT_MS").unwrap_or(config.queue.call_timeout_ms);
        config.queue.retry_delay_ms =
            env_parse("SEARCH_RELAY_RETRY_DELAY_MS").unwrap_or(config.queue.retry_delay_ms);
        config.queue.max_retries =
            env_parse("SEARCH_RELAY_MAX_RETRIES").unwrap_or(config.queue.max_retries);
        config.race.grace_period_ms =
            env_parse("SEARCH_RELAY_GRACE_PERIOD_MS").unwrap_or(config.race.grace_period_ms);

        config.providers.primary_api_key = env_non_empty("SEARCH_API_KEY");
        if let Some(url) = env_non_empty("SEARCH_API_URL") {
            config.providers.primary_url = url;
        }
        config.providers.tavily_api_key = env_non_empty("TAVILY_API_KEY");
        if let Some(url) = env_non_empty("TAVILY_API_URL") {
            config.providers.tavily_url = url;
        }
        config.providers.searxng_url = env_non_empty("SEARXNG_URL");

        config
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.queue.call_timeout_ms == 0 {
            return Err(SearchError::Config("call timeout must be greater than 0".into()));
        }
        if self.query.max_words == 0 || self.query.max_chars == 0 {
            return Err(SearchError::Config("query limits must be greater than 0".into()));
        }
        if self.query.max_results == 0 {
            return Err(SearchError::Config("max_results must be greater than 0".into()));
        }
        if self.queue.call_timeout_ms <= self.race.grace_period_ms {
            // secondary would never be able to start before the primary gives up
            tracing::warn!(
                call_timeout_ms = self.queue.call_timeout_ms,
                grace_period_ms = self.race.grace_period_ms,
                "grace period is not shorter than the per-call timeout"
            );
        }
        Ok(())
    }

    /// Whether any racing provider has credentials.
    pub fn has_any_provider(&self) -> bool {
        self.providers.primary_api_key.is_some() || self.providers.tavily_api_key.is_some()
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.parse().ok())
}

fn env_non_empty(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RelayConfig::default();
        assert_eq!(config.queue.min_interval(), Duration::from_secs(1));
        assert_eq!(config.queue.call_timeout(), Duration::from_secs(20));
        assert_eq!(config.queue.max_retries, 1);
        assert_eq!(config.race.grace_period(), Duration::from_secs(5));
        assert_eq!(config.query.max_results, 10);
        assert_eq!(config.providers.tavily_url, "https://api.tavily.com");
        assert!(!config.providers.primary_url.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_deserialization_uses_defaults() {
        let json = r#"{"queue":{"min_interval_ms":250},"race":{}}"#;
        let config: RelayConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.queue.min_interval_ms, 250);
        assert_eq!(config.queue.call_timeout_ms, 20_000);
        assert_eq!(config.race.grace_period_ms, 5000);
        assert_eq!(config.providers.tavily_url, "https://api.tavily.com");
        assert!(config.providers.searxng_url.is_none());
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let mut config = RelayConfig::default();
        config.queue.call_timeout_ms = 0;
        assert!(matches!(config.validate(), Err(SearchError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_zero_limits() {
        let mut config = RelayConfig::default();
        config.query.max_words = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_has_any_provider() {
        let mut config = RelayConfig::default();
        assert!(!config.has_any_provider());
        config.providers.tavily_api_key = Some("tvly-key".into());
        assert!(config.has_any_provider());
    }
}
