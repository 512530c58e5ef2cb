//! Search provider traits and per-call bookkeeping.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::{NormalizedSearchResult, Result, SearchQuery};

/// Configuration for a search provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Display name of the provider.
    pub name: String,
    /// Short identifier used in logs and attempt records.
    pub shortcut: String,
    /// Budget for one `search` call in seconds, retries included.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    /// Whether the provider is enabled.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_timeout() -> u64 {
    30
}

fn default_enabled() -> bool {
    true
}

impl ProviderConfig {
    pub fn new(name: impl Into<String>, shortcut: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            shortcut: shortcut.into(),
            ..Default::default()
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = secs;
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            shortcut: String::new(),
            timeout: default_timeout(),
            enabled: true,
        }
    }
}

/// A provider that may fail; used for the primary and secondary race sides.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Returns the provider configuration.
    fn config(&self) -> &ProviderConfig;

    /// Performs a search and returns normalized results.
    async fn search(&self, query: &SearchQuery) -> Result<NormalizedSearchResult>;

    /// Returns the provider name.
    fn name(&self) -> &str {
        &self.config().name
    }

    /// Returns the provider shortcut.
    fn shortcut(&self) -> &str {
        &self.config().shortcut
    }

    /// Returns whether the provider is enabled.
    fn is_enabled(&self) -> bool {
        self.config().enabled
    }
}

/// A provider that never fails: errors become [`ProviderOutcome::Degraded`].
#[async_trait]
pub trait BestEffortProvider: Send + Sync {
    fn config(&self) -> &ProviderConfig;

    async fn search(&self, query: &SearchQuery) -> ProviderOutcome;

    fn name(&self) -> &str {
        &self.config().name
    }
}

/// Result of a best-effort provider call.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderOutcome {
    /// The provider answered.
    Ok(NormalizedSearchResult),
    /// The provider failed; the results are empty and `reason` says why.
    Degraded {
        results: NormalizedSearchResult,
        reason: String,
    },
}

impl ProviderOutcome {
    /// Builds a degraded outcome with an empty result set.
    pub fn degraded(reason: impl Into<String>) -> Self {
        Self::Degraded {
            results: NormalizedSearchResult::default(),
            reason: reason.into(),
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded { .. })
    }

    /// Flattens the outcome into the plain result set callers see.
    pub fn into_results(self) -> NormalizedSearchResult {
        match self {
            Self::Ok(results) | Self::Degraded { results, .. } => results,
        }
    }
}

/// How one provider invocation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttemptOutcome {
    Success,
    Failure,
    Timeout,
    /// Still running when the other race side won.
    Abandoned,
}

/// Ephemeral record of one provider invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderAttempt {
    pub provider_id: String,
    pub started_at: Instant,
    pub outcome: AttemptOutcome,
}
