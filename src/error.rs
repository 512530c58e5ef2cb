//! Error types for the search relay.

use regex::RegexSet;
use thiserror::Error;

/// Result type alias for relay operations.
pub type Result<T> = std::result::Result<T, SearchError>;

/// Errors that can occur while queueing or racing provider calls.
#[derive(Error, Debug)]
pub enum SearchError {
    /// HTTP request failed before a response was received.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Provider answered with a non-success status.
    #[error("Provider '{provider}' returned {status}: {message}")]
    Api {
        provider: String,
        status: u16,
        message: String,
    },

    /// Provider rejected the call because its quota is exhausted.
    #[error("Provider '{0}' rate limited the request (429)")]
    RateLimited(String),

    /// Provider refuses this request permanently.
    #[error("Provider '{provider}' blocked the request: {reason}")]
    Blocked { provider: String, reason: String },

    /// Failed to parse response.
    #[error("Failed to parse response: {0}")]
    Parse(String),

    /// A single attempt exceeded its deadline.
    #[error("Call timed out after {0}ms")]
    Timeout(u64),

    /// The queue was torn down before the task completed.
    #[error("Task cancelled by queue teardown")]
    Cancelled,

    /// Invalid query.
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// No provider configured for the search.
    #[error("No search providers configured")]
    NoProviders,

    /// Every provider consulted for the search failed.
    #[error("All search providers failed: {0}")]
    AllProvidersFailed(String),

    /// Generic error.
    #[error("{0}")]
    Other(String),
}

impl SearchError {
    /// Builds an `Api` error, mapping 429 to `RateLimited`.
    pub fn from_status(provider: &str, status: u16, message: impl Into<String>) -> Self {
        if status == 429 {
            return Self::RateLimited(provider.to_string());
        }
        Self::Api {
            provider: provider.to_string(),
            status,
            message: message.into(),
        }
    }

    /// Whether the failure class makes a retry pointless regardless of message.
    pub fn is_permanent(&self) -> bool {
        match self {
            Self::Api { status, .. } => matches!(status, 400 | 422),
            Self::Blocked { .. } | Self::InvalidQuery(_) | Self::Config(_) | Self::Cancelled => true,
            _ => false,
        }
    }
}

/// Classifies errors as fatal (not worth a retry).
///
/// An error is fatal if its variant is permanent (see
/// [`SearchError::is_permanent`]) or if its rendered message matches one of
/// the configured patterns. Rate-limit errors are never fatal.
#[derive(Debug, Clone)]
pub struct FatalMatcher {
    patterns: RegexSet,
}

impl FatalMatcher {
    /// Compiles the given patterns (case-insensitive).
    pub fn new<I, S>(patterns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns: Vec<String> = patterns
            .into_iter()
            .map(|p| format!("(?i){}", p.as_ref()))
            .collect();
        let patterns = RegexSet::new(&patterns)
            .map_err(|e| SearchError::Config(format!("invalid fatal pattern: {}", e)))?;
        Ok(Self { patterns })
    }

    /// Returns true when the error should not be retried.
    pub fn is_fatal(&self, err: &SearchError) -> bool {
        if matches!(err, SearchError::RateLimited(_)) {
            return false;
        }
        err.is_permanent() || self.patterns.is_match(&err.to_string())
    }
}

impl Default for FatalMatcher {
    fn default() -> Self {
        Self {
            patterns: RegexSet::empty(),
        }
    }
}
