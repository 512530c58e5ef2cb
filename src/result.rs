//! Provider-agnostic search result types.

use serde::{Deserialize, Serialize};
use url::Url;

/// Default cap for each result sequence.
pub const DEFAULT_MAX_RESULTS: usize = 10;

/// A web document or news article.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebResult {
    /// Result title.
    pub title: String,
    /// Result URL.
    pub url: String,
    /// Description/snippet.
    pub content: String,
    /// Published date (news only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_date: Option<String>,
}

impl WebResult {
    /// Creates a new web result.
    pub fn new(url: impl Into<String>, title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            content: content.into(),
            published_date: None,
        }
    }

    /// Sets the published date.
    pub fn with_published_date(mut self, date: impl Into<String>) -> Self {
        self.published_date = Some(date.into());
        self
    }
}

/// An image hit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageResult {
    /// Direct image URL.
    pub url: String,
    pub alt_text: String,
    /// Page the image was found on.
    pub source_url: String,
}

impl ImageResult {
    pub fn new(url: impl Into<String>, alt_text: impl Into<String>, source_url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            alt_text: alt_text.into(),
            source_url: source_url.into(),
        }
    }
}

/// A video hit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoResult {
    pub title: String,
    pub url: String,
    pub thumbnail_url: String,
    /// Human-readable duration as reported by the provider (e.g., "4:13").
    pub duration: String,
}

impl VideoResult {
    pub fn new(
        url: impl Into<String>,
        title: impl Into<String>,
        thumbnail_url: impl Into<String>,
        duration: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            thumbnail_url: thumbnail_url.into(),
            duration: duration.into(),
        }
    }
}

/// Search results as every provider reports them to callers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedSearchResult {
    /// Web documents.
    #[serde(default)]
    pub web: Vec<WebResult>,
    #[serde(default)]
    pub images: Vec<ImageResult>,
    #[serde(default)]
    pub news: Vec<WebResult>,
    #[serde(default)]
    pub videos: Vec<VideoResult>,
}

impl NormalizedSearchResult {
    /// Creates an empty result set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true when no sequence holds an entry.
    pub fn is_empty(&self) -> bool {
        self.web.is_empty() && self.images.is_empty() && self.news.is_empty() && self.videos.is_empty()
    }

    /// Total number of entries across all sequences.
    pub fn len(&self) -> usize {
        self.web.len() + self.images.len() + self.news.len() + self.videos.len()
    }

    /// Drops entries with invalid URLs and caps every sequence at `max`.
    ///
    /// Images must use `https`; other entries may use `http` or `https`.
    pub fn normalize(mut self, max: usize) -> Self {
        self.web.retain(|r| is_valid_url(&r.url));
        self.web.truncate(max);
        self.news.retain(|r| is_valid_url(&r.url));
        self.news.truncate(max);
        self.images.retain(|r| is_secure_url(&r.url));
        self.images.truncate(max);
        self.videos.retain(|r| is_valid_url(&r.url));
        self.videos.truncate(max);
        self
    }
}

/// Whether `url` parses as an absolute http(s) URL.
pub fn is_valid_url(url: &str) -> bool {
    let url = url.trim();
    !url.is_empty()
        && Url::parse(url)
            .map(|u| matches!(u.scheme(), "http" | "https") && u.has_host())
            .unwrap_or(false)
}

/// Whether `url` is a valid https URL.
pub fn is_secure_url(url: &str) -> bool {
    is_valid_url(url) && url.trim().starts_with("https://")
}

/// Returns a normalized URL for deduplication: scheme dropped, host
/// lowercased, path case kept, trailing slash trimmed.
pub fn normalized_url(url: &str) -> String {
    let trimmed = url.trim();
    let parsed = Url::parse(trimmed)
        .or_else(|_| Url::parse(&format!("https://{}", trimmed)))
        .ok()
        .filter(|u| u.has_host());
    let Some(parsed) = parsed else {
        return trimmed.trim_end_matches('/').to_string();
    };

    let mut key = parsed.host_str().unwrap_or_default().to_lowercase();
    if let Some(port) = parsed.port() {
        key.push_str(&format!(":{}", port));
    }
    key.push_str(parsed.path().trim_end_matches('/'));
    if let Some(query) = parsed.query() {
        key.push('?');
        key.push_str(query);
    }
    key
}
