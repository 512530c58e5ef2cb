//! Primary provider: a JSON search API with separate document and image
//! endpoints, authenticated with a bearer token.
//!
//! Both endpoints share one quota, so every call goes through the
//! [`ThrottledQueue`] handed in at construction.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::json::{array_field, str_field};
use crate::queue::ThrottledQueue;
use crate::result::DEFAULT_MAX_RESULTS;
use crate::{
    ImageResult, NormalizedSearchResult, Provider, ProviderConfig, Result, SearchError, SearchQuery,
    VideoResult, WebResult,
};

/// Primary search API client.
pub struct BearerApi {
    config: ProviderConfig,
    client: Client,
    api_key: String,
    base_url: String,
    queue: Arc<ThrottledQueue>,
    max_results: usize,
}

impl BearerApi {
    /// Creates a client for the API at `base_url`, pacing calls through `queue`.
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        queue: Arc<ThrottledQueue>,
    ) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("search-relay/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            config: ProviderConfig::new("Search API", "primary").with_timeout(60),
            client,
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            queue,
            max_results: DEFAULT_MAX_RESULTS,
        })
    }

    /// Creates with custom configuration.
    pub fn with_config(mut self, config: ProviderConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the per-sequence result cap.
    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }

    /// Queues one POST to `endpoint` and waits for its JSON body.
    async fn call(&self, endpoint: &str, query: &SearchQuery) -> Result<Value> {
        let client = self.client.clone();
        let url = format!("{}/{}", self.base_url, endpoint);
        let api_key = self.api_key.clone();
        let provider = self.config.shortcut.clone();
        let mut body = json!({ "query": query.query, "count": self.max_results });
        if let Some(language) = &query.language {
            body["language"] = Value::String(language.clone());
        }

        self.queue
            .submit(move || {
                let request = client.post(&url).bearer_auth(&api_key).json(&body);
                let provider = provider.clone();
                async move {
                    let response = request.send().await?;
                    let status = response.status();
                    if !status.is_success() {
                        let message = response.text().await.unwrap_or_default();
                        return Err(status_error(&provider, status, message));
                    }
                    response
                        .json::<Value>()
                        .await
                        .map_err(|e| SearchError::Parse(format!("{} response: {}", provider, e)))
                }
            })
            .await
    }
}

/// Maps a non-success status; auth refusals are permanent.
fn status_error(provider: &str, status: StatusCode, message: String) -> SearchError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => SearchError::Blocked {
            provider: provider.to_string(),
            reason: format!("{}: {}", status.as_u16(), message),
        },
        _ => SearchError::from_status(provider, status.as_u16(), message),
    }
}

#[async_trait]
impl Provider for BearerApi {
    fn config(&self) -> &ProviderConfig {
        &self.config
    }

    async fn search(&self, query: &SearchQuery) -> Result<NormalizedSearchResult> {
        let (documents, images) = tokio::join!(self.call("search", query), self.call("images", query));

        let mut results = parse_documents(&documents?, &self.config.shortcut);
        match images {
            Ok(images) => results.images = parse_images(&images, &self.config.shortcut),
            Err(e) => warn!(provider = %self.config.shortcut, error = %e, "image search failed, continuing without images"),
        }

        let results = results.normalize(self.max_results);
        debug!(
            provider = %self.config.shortcut,
            web = results.web.len(),
            images = results.images.len(),
            news = results.news.len(),
            "primary search finished"
        );
        Ok(results)
    }
}

fn parse_documents(value: &Value, provider: &str) -> NormalizedSearchResult {
    let document = |item: &Value| {
        WebResult::new(
            str_field(item, &["url", "link"]),
            str_field(item, &["title", "name"]),
            str_field(item, &["content", "snippet", "description"]),
        )
    };

    let web = array_field(value, &["results", "web"], provider)
        .iter()
        .map(document)
        .collect();
    let news = array_field(value, &["news"], provider)
        .iter()
        .map(|item| {
            let mut result = document(item);
            let date = str_field(item, &["date", "published_date", "publishedDate"]);
            if !date.is_empty() {
                result.published_date = Some(date);
            }
            result
        })
        .collect();
    let videos = array_field(value, &["videos"], provider)
        .iter()
        .map(|item| {
            VideoResult::new(
                str_field(item, &["url", "link"]),
                str_field(item, &["title"]),
                str_field(item, &["thumbnail", "thumbnailUrl", "thumbnail_url"]),
                str_field(item, &["duration", "length"]),
            )
        })
        .collect();

    NormalizedSearchResult {
        web,
        news,
        videos,
        ..Default::default()
    }
}

fn parse_images(value: &Value, provider: &str) -> Vec<ImageResult> {
    array_field(value, &["results", "images"], provider)
        .iter()
        .map(|item| {
            ImageResult::new(
                str_field(item, &["url", "imageUrl", "image_url"]),
                str_field(item, &["alt", "title", "description"]),
                str_field(item, &["source", "link", "sourceUrl", "source_url"]),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::QueueConfig;

    fn queue() -> Arc<ThrottledQueue> {
        Arc::new(ThrottledQueue::new(QueueConfig::default()).unwrap())
    }

    #[test]
    fn test_bearer_new() {
        let provider = BearerApi::new("key", "https://api.example.com/v1/", queue()).unwrap();
        assert_eq!(provider.base_url, "https://api.example.com/v1");
        assert_eq!(provider.name(), "Search API");
        assert_eq!(provider.shortcut(), "primary");
        assert_eq!(provider.config.timeout, 60);
    }

    #[test]
    fn test_bearer_with_config() {
        let provider = BearerApi::new("key", "https://api.example.com", queue())
            .unwrap()
            .with_config(ProviderConfig::new("Custom", "custom"));
        assert_eq!(provider.name(), "Custom");
    }

    #[test]
    fn test_parse_documents() {
        let value = json!({
            "results": [
                {"title": "Rust", "url": "https://www.rust-lang.org/", "snippet": "A language"},
                {"title": "No URL"}
            ],
            "news": [
                {"title": "Release", "url": "https://blog.rust-lang.org/", "description": "1.80", "date": "2024-07-25"}
            ],
            "videos": [
                {"title": "Talk", "url": "https://video.example.com/1", "thumbnail": "https://i.example.com/1.jpg", "duration": "12:01"}
            ]
        });
        let results = parse_documents(&value, "primary").normalize(10);
        assert_eq!(results.web.len(), 1);
        assert_eq!(results.web[0].content, "A language");
        assert_eq!(results.news[0].published_date.as_deref(), Some("2024-07-25"));
        assert_eq!(results.videos[0].duration, "12:01");
    }

    #[test]
    fn test_parse_documents_wrong_shape() {
        let value = json!({"results": {"unexpected": true}});
        assert!(parse_documents(&value, "primary").is_empty());
    }

    #[test]
    fn test_parse_images() {
        let value = json!({
            "images": [
                {"imageUrl": "https://img.example.com/a.png", "title": "A", "link": "https://example.com/a"},
                {"imageUrl": "http://img.example.com/b.png", "title": "B"}
            ]
        });
        let images = parse_images(&value, "primary");
        assert_eq!(images.len(), 2);
        assert_eq!(images[0].alt_text, "A");
        assert_eq!(images[0].source_url, "https://example.com/a");
    }

    #[test]
    fn test_status_error_mapping() {
        assert!(matches!(
            status_error("p", StatusCode::FORBIDDEN, "nope".into()),
            SearchError::Blocked { .. }
        ));
        assert!(matches!(
            status_error("p", StatusCode::TOO_MANY_REQUESTS, String::new()),
            SearchError::RateLimited(_)
        ));
        assert!(matches!(
            status_error("p", StatusCode::BAD_GATEWAY, String::new()),
            SearchError::Api { status: 502, .. }
        ));
    }
}
