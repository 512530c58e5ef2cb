//! Tavily search API, used as the fallback side of the race.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde_json::{json, Value};
use tracing::debug;

use super::json::{array_field, str_field};
use crate::result::DEFAULT_MAX_RESULTS;
use crate::{
    ImageResult, NormalizedSearchResult, Provider, ProviderConfig, Result, SearchError, SearchQuery,
    WebResult,
};

/// Tavily search provider.
pub struct Tavily {
    config: ProviderConfig,
    client: Client,
    api_key: String,
    base_url: String,
    max_results: usize,
}

impl Tavily {
    /// Creates a new Tavily provider.
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Result<Self> {
        let config = ProviderConfig::new("Tavily", "tavily").with_timeout(20);
        let client = Client::builder()
            .user_agent(concat!("search-relay/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            config,
            client,
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            max_results: DEFAULT_MAX_RESULTS,
        })
    }

    /// Creates with custom configuration; its timeout bounds each request.
    pub fn with_config(mut self, config: ProviderConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the per-sequence result cap.
    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }

    fn request(&self, query: &SearchQuery) -> RequestBuilder {
        let body = json!({
            "api_key": self.api_key,
            "query": query.query,
            "include_images": true,
            "include_image_descriptions": true,
            "max_results": self.max_results,
        });
        self.client
            .post(format!("{}/search", self.base_url))
            .json(&body)
            .timeout(self.config.timeout())
    }
}

#[async_trait]
impl Provider for Tavily {
    fn config(&self) -> &ProviderConfig {
        &self.config
    }

    async fn search(&self, query: &SearchQuery) -> Result<NormalizedSearchResult> {
        let response = self.request(query).send().await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(SearchError::from_status(&self.config.shortcut, status.as_u16(), message));
        }

        let value: Value = response
            .json()
            .await
            .map_err(|e| SearchError::Parse(format!("tavily response: {}", e)))?;

        let results = parse_response(&value, &self.config.shortcut).normalize(self.max_results);
        debug!(web = results.web.len(), images = results.images.len(), "tavily search finished");
        Ok(results)
    }
}

fn parse_response(value: &Value, provider: &str) -> NormalizedSearchResult {
    let web = array_field(value, &["results"], provider)
        .iter()
        .map(|item| {
            let mut result = WebResult::new(
                str_field(item, &["url"]),
                str_field(item, &["title"]),
                str_field(item, &["content", "raw_content"]),
            );
            let date = str_field(item, &["published_date"]);
            if !date.is_empty() {
                result.published_date = Some(date);
            }
            result
        })
        .collect();

    // images arrive as bare URLs or as {url, description} objects
    let images = array_field(value, &["images"], provider)
        .iter()
        .map(|item| match item {
            Value::String(url) => ImageResult::new(url.trim(), "", ""),
            other => ImageResult::new(str_field(other, &["url"]), str_field(other, &["description"]), ""),
        })
        .collect();

    NormalizedSearchResult {
        web,
        images,
        ..Default::default()
    }
}
