//! SearXNG metasearch instance, queried as a best-effort supplemental source.
//!
//! Any non-success status degrades to an empty result set immediately.
//! Connectivity failures are retried once with the other HTTP verb, since
//! instances commonly restrict one of GET or POST.

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde_json::Value;
use tracing::{debug, warn};

use super::json::{array_field, str_field};
use crate::result::DEFAULT_MAX_RESULTS;
use crate::{
    BestEffortProvider, ImageResult, NormalizedSearchResult, ProviderConfig, ProviderOutcome, Result,
    SearchQuery, VideoResult, WebResult,
};

/// Attempts per search, the first one included.
const MAX_ATTEMPTS: usize = 2;

/// SearXNG provider.
pub struct Searxng {
    config: ProviderConfig,
    client: Client,
    base_url: String,
    engines: Vec<String>,
    max_results: usize,
}

impl Searxng {
    /// Creates a provider for the instance at `base_url`.
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let config = ProviderConfig::new("SearXNG", "searxng").with_timeout(10);
        let client = Client::builder()
            .user_agent(concat!("search-relay/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            config,
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            engines: Vec::new(),
            max_results: DEFAULT_MAX_RESULTS,
        })
    }

    /// Sets the engines requested when the query names none.
    pub fn with_engines(mut self, engines: Vec<String>) -> Self {
        self.engines = engines;
        self
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

    fn params(&self, query: &SearchQuery) -> Vec<(&'static str, String)> {
        let engines = if query.engines.is_empty() {
            &self.engines
        } else {
            &query.engines
        };
        let mut params = vec![
            ("q", query.query.clone()),
            ("format", "json".to_string()),
            ("categories", "general,images,news,videos".to_string()),
        ];
        if !engines.is_empty() {
            params.push(("engines", engines.join(",")));
        }
        if let Some(language) = &query.language {
            params.push(("language", language.clone()));
        }
        params
    }

    fn request(&self, method: &Method, query: &SearchQuery) -> RequestBuilder {
        let params = self.params(query);
        let request = if *method == Method::POST {
            self.client
                .post(format!("{}/search", self.base_url))
                .form(&params)
        } else {
            let encoded: Vec<String> = params
                .iter()
                .map(|(key, value)| format!("{}={}", key, urlencoding::encode(value)))
                .collect();
            self.client
                .get(format!("{}/search?{}", self.base_url, encoded.join("&")))
        };
        request.timeout(self.config.timeout())
    }

    async fn send(&self, method: &Method, query: &SearchQuery) -> reqwest::Result<Response> {
        self.request(method, query).send().await
    }
}

#[async_trait]
impl BestEffortProvider for Searxng {
    fn config(&self) -> &ProviderConfig {
        &self.config
    }

    async fn search(&self, query: &SearchQuery) -> ProviderOutcome {
        let mut method = Method::GET;
        let mut last_error = String::new();

        for attempt in 1..=MAX_ATTEMPTS {
            let response = match self.send(&method, query).await {
                Ok(response) => response,
                Err(e) => {
                    warn!(provider = "searxng", attempt, method = %method, error = %e, "request failed");
                    last_error = e.to_string();
                    method = if method == Method::GET { Method::POST } else { Method::GET };
                    continue;
                }
            };

            let status = response.status();
            if !status.is_success() {
                warn!(provider = "searxng", status = status.as_u16(), "degrading to empty results");
                return ProviderOutcome::degraded(format!("HTTP {}", status.as_u16()));
            }

            return match response.json::<Value>().await {
                Ok(value) => {
                    let results = parse_response(&value).normalize(self.max_results);
                    debug!(
                        web = results.web.len(),
                        news = results.news.len(),
                        videos = results.videos.len(),
                        "searxng search finished"
                    );
                    ProviderOutcome::Ok(results)
                }
                Err(e) => {
                    warn!(provider = "searxng", error = %e, "unreadable response, degrading");
                    ProviderOutcome::degraded(format!("invalid response: {}", e))
                }
            };
        }

        warn!(provider = "searxng", "retries exhausted, degrading to empty results");
        ProviderOutcome::degraded(format!("retries exhausted: {}", last_error))
    }
}

fn parse_response(value: &Value) -> NormalizedSearchResult {
    let mut results = NormalizedSearchResult::new();

    if let Some(total) = value.get("number_of_results").and_then(Value::as_u64) {
        debug!(number_of_results = total, "searxng reported total");
    }

    for item in array_field(value, &["results"], "searxng") {
        let url = str_field(item, &["url"]);
        let title = str_field(item, &["title"]);
        match str_field(item, &["category"]).as_str() {
            "images" => results.images.push(ImageResult::new(
                str_field(item, &["img_src", "thumbnail_src"]),
                title,
                url,
            )),
            "videos" => results.videos.push(video(item)),
            "news" => {
                let mut news = WebResult::new(url, title, str_field(item, &["content"]));
                let date = str_field(item, &["publishedDate", "pubdate"]);
                if !date.is_empty() {
                    news.published_date = Some(date);
                }
                results.news.push(news);
            }
            _ => results
                .web
                .push(WebResult::new(url, title, str_field(item, &["content"]))),
        }
    }

    for item in array_field(value, &["videos"], "searxng") {
        results.videos.push(video(item));
    }

    results
}

fn video(item: &Value) -> VideoResult {
    VideoResult::new(
        str_field(item, &["url"]),
        str_field(item, &["title"]),
        str_field(item, &["thumbnail", "thumbnail_src"]),
        str_field(item, &["length", "duration"]),
    )
}
