//! # search-relay
//!
//! Rate-limited, multi-provider search orchestration.
//!
//! This library sits between an application and a handful of external search
//! APIs, with support for:
//!
//! - A throttled task queue that serializes calls against a shared quota
//!   (minimum interval, per-attempt deadline, bounded retries)
//! - Racing a primary provider against a delayed fallback provider
//! - A best-effort supplemental provider that degrades to empty results
//! - Provider-agnostic `{web, images, news, videos}` results
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use search_relay::{RelayConfig, Search, SearchQuery, ThrottledQueue};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = RelayConfig::from_env();
//!     let queue = Arc::new(ThrottledQueue::new(config.queue.clone())?);
//!     let search = Search::from_config(&config, queue)?;
//!
//!     let results = search.search(SearchQuery::new("rust programming")).await?;
//!
//!     for result in &results.web {
//!         println!("{}: {}", result.title, result.url);
//!     }
//!     Ok(())
//! }
//! ```

mod aggregator;
mod error;
mod provider;
mod query;
mod result;
mod search;

pub mod config;
pub mod providers;
pub mod queue;

pub use aggregator::Aggregator;
pub use config::RelayConfig;
pub use error::{FatalMatcher, Result, SearchError};
pub use provider::{
    AttemptOutcome, BestEffortProvider, Provider, ProviderAttempt, ProviderConfig, ProviderOutcome,
};
pub use query::{truncate_query, SearchQuery};
pub use queue::{TaskHandle, ThrottledQueue};
pub use result::{ImageResult, NormalizedSearchResult, VideoResult, WebResult};
pub use search::{RaceReport, RaceWinner, Search};
