//! Merging of normalized results from several providers.

use std::collections::{HashMap, HashSet};

use crate::result::normalized_url;
use crate::{NormalizedSearchResult, WebResult};

/// Merges normalized results from several providers into one set.
///
/// Order is preserved (earlier providers first), duplicates are collapsed by
/// normalized URL, and every sequence is capped after merging.
#[derive(Debug, Clone)]
pub struct Aggregator {
    max_results: usize,
}

impl Aggregator {
    /// Creates a new aggregator with the given per-sequence cap.
    pub fn new(max_results: usize) -> Self {
        Self { max_results }
    }

    /// Merges provider outputs, first provider wins position ties.
    pub fn merge(&self, provider_results: Vec<(String, NormalizedSearchResult)>) -> NormalizedSearchResult {
        let mut merged = NormalizedSearchResult::new();
        let mut web_index: HashMap<String, usize> = HashMap::new();
        let mut news_index: HashMap<String, usize> = HashMap::new();
        let mut image_seen: HashSet<String> = HashSet::new();
        let mut video_seen: HashSet<String> = HashSet::new();

        for (provider, results) in provider_results {
            tracing::debug!(provider = %provider, count = results.len(), "merging provider results");

            for result in results.web {
                Self::merge_document(&mut merged.web, &mut web_index, result);
            }
            for result in results.news {
                Self::merge_document(&mut merged.news, &mut news_index, result);
            }
            for image in results.images {
                if image_seen.insert(normalized_url(&image.url)) {
                    merged.images.push(image);
                }
            }
            for video in results.videos {
                if video_seen.insert(normalized_url(&video.url)) {
                    merged.videos.push(video);
                }
            }
        }

        merged.normalize(self.max_results)
    }

    /// Inserts a document or folds it into an existing entry with the same URL.
    fn merge_document(target: &mut Vec<WebResult>, index: &mut HashMap<String, usize>, new: WebResult) {
        let key = normalized_url(&new.url);
        match index.get(&key) {
            Some(&pos) => {
                let existing = &mut target[pos];
                if new.title.len() > existing.title.len() {
                    existing.title = new.title;
                }
                if new.content.len() > existing.content.len() {
                    existing.content = new.content;
                }
                if existing.published_date.is_none() && new.published_date.is_some() {
                    existing.published_date = new.published_date;
                }
            }
            None => {
                index.insert(key, target.len());
                target.push(new);
            }
        }
    }
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::new(crate::result::DEFAULT_MAX_RESULTS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ImageResult, VideoResult};

    #[test]
    fn test_merge_empty() {
        let merged = Aggregator::default().merge(vec![]);
        assert!(merged.is_empty());
    }

    #[test]
    fn test_merge_deduplicates_by_url() {
        let first = NormalizedSearchResult {
            web: vec![
                WebResult::new("https://example.com/page", "Title 1", "Content 1"),
                WebResult::new("https://other.com", "Other", "Other content"),
            ],
            ..Default::default()
        };
        let second = NormalizedSearchResult {
            web: vec![WebResult::new("http://example.com/page/", "Title 2 Longer", "C")],
            ..Default::default()
        };

        let merged = Aggregator::default().merge(vec![
            ("primary".to_string(), first),
            ("searxng".to_string(), second),
        ]);

        assert_eq!(merged.web.len(), 2);
        assert_eq!(merged.web[0].url, "https://example.com/page");
        assert_eq!(merged.web[0].title, "Title 2 Longer");
        assert_eq!(merged.web[0].content, "Content 1");
        assert_eq!(merged.web[1].url, "https://other.com");
    }

    #[test]
    fn test_merge_keeps_paths_differing_in_case() {
        let mut first = NormalizedSearchResult::new();
        first.web.push(WebResult::new("https://X.com/A", "upper", ""));
        let mut second = NormalizedSearchResult::new();
        second.web.push(WebResult::new("https://x.com/a", "lower", ""));
        second.web.push(WebResult::new("https://x.com/A/", "same as first", ""));

        let merged = Aggregator::default().merge(vec![("one".into(), first), ("two".into(), second)]);
        assert_eq!(merged.web.len(), 2);
        assert_eq!(merged.web[0].title, "same as first");
        assert_eq!(merged.web[1].title, "lower");
    }

    #[test]
    fn test_merge_keeps_first_published_date() {
        let first = NormalizedSearchResult {
            news: vec![WebResult::new("https://news.example.com/a", "A", "")],
            ..Default::default()
        };
        let second = NormalizedSearchResult {
            news: vec![WebResult::new("https://news.example.com/a", "A", "").with_published_date("2024-05-01")],
            ..Default::default()
        };
        let merged = Aggregator::default().merge(vec![("a".into(), first), ("b".into(), second)]);
        assert_eq!(merged.news.len(), 1);
        assert_eq!(merged.news[0].published_date.as_deref(), Some("2024-05-01"));
    }

    #[test]
    fn test_merge_media_and_caps() {
        let mut first = NormalizedSearchResult::new();
        let mut second = NormalizedSearchResult::new();
        for i in 0..3 {
            first
                .images
                .push(ImageResult::new(format!("https://img.example.com/{i}.png"), "", ""));
            second
                .images
                .push(ImageResult::new(format!("https://img.example.com/{}.png", i + 2), "", ""));
            second
                .videos
                .push(VideoResult::new(format!("https://video.example.com/{i}"), "", "", ""));
        }

        let merged = Aggregator::new(4).merge(vec![("a".into(), first), ("b".into(), second)]);
        assert_eq!(merged.images.len(), 4);
        assert_eq!(merged.images[3].url, "https://img.example.com/3.png");
        assert_eq!(merged.videos.len(), 3);
    }
}
