//! Search query representation and normalization.

use serde::{Deserialize, Serialize};

use crate::config::QueryLimits;
use crate::{Result, SearchError};

/// A search query with its optional provider hints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchQuery {
    /// The search terms.
    pub query: String,
    /// Language/locale (e.g., "en-US").
    pub language: Option<String>,
    /// Engines requested from meta-search providers (e.g., "google,bing").
    pub engines: Vec<String>,
}

impl SearchQuery {
    /// Creates a new search query with the given terms.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            language: None,
            engines: Vec::new(),
        }
    }

    /// Sets the language/locale.
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    /// Sets specific engines for meta-search providers.
    pub fn with_engines(mut self, engines: Vec<String>) -> Self {
        self.engines = engines;
        self
    }

    /// Returns a copy whose terms satisfy the provider input limits.
    ///
    /// Fails with [`SearchError::InvalidQuery`] if nothing is left after trimming.
    pub fn normalized(&self, limits: &QueryLimits) -> Result<Self> {
        let query = truncate_query(&self.query, limits.max_words, limits.max_chars);
        if query.is_empty() {
            return Err(SearchError::InvalidQuery("Query cannot be empty".into()));
        }
        Ok(Self {
            query,
            ..self.clone()
        })
    }
}

/// Trims `raw` and caps it at `max_words` words and `max_chars` characters.
///
/// A query already inside both limits is returned trimmed but otherwise
/// untouched. Character truncation cuts at the last whitespace inside the
/// budget, and only falls back to a hard cut when the first word alone is
/// longer than the budget.
pub fn truncate_query(raw: &str, max_words: usize, max_chars: usize) -> String {
    if max_words == 0 {
        return String::new();
    }
    let trimmed = raw.trim();
    let text = &trimmed[..word_cap_end(trimmed, max_words)];

    if text.chars().count() <= max_chars {
        return text.to_string();
    }

    let hard_end = text
        .char_indices()
        .nth(max_chars)
        .map(|(i, _)| i)
        .unwrap_or(text.len());
    let budget = &text[..hard_end];

    // a boundary right after the budget means the last word fits whole
    let next_is_space = text[hard_end..].starts_with(char::is_whitespace);
    let cut = if next_is_space {
        budget
    } else {
        match budget.rfind(char::is_whitespace) {
            Some(pos) if pos > 0 => &budget[..pos],
            _ => budget,
        }
    };

    cut.trim_end().to_string()
}

/// Byte offset just past the `max_words`-th word, or the full length.
fn word_cap_end(text: &str, max_words: usize) -> usize {
    let mut words = 0;
    let mut in_word = false;
    for (i, c) in text.char_indices() {
        if c.is_whitespace() {
            if in_word && words == max_words {
                return i;
            }
            in_word = false;
        } else if !in_word {
            in_word = true;
            words += 1;
        }
    }
    text.len()
}
