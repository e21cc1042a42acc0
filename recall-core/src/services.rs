//! Collaborator interfaces consumed by the memory core.
//!
//! The importance scorer and keyword extractor are injected as trait
//! objects, alongside [`EmbeddingProvider`](crate::embedding::EmbeddingProvider).
//! All of them are synchronous from the core's point of view; a failing call
//! is retried by the caller through [`call_with_retry`] and escalates to
//! [`MemoryError::ExternalServiceUnavailable`] once the attempts run out.

use std::time::Duration;

use tracing::warn;

use crate::config::{MemorySettings, ServicesConfig};
use crate::error::{MemoryError, Result};
use crate::types::Keywords;

/// Keyword category for known characters.
pub const CHARACTERS: &str = "characters";
/// Keyword category for known items.
pub const ITEMS: &str = "items";
/// Keyword category for known locations.
pub const LOCATIONS: &str = "locations";
/// Keyword category for any other content word.
pub const MISC: &str = "misc";

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// Rates how salient a piece of text is to the agent.
pub trait ImportanceScorer: Send + Sync {
    /// Return an integer salience score, nominally within the configured
    /// importance range.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::Service`] if the scoring service fails.
    fn score_importance(&self, text: &str) -> Result<i64>;
}

/// Turns free text into categorized keywords.
pub trait KeywordExtractor: Send + Sync {
    /// Extract category → words associations from `text`.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::Service`] if extraction fails.
    fn extract_keywords(&self, text: &str) -> Result<Keywords>;
}

// ---------------------------------------------------------------------------
// Retry
// ---------------------------------------------------------------------------

/// Bounded retry for collaborator calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts per call, including the first. At least 1.
    pub max_attempts: u32,
    /// Pause between attempts.
    pub backoff: Duration,
}

impl RetryPolicy {
    /// A policy that tries exactly once.
    pub const ONCE: Self = Self {
        max_attempts: 1,
        backoff: Duration::ZERO,
    };

    /// `max_attempts` tries with no pause in between.
    #[must_use]
    pub fn attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff: Duration::ZERO,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&ServicesConfig::default())
    }
}

impl From<&ServicesConfig> for RetryPolicy {
    fn from(config: &ServicesConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            backoff: Duration::from_millis(config.retry_backoff_ms),
        }
    }
}

/// Call `f` until it succeeds or `policy.max_attempts` calls have failed.
///
/// # Errors
///
/// Returns [`MemoryError::ExternalServiceUnavailable`] carrying the last
/// failure message once every attempt has failed.
pub fn call_with_retry<T>(
    service: &'static str,
    policy: &RetryPolicy,
    mut f: impl FnMut() -> Result<T>,
) -> Result<T> {
    let attempts = policy.max_attempts.max(1);
    let mut last_error = String::new();
    for attempt in 1..=attempts {
        match f() {
            Ok(value) => return Ok(value),
            Err(e) => {
                last_error = e.to_string();
                warn!(service, attempt, max_attempts = attempts, error = %last_error, "service call failed");
                if attempt < attempts && !policy.backoff.is_zero() {
                    std::thread::sleep(policy.backoff);
                }
            }
        }
    }
    Err(MemoryError::ExternalServiceUnavailable {
        service,
        attempts,
        last_error,
    })
}

// ---------------------------------------------------------------------------
// Importance
// ---------------------------------------------------------------------------

/// Rate `text` with `scorer`, clamped into the configured range.
///
/// If the scorer exhausts its retries the configured neutral importance is
/// returned instead, so an observation is never dropped for lack of a score.
pub fn rate_importance(
    scorer: &dyn ImportanceScorer,
    text: &str,
    settings: &MemorySettings,
    policy: &RetryPolicy,
) -> i64 {
    match call_with_retry("importance", policy, || scorer.score_importance(text)) {
        Ok(raw) => raw.clamp(settings.min_importance, settings.max_importance),
        Err(e) => {
            warn!(error = %e, neutral = settings.neutral_importance, "using neutral importance");
            settings.neutral_importance
        }
    }
}

/// An importance scorer that rates everything the same.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedImportance(pub i64);

impl ImportanceScorer for FixedImportance {
    fn score_importance(&self, _text: &str) -> Result<i64> {
        Ok(self.0)
    }
}

// ---------------------------------------------------------------------------
// Vocabulary keyword extractor
// ---------------------------------------------------------------------------

const STOPWORDS: &[&str] = &[
    "a", "about", "after", "all", "also", "an", "and", "any", "are", "around", "as", "at", "be",
    "been", "before", "but", "by", "can", "could", "did", "do", "does", "for", "from", "had",
    "has", "have", "he", "her", "here", "him", "his", "how", "i", "if", "in", "into", "is", "it",
    "its", "just", "me", "my", "no", "not", "now", "of", "on", "or", "our", "out", "over", "she",
    "so", "some", "than", "that", "the", "their", "them", "then", "there", "these", "they",
    "this", "to", "up", "us", "very", "was", "we", "were", "what", "when", "where", "which",
    "while", "who", "will", "with", "would", "you", "your",
];

fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !(c.is_alphanumeric() || c == '\'' || c == '-'))
        .map(|t| t.trim_matches(|c| c == '\'' || c == '-').to_lowercase())
        .filter(|t| !t.is_empty())
        .collect()
}

/// Rule-based extractor driven by the world's known names.
///
/// Registered characters, items and locations (possibly multi-word) are
/// matched on word boundaries and filed under their category; any other
/// non-stopword of three or more letters lands in [`MISC`].
#[derive(Debug, Clone, Default)]
pub struct VocabularyKeywordExtractor {
    // (category, term tokens), longest term first across all categories
    vocabulary: Vec<(String, Vec<String>)>,
}

impl VocabularyKeywordExtractor {
    /// An extractor with no known names; everything goes to [`MISC`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a known name under `category`.
    pub fn register(&mut self, category: &str, term: &str) {
        let tokens = tokenize(term);
        if tokens.is_empty() {
            return;
        }
        let entry = (category.to_lowercase(), tokens);
        if !self.vocabulary.contains(&entry) {
            self.vocabulary.push(entry);
            self.vocabulary.sort_by(|a, b| b.1.len().cmp(&a.1.len()));
        }
    }

    /// Builder-style [`VocabularyKeywordExtractor::register`].
    #[must_use]
    pub fn with_terms<'a>(mut self, category: &str, terms: impl IntoIterator<Item = &'a str>) -> Self {
        for term in terms {
            self.register(category, term);
        }
        self
    }
}

impl KeywordExtractor for VocabularyKeywordExtractor {
    fn extract_keywords(&self, text: &str) -> Result<Keywords> {
        let tokens = tokenize(text);
        let mut consumed = vec![false; tokens.len()];
        let mut keywords = Keywords::new();

        for (category, term) in &self.vocabulary {
            let n = term.len();
            if n > tokens.len() {
                continue;
            }
            for start in 0..=tokens.len() - n {
                let window = &tokens[start..start + n];
                if window == term.as_slice() && !consumed[start..start + n].iter().any(|&c| c) {
                    keywords.insert(category, &term.join(" "));
                    consumed[start..start + n].iter_mut().for_each(|c| *c = true);
                }
            }
        }

        for (token, used) in tokens.iter().zip(&consumed) {
            if !used && token.chars().count() >= 3 && !STOPWORDS.contains(&token.as_str()) {
                keywords.insert(MISC, token);
            }
        }
        Ok(keywords)
    }
}
