//! Configuration for the recall memory system.
//!
//! Maps directly to `recall.toml`. Every field has a default, so an empty
//! file is a valid configuration.

use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

use crate::error::{MemoryError, Result};

/// Top-level configuration, loadable from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecallConfig {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,
    /// Per-agent memory store behavior.
    #[serde(default)]
    pub memory: MemorySettings,
    /// Retrieval algorithm settings.
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    /// Retry policy for collaborator calls.
    #[serde(default)]
    pub services: ServicesConfig,
    /// Default context budget for downstream prompts.
    #[serde(default)]
    pub budget: BudgetConfig,
    /// LLM / embedding backend settings.
    #[serde(default)]
    pub llm: LlmConfig,
}

impl RecallConfig {
    /// Load configuration from a TOML string.
    ///
    /// # Errors
    /// Returns `MemoryError::Config` if the TOML is invalid or fails
    /// [`RecallConfig::validate`].
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(toml_str).map_err(|e| MemoryError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Check value ranges that serde cannot express.
    ///
    /// # Errors
    /// Returns `MemoryError::Config` naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        let gamma = self.retrieval.gamma;
        if !(gamma > 0.0 && gamma < 1.0) {
            return Err(MemoryError::Config(format!(
                "retrieval.gamma must be in (0, 1), got {gamma}"
            )));
        }
        let w = &self.retrieval.weights;
        for (name, value) in [
            ("recency", w.recency),
            ("importance", w.importance),
            ("relevance", w.relevance),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(MemoryError::Config(format!(
                    "retrieval.weights.{name} must be a non-negative number, got {value}"
                )));
            }
        }
        if self.services.max_attempts == 0 {
            return Err(MemoryError::Config(
                "services.max_attempts must be at least 1".to_string(),
            ));
        }
        let m = &self.memory;
        if m.min_importance > m.max_importance {
            return Err(MemoryError::Config(format!(
                "memory.min_importance ({}) exceeds memory.max_importance ({})",
                m.min_importance, m.max_importance
            )));
        }
        if !m.importance_range().contains(&m.neutral_importance) {
            return Err(MemoryError::Config(format!(
                "memory.neutral_importance ({}) lies outside [{}, {}]",
                m.neutral_importance, m.min_importance, m.max_importance
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// General system settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error. `RUST_LOG` wins if set.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Emit logs as JSON lines instead of human-readable text.
    #[serde(default)]
    pub json_logs: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}

/// What `append` does when the embedding service exhausts its retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingFailurePolicy {
    /// Store a zero vector so the observation is never lost. It scores 0
    /// similarity against every query until revised.
    #[default]
    ZeroVector,
    /// Fail the append; nothing is registered.
    Abort,
}

/// Per-agent memory store behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemorySettings {
    /// Lowest importance the scoring service may return.
    #[serde(default = "default_min_importance")]
    pub min_importance: i64,
    /// Highest importance the scoring service may return.
    #[serde(default = "default_max_importance")]
    pub max_importance: i64,
    /// Importance recorded when the scoring service is unavailable.
    #[serde(default = "default_neutral_importance")]
    pub neutral_importance: i64,
    /// Degraded-append policy for embedding failures.
    #[serde(default)]
    pub on_embedding_failure: EmbeddingFailurePolicy,
}

impl MemorySettings {
    /// The inclusive importance range.
    #[must_use]
    pub fn importance_range(&self) -> RangeInclusive<i64> {
        self.min_importance..=self.max_importance
    }
}

impl Default for MemorySettings {
    fn default() -> Self {
        Self {
            min_importance: 1,
            max_importance: 10,
            neutral_importance: 5,
            on_embedding_failure: EmbeddingFailurePolicy::default(),
        }
    }
}

/// Memory retrieval algorithm settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Recency decay per observation of age, in (0, 1).
    #[serde(default = "default_gamma")]
    pub gamma: f64,
    /// How many recent observations seed the keyword search.
    #[serde(default = "default_5_usize")]
    pub lookback: usize,
    /// Results returned when the caller gives no limit. 0 = everything.
    #[serde(default)]
    pub default_limit: usize,
    /// Per-dimension weights.
    #[serde(default)]
    pub weights: RetrievalWeights,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            gamma: 0.95,
            lookback: 5,
            default_limit: 0,
            weights: RetrievalWeights::default(),
        }
    }
}

/// Retrieval scoring weights. The combined score lies in
/// `[0, recency + importance + relevance]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetrievalWeights {
    /// Weight for recency.
    #[serde(default = "default_1_0")]
    pub recency: f64,
    /// Weight for importance.
    #[serde(default = "default_1_0")]
    pub importance: f64,
    /// Weight for semantic relevance.
    #[serde(default = "default_1_0")]
    pub relevance: f64,
}

impl RetrievalWeights {
    /// Upper bound of the combined score.
    #[must_use]
    pub fn total(&self) -> f64 {
        self.recency + self.importance + self.relevance
    }
}

impl Default for RetrievalWeights {
    fn default() -> Self {
        Self {
            recency: 1.0,
            importance: 1.0,
            relevance: 1.0,
        }
    }
}

/// Retry policy for embedding, importance and keyword services.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServicesConfig {
    /// Attempts per call, including the first.
    #[serde(default = "default_3")]
    pub max_attempts: u32,
    /// Pause between attempts in milliseconds.
    #[serde(default)]
    pub retry_backoff_ms: u64,
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_backoff_ms: 0,
        }
    }
}

/// Default context budget.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetConfig {
    /// Token budget for retrieved context.
    #[serde(default = "default_2048")]
    pub max_tokens: usize,
    /// Maximum number of items. Unset = unbounded.
    #[serde(default)]
    pub max_items: Option<usize>,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            max_tokens: 2048,
            max_items: None,
        }
    }
}

/// LLM and embedding backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Provider: "ollama", "openai", "none".
    #[serde(default = "default_ollama")]
    pub provider: String,
    /// Base URL for the API.
    #[serde(default = "default_ollama_url")]
    pub base_url: String,
    /// Environment variable holding the API key (OpenAI-compatible only).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    /// Model used for importance scoring and other text generation.
    #[serde(default = "default_generation_model")]
    pub generation_model: String,
    /// Model used for embeddings.
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
    /// Hard timeout for any call in milliseconds.
    #[serde(default = "default_5000")]
    pub request_timeout_ms: u64,
    /// Retries inside the HTTP client, on top of the caller's retry policy.
    #[serde(default)]
    pub max_retries: u32,
    /// Capacity of the text → embedding memo.
    #[serde(default = "default_1024")]
    pub embedding_cache_size: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "ollama".to_string(),
            base_url: "http://localhost:11434".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            generation_model: "qwen2.5:1.5b".to_string(),
            embedding_model: "all-minilm".to_string(),
            request_timeout_ms: 5000,
            max_retries: 0,
            embedding_cache_size: 1024,
        }
    }
}

// ---------------------------------------------------------------------------
// Serde default helpers
// ---------------------------------------------------------------------------

fn default_log_level() -> String { "info".to_string() }
fn default_ollama() -> String { "ollama".to_string() }
fn default_ollama_url() -> String { "http://localhost:11434".to_string() }
fn default_api_key_env() -> String { "OPENAI_API_KEY".to_string() }
fn default_generation_model() -> String { "qwen2.5:1.5b".to_string() }
fn default_embedding_model() -> String { "all-minilm".to_string() }
fn default_gamma() -> f64 { 0.95 }
fn default_1_0() -> f64 { 1.0 }
fn default_min_importance() -> i64 { 1 }
fn default_max_importance() -> i64 { 10 }
fn default_neutral_importance() -> i64 { 5 }
fn default_3() -> u32 { 3 }
fn default_5_usize() -> usize { 5 }
fn default_1024() -> usize { 1024 }
fn default_2048() -> usize { 2048 }
fn default_5000() -> u64 { 5000 }

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_gives_defaults() {
        let config = RecallConfig::from_toml("").expect("empty config is valid");
        assert!((config.retrieval.gamma - 0.95).abs() < f64::EPSILON);
        assert_eq!(config.retrieval.lookback, 5);
        assert!((config.retrieval.weights.total() - 3.0).abs() < f64::EPSILON);
        assert_eq!(config.memory.on_embedding_failure, EmbeddingFailurePolicy::ZeroVector);
        assert_eq!(config.services.max_attempts, 3);
    }

    #[test]
    fn partial_toml_overrides() {
        let config = RecallConfig::from_toml(
            r#"
            [retrieval]
            gamma = 0.9
            [retrieval.weights]
            relevance = 2.0
            [memory]
            on_embedding_failure = "abort"
            "#,
        )
        .expect("valid");
        assert!((config.retrieval.gamma - 0.9).abs() < f64::EPSILON);
        assert!((config.retrieval.weights.relevance - 2.0).abs() < f64::EPSILON);
        assert!((config.retrieval.weights.recency - 1.0).abs() < f64::EPSILON);
        assert_eq!(config.memory.on_embedding_failure, EmbeddingFailurePolicy::Abort);
    }

    #[test]
    fn gamma_out_of_range_rejected() {
        for bad in ["1.0", "0.0", "1.5"] {
            let toml = format!("[retrieval]\ngamma = {bad}\n");
            assert!(matches!(
                RecallConfig::from_toml(&toml),
                Err(MemoryError::Config(_))
            ));
        }
    }

    #[test]
    fn negative_weight_rejected() {
        let err = RecallConfig::from_toml("[retrieval.weights]\nimportance = -1.0\n").expect_err("should fail");
        assert!(err.to_string().contains("importance"));
    }

    #[test]
    fn zero_attempts_rejected() {
        assert!(RecallConfig::from_toml("[services]\nmax_attempts = 0\n").is_err());
    }

    #[test]
    fn neutral_importance_must_be_in_range() {
        assert!(RecallConfig::from_toml("[memory]\nneutral_importance = 42\n").is_err());
    }

    #[test]
    fn loads_from_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("recall.toml");
        std::fs::write(&path, "[retrieval]\nlookback = 8\n").expect("write");
        let config = RecallConfig::from_file(&path).expect("load");
        assert_eq!(config.retrieval.lookback, 8);
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = RecallConfig::from_file(std::path::Path::new("/nonexistent/recall.toml"))
            .expect_err("should fail");
        assert!(matches!(err, MemoryError::Io(_)));
    }
}
