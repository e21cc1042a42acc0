//! Core types for LLM requests and responses.

use serde::{Deserialize, Serialize};

/// A text-generation request.
#[derive(Debug, Clone, Serialize)]
pub struct LlmRequest {
    /// System prompt (role, rules, output format).
    pub system: String,
    /// User prompt (the text to judge or transform).
    pub user: String,
    /// Maximum tokens to generate.
    pub max_tokens: u32,
    /// Temperature (0.0 = deterministic, 1.0 = creative).
    pub temperature: f32,
    /// Ask the backend for JSON-only output.
    pub json_mode: bool,
    /// Request timeout in milliseconds.
    pub timeout_ms: u64,
}

impl LlmRequest {
    /// A short, low-temperature request suitable for scoring and extraction.
    #[must_use]
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
            max_tokens: 64,
            temperature: 0.0,
            json_mode: false,
            timeout_ms: 5000,
        }
    }

    /// Set the generation limit.
    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Request JSON-only output.
    #[must_use]
    pub fn json(mut self) -> Self {
        self.json_mode = true;
        self
    }

    /// Set the timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }
}

/// A response from the LLM.
#[derive(Debug, Clone, Deserialize)]
pub struct LlmResponse {
    /// The generated text.
    pub text: String,
    /// How many tokens were generated.
    pub tokens_generated: u32,
    /// Latency in milliseconds.
    pub latency_ms: u64,
    /// Which model was used.
    pub model: String,
}

/// Structured keyword extraction output (matches the keyword prompt).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KeywordResponse {
    /// Named characters.
    #[serde(default)]
    pub characters: Vec<String>,
    /// Objects and items.
    #[serde(default)]
    pub items: Vec<String>,
    /// Places.
    #[serde(default)]
    pub locations: Vec<String>,
    /// Other salient words.
    #[serde(default)]
    pub misc: Vec<String>,
}
