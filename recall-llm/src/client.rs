//! LLM client: unified interface for Ollama and OpenAI-compatible backends.
//!
//! Covers the two calls the memory core needs from a model server: text
//! generation (importance scoring, keyword extraction) and embeddings.

use std::time::{Duration, Instant};

use recall_core::config::LlmConfig;
use reqwest::Client;
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::error::LlmError;
use crate::types::{LlmRequest, LlmResponse};

/// Provider backend for LLM inference.
#[derive(Debug, Clone)]
pub enum LlmProvider {
    /// Ollama running locally.
    Ollama {
        /// Server root, e.g. `http://localhost:11434`.
        base_url: String,
    },
    /// OpenAI-compatible API.
    OpenAiCompatible {
        /// API root without the `/v1` suffix.
        base_url: String,
        /// Bearer token.
        api_key: String,
    },
    /// No backend; every call fails with [`LlmError::Unavailable`].
    None,
}

/// The client that routes requests to the configured backend.
pub struct LlmClient {
    provider: LlmProvider,
    http: Client,
    generation_model: String,
    embedding_model: String,
    max_retries: u32,
    timeout_ms: u64,
}

impl LlmClient {
    /// Create a new client.
    #[must_use]
    pub fn new(
        provider: LlmProvider,
        generation_model: impl Into<String>,
        embedding_model: impl Into<String>,
        max_retries: u32,
    ) -> Self {
        Self {
            provider,
            http: Client::new(),
            generation_model: generation_model.into(),
            embedding_model: embedding_model.into(),
            max_retries,
            timeout_ms: 5000,
        }
    }

    /// Build a client from the `[llm]` config section.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::ConfigError`] for an unknown provider, or when the
    /// OpenAI-compatible provider is selected and the API key variable is
    /// unset.
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        let provider = match config.provider.as_str() {
            "ollama" => LlmProvider::Ollama {
                base_url: config.base_url.clone(),
            },
            "openai" => {
                let api_key = std::env::var(&config.api_key_env).map_err(|_| {
                    LlmError::ConfigError(format!("environment variable {} is not set", config.api_key_env))
                })?;
                LlmProvider::OpenAiCompatible {
                    base_url: config.base_url.clone(),
                    api_key,
                }
            }
            "none" => LlmProvider::None,
            other => {
                return Err(LlmError::ConfigError(format!("unknown provider '{other}'")));
            }
        };
        let mut client = Self::new(
            provider,
            config.generation_model.clone(),
            config.embedding_model.clone(),
            config.max_retries,
        );
        client.timeout_ms = config.request_timeout_ms;
        Ok(client)
    }

    /// Create a client with no backend.
    #[must_use]
    pub fn none() -> Self {
        Self::new(LlmProvider::None, String::new(), String::new(), 0)
    }

    /// Check if the client has a backend configured.
    #[must_use]
    pub fn is_available(&self) -> bool {
        !matches!(self.provider, LlmProvider::None)
    }

    /// Default timeout for embedding calls, in milliseconds.
    #[must_use]
    pub fn timeout_ms(&self) -> u64 {
        self.timeout_ms
    }

    /// Generate a completion.
    ///
    /// # Errors
    ///
    /// Returns an error if no backend is configured, the response cannot be
    /// parsed, or every attempt fails.
    pub async fn generate(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        let model = &self.generation_model;
        let (url, body, auth) = match &self.provider {
            LlmProvider::None => return Err(LlmError::Unavailable("No LLM provider configured".into())),
            LlmProvider::Ollama { base_url } => {
                let mut body = json!({
                    "model": model,
                    "prompt": format!("{}\n\n{}", request.system, request.user),
                    "stream": false,
                    "options": {
                        "temperature": request.temperature,
                        "num_predict": request.max_tokens,
                    }
                });
                if request.json_mode {
                    body["format"] = json!("json");
                }
                (format!("{base_url}/api/generate"), body, None)
            }
            LlmProvider::OpenAiCompatible { base_url, api_key } => {
                let mut body = json!({
                    "model": model,
                    "messages": [
                        { "role": "system", "content": request.system },
                        { "role": "user", "content": request.user },
                    ],
                    "max_tokens": request.max_tokens,
                    "temperature": request.temperature,
                });
                if request.json_mode {
                    body["response_format"] = json!({ "type": "json_object" });
                }
                (format!("{base_url}/v1/chat/completions"), body, Some(api_key.as_str()))
            }
        };

        let start = Instant::now();
        let json = self.post_json(&url, &body, auth, request.timeout_ms).await?;
        let latency_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

        let (text, tokens) = match self.provider {
            LlmProvider::OpenAiCompatible { .. } => (
                json["choices"][0]["message"]["content"].as_str(),
                json["usage"]["completion_tokens"].as_u64(),
            ),
            _ => (json["response"].as_str(), json["eval_count"].as_u64()),
        };
        let text = text.ok_or_else(|| LlmError::ParseError(format!("no completion text in {json}")))?;

        Ok(LlmResponse {
            text: text.to_string(),
            tokens_generated: u32::try_from(tokens.unwrap_or(0)).unwrap_or(u32::MAX),
            latency_ms,
            model: model.clone(),
        })
    }

    /// Embed `text` with the configured embedding model.
    ///
    /// # Errors
    ///
    /// Returns an error if no backend is configured, the response carries no
    /// vector, or every attempt fails.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        let model = &self.embedding_model;
        let (url, body, auth) = match &self.provider {
            LlmProvider::None => return Err(LlmError::Unavailable("No LLM provider configured".into())),
            LlmProvider::Ollama { base_url } => (
                format!("{base_url}/api/embeddings"),
                json!({ "model": model, "prompt": text }),
                None,
            ),
            LlmProvider::OpenAiCompatible { base_url, api_key } => (
                format!("{base_url}/v1/embeddings"),
                json!({ "model": model, "input": text }),
                Some(api_key.as_str()),
            ),
        };

        let json = self.post_json(&url, &body, auth, self.timeout_ms).await?;
        let vector = match self.provider {
            LlmProvider::OpenAiCompatible { .. } => &json["data"][0]["embedding"],
            _ => &json["embedding"],
        };
        parse_vector(vector)
    }

    /// POST `body`, retrying up to `max_retries` extra times on transport
    /// errors and non-success statuses.
    async fn post_json(
        &self,
        url: &str,
        body: &Value,
        bearer: Option<&str>,
        timeout_ms: u64,
    ) -> Result<Value, LlmError> {
        let mut last_error = String::new();
        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                debug!(url, "Retrying LLM call (attempt {}/{})", attempt + 1, self.max_retries + 1);
            }

            let mut builder = self
                .http
                .post(url)
                .json(body)
                .timeout(Duration::from_millis(timeout_ms));
            if let Some(key) = bearer {
                builder = builder.header("Authorization", format!("Bearer {key}"));
            }

            match builder.send().await {
                Ok(resp) if resp.status().is_success() => {
                    return resp
                        .json::<Value>()
                        .await
                        .map_err(|e| LlmError::ParseError(e.to_string()));
                }
                Ok(resp) => {
                    last_error = format!("HTTP {}: {}", resp.status(), resp.text().await.unwrap_or_default());
                    warn!(url, "LLM backend returned error: {}", last_error);
                }
                Err(e) => {
                    let err = if e.is_timeout() {
                        LlmError::Timeout(timeout_ms)
                    } else {
                        LlmError::from(e)
                    };
                    warn!(url, "{}", err);
                    last_error = err.to_string();
                }
            }
        }

        Err(LlmError::RetriesExhausted {
            attempts: self.max_retries + 1,
            last_error,
        })
    }
}

/// Read a JSON array of numbers as an embedding vector.
fn parse_vector(value: &Value) -> Result<Vec<f32>, LlmError> {
    let items = value
        .as_array()
        .filter(|items| !items.is_empty())
        .ok_or_else(|| LlmError::ParseError("response carries no embedding".into()))?;
    items
        .iter()
        .map(|v| {
            v.as_f64()
                .map(|f| f as f32)
                .ok_or_else(|| LlmError::ParseError(format!("non-numeric embedding component {v}")))
        })
        .collect()
}
