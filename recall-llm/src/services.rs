//! Blocking adapters from [`LlmClient`] to the core's collaborator traits.
//!
//! The memory core calls its collaborators synchronously. [`BlockingServices`]
//! owns a small tokio runtime and drives the async client to completion on
//! each call, so it must not be used from inside another async runtime.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use lru::LruCache;
use parking_lot::Mutex;
use recall_core::config::{LlmConfig, RecallConfig};
use recall_core::error::Result;
use recall_core::services::{CHARACTERS, ITEMS, LOCATIONS};
use recall_core::{Embedding, EmbeddingProvider, ImportanceScorer, KeywordExtractor, Keywords, MemoryError, Services};
use tokio::runtime::Runtime;
use tracing::debug;

use crate::client::LlmClient;
use crate::error::LlmError;
use crate::prompt::{PromptEngine, PromptId, parse_importance, parse_keywords};
use crate::types::LlmRequest;

/// Dimensions assumed until the first embedding comes back.
pub const DEFAULT_DIMENSIONS: usize = 384;

/// Model-backed embeddings, importance scoring and keyword extraction.
pub struct BlockingServices {
    runtime: Runtime,
    client: Arc<LlmClient>,
    prompts: PromptEngine,
    cache: Mutex<LruCache<String, Embedding>>,
    dimensions: AtomicUsize,
    model: String,
    importance_min: i64,
    importance_max: i64,
    vocabulary: Keywords,
}

impl BlockingServices {
    /// Wrap `client` with a fresh single-threaded runtime.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::ConfigError`] if the runtime cannot be started.
    pub fn new(client: LlmClient, llm: &LlmConfig, importance_range: (i64, i64)) -> std::result::Result<Self, LlmError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| LlmError::ConfigError(format!("failed to start runtime: {e}")))?;
        let capacity = NonZeroUsize::new(llm.embedding_cache_size).unwrap_or(NonZeroUsize::MIN);
        Ok(Self {
            runtime,
            client: Arc::new(client),
            prompts: PromptEngine::builtin(),
            cache: Mutex::new(LruCache::new(capacity)),
            dimensions: AtomicUsize::new(DEFAULT_DIMENSIONS),
            model: llm.embedding_model.clone(),
            importance_min: importance_range.0,
            importance_max: importance_range.1,
            vocabulary: Keywords::new(),
        })
    }

    /// Build the client and adapters from a full config.
    ///
    /// # Errors
    ///
    /// See [`LlmClient::from_config`] and [`BlockingServices::new`].
    pub fn from_config(config: &RecallConfig) -> std::result::Result<Self, LlmError> {
        let client = LlmClient::from_config(&config.llm)?;
        Self::new(
            client,
            &config.llm,
            (config.memory.min_importance, config.memory.max_importance),
        )
    }

    /// Use `prompts` instead of the built-in templates.
    #[must_use]
    pub fn with_prompts(mut self, prompts: PromptEngine) -> Self {
        self.prompts = prompts;
        self
    }

    /// Known characters, items and locations shown to the keyword prompt.
    #[must_use]
    pub fn with_vocabulary(mut self, vocabulary: Keywords) -> Self {
        self.vocabulary = vocabulary;
        self
    }

    /// The underlying client.
    #[must_use]
    pub fn client(&self) -> &Arc<LlmClient> {
        &self.client
    }

    /// Number of memoized embeddings.
    #[must_use]
    pub fn cached_embeddings(&self) -> usize {
        self.cache.lock().len()
    }

    /// Share one instance as all three collaborators.
    #[must_use]
    pub fn into_services(self) -> Services {
        let shared = Arc::new(self);
        Services {
            embedder: Arc::clone(&shared) as Arc<dyn EmbeddingProvider>,
            importance: Arc::clone(&shared) as Arc<dyn ImportanceScorer>,
            keywords: shared,
        }
    }

    fn complete(&self, id: PromptId, vars: &[(&str, &str)]) -> std::result::Result<String, LlmError> {
        let (system, user) = self.prompts.render(id, vars)?;
        let mut request = LlmRequest::new(system, user).with_timeout(self.client.timeout_ms());
        if let Some(tpl) = self.prompts.get(id) {
            request = request.with_max_tokens(tpl.max_tokens);
            request.temperature = tpl.temperature;
            if tpl.json {
                request = request.json();
            }
        }
        let response = self.runtime.block_on(self.client.generate(&request))?;
        debug!(prompt = %id, latency_ms = response.latency_ms, "completion received");
        Ok(response.text)
    }

    fn known(&self, category: &str) -> String {
        self.vocabulary.words(category).collect::<Vec<_>>().join(", ")
    }
}

impl EmbeddingProvider for BlockingServices {
    fn embed(&self, text: &str) -> Result<Embedding> {
        if let Some(hit) = self.cache.lock().get(text) {
            return Ok(hit.clone());
        }
        let vector = self.runtime.block_on(self.client.embed(text)).map_err(MemoryError::from)?;
        self.dimensions.store(vector.len(), Ordering::Relaxed);
        let embedding = Embedding(vector);
        self.cache.lock().put(text.to_string(), embedding.clone());
        Ok(embedding)
    }

    fn dimensions(&self) -> usize {
        self.dimensions.load(Ordering::Relaxed)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

impl ImportanceScorer for BlockingServices {
    fn score_importance(&self, text: &str) -> Result<i64> {
        let min = self.importance_min.to_string();
        let max = self.importance_max.to_string();
        let completion = self.complete(PromptId::Importance, &[
            ("min", &min),
            ("max", &max),
            ("description", text),
        ])?;
        parse_importance(&completion).ok_or_else(|| {
            MemoryError::Service(format!("importance response has no rating: {completion:?}"))
        })
    }
}

impl KeywordExtractor for BlockingServices {
    fn extract_keywords(&self, text: &str) -> Result<Keywords> {
        let characters = self.known(CHARACTERS);
        let items = self.known(ITEMS);
        let locations = self.known(LOCATIONS);
        let completion = self.complete(PromptId::Keywords, &[
            ("characters", &characters),
            ("items", &items),
            ("locations", &locations),
            ("text", text),
        ])?;
        Ok(parse_keywords(&completion)?)
    }
}

impl std::fmt::Debug for BlockingServices {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockingServices")
            .field("model", &self.model)
            .field("available", &self.client.is_available())
            .field("cached", &self.cached_embeddings())
            .finish_non_exhaustive()
    }
}
