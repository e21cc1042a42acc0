//! # recall-llm: model-server collaborators for recall
//!
//! Provides the embedding, importance-scoring and keyword-extraction
//! services the memory core depends on, backed by:
//!   - **Ollama** (local, recommended default)
//!   - **OpenAI-compatible API** (also works with Together, vLLM, etc.)
//!
//! The HTTP client is async; [`BlockingServices`] adapts it to the core's
//! synchronous collaborator traits and memoizes embeddings by text.
//!
//! ```text
//! AgentMemory ──► EmbeddingProvider ─┐
//!             ──► ImportanceScorer  ─┼─► BlockingServices ─► LlmClient ─► HTTP
//!             ──► KeywordExtractor  ─┘
//! ```

#![deny(clippy::unwrap_used)]
#![deny(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_possible_truncation)]

pub mod client;
pub mod error;
pub mod prompt;
pub mod services;
pub mod types;

pub use client::{LlmClient, LlmProvider};
pub use error::LlmError;
pub use services::BlockingServices;
pub use types::{LlmRequest, LlmResponse};
