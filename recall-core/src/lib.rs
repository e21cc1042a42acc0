//! # recall core library
//!
//! Per-agent associative memory for text-adventure characters whose
//! decisions come from a text-generation service.
//!
//! Every agent gets an [`AgentMemory`] wrapping:
//!
//! - a [`MemoryStore`]: append-only log of [`Observation`]s (actions,
//!   dialogue, percepts, reflections) with keyword, type and round indices
//!   and one cached embedding per observation,
//! - a [`Retriever`]: turns a query into keyword-matched candidates and
//!   ranks them by normalized recency, importance and relevance,
//! - the collaborators both depend on ([`EmbeddingProvider`],
//!   [`ImportanceScorer`], [`KeywordExtractor`]), injected at construction.
//!
//! [`budget::trim`] then fits whatever a consumer assembled into a token
//! budget before it goes to the text-generation call.
//!
//! ## Ordering contract
//!
//! Retrieval results are sorted **ascending**: least relevant first, most
//! relevant last, so the strongest memories sit next to whatever context a
//! prompt appends after them.

#![deny(clippy::unwrap_used)]
#![deny(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_precision_loss)]

pub mod agent;
pub mod budget;
pub mod config;
pub mod embedding;
pub mod error;
pub mod memory;
pub mod observation;
pub mod retrieval;
pub mod services;
pub mod telemetry;
pub mod types;

pub use agent::{AgentMemory, Services};
pub use config::RecallConfig;
pub use embedding::EmbeddingProvider;
pub use error::MemoryError;
pub use memory::MemoryStore;
pub use observation::{Observation, ObservationInput};
pub use retrieval::Retriever;
pub use services::{ImportanceScorer, KeywordExtractor};
pub use types::*;
