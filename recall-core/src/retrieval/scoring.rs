//! Per-dimension scoring and ranking of retrieval candidates.
//!
//! Score = w_rec·Recency(m) + w_imp·Importance(m) + w_rel·Relevance(m)
//!
//! Where, before normalization:
//!   Recency(m)    = γ^(N − id)        N = observations in the store
//!   Importance(m) = stored importance
//!   Relevance(m)  = cos(query, m), or the mean cosine against the default
//!                   queries when no query is given
//!
//! Each dimension is min-max scaled to [0, 1] over the candidate set only.
//! A dimension with no spread maps to [`NEUTRAL_SCORE`] for every candidate.

use ordered_float::OrderedFloat;

use crate::config::RetrievalWeights;
use crate::embedding::cosine_similarity;
use crate::memory::MemoryStore;
use crate::types::{Embedding, ObservationId};

/// Normalized value of a dimension whose raw values are all equal.
pub const NEUTRAL_SCORE: f64 = 0.5;

/// Normalized per-dimension scores of one candidate, before weighting.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ScoreBreakdown {
    /// Recency in [0, 1].
    pub recency: f64,
    /// Importance in [0, 1].
    pub importance: f64,
    /// Relevance in [0, 1].
    pub relevance: f64,
}

/// A ranked candidate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredObservation {
    /// The observation.
    pub id: ObservationId,
    /// Weighted sum of the breakdown.
    pub score: f64,
    /// Per-dimension contribution before weighting.
    pub breakdown: ScoreBreakdown,
}

/// What relevance is measured against.
#[derive(Debug, Clone, Copy)]
pub enum RelevanceTarget<'a> {
    /// An explicit query embedding.
    Query(&'a Embedding),
    /// The mean similarity against a cached set of default queries. An empty
    /// set yields a degenerate (neutral) relevance dimension.
    Defaults(&'a [Embedding]),
}

/// Min-max scale `raw` into [0, 1].
///
/// Non-finite inputs are treated as 0. If every value is equal the result is
/// [`NEUTRAL_SCORE`] throughout.
#[must_use]
pub fn normalize(raw: &[f64]) -> Vec<f64> {
    let clean: Vec<f64> = raw
        .iter()
        .map(|&v| if v.is_finite() { v } else { 0.0 })
        .collect();
    let (min, max) = clean
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    let range = max - min;
    if !(range > 0.0) {
        return vec![NEUTRAL_SCORE; clean.len()];
    }
    clean.iter().map(|&v| ((v - min) / range).clamp(0.0, 1.0)).collect()
}

/// Raw recency `γ^(total − id)` for each candidate.
#[must_use]
pub fn recency_scores(candidates: &[ObservationId], total: usize, gamma: f64) -> Vec<f64> {
    candidates
        .iter()
        .map(|id| {
            let age = total.saturating_sub(id.index());
            gamma.powf(age as f64)
        })
        .collect()
}

/// Raw importance of each candidate. Unknown ids score 0.
#[must_use]
pub fn importance_scores(store: &MemoryStore, candidates: &[ObservationId]) -> Vec<f64> {
    candidates
        .iter()
        .map(|&id| store.get(id).map_or(0.0, |o| o.importance as f64))
        .collect()
}

/// Raw relevance of each candidate against `target`. Unknown ids score 0.
#[must_use]
pub fn relevance_scores(
    store: &MemoryStore,
    candidates: &[ObservationId],
    target: RelevanceTarget<'_>,
) -> Vec<f64> {
    candidates
        .iter()
        .map(|&id| {
            let Ok(embedding) = store.embedding(id) else {
                return 0.0;
            };
            match target {
                RelevanceTarget::Query(query) => f64::from(cosine_similarity(embedding, query)),
                RelevanceTarget::Defaults([]) => 0.0,
                RelevanceTarget::Defaults(defaults) => {
                    let sum: f64 = defaults
                        .iter()
                        .map(|d| f64::from(cosine_similarity(embedding, d)))
                        .sum();
                    sum / defaults.len() as f64
                }
            }
        })
        .collect()
}

/// Score `candidates` and sort them ascending by score, least relevant
/// first. Equal scores order by ascending id.
#[must_use]
pub fn rank(
    store: &MemoryStore,
    candidates: &[ObservationId],
    target: RelevanceTarget<'_>,
    gamma: f64,
    weights: &RetrievalWeights,
) -> Vec<ScoredObservation> {
    let recency = normalize(&recency_scores(candidates, store.len(), gamma));
    let importance = normalize(&importance_scores(store, candidates));
    let relevance = normalize(&relevance_scores(store, candidates, target));

    let mut scored: Vec<ScoredObservation> = candidates
        .iter()
        .enumerate()
        .map(|(i, &id)| {
            let breakdown = ScoreBreakdown {
                recency: recency[i],
                importance: importance[i],
                relevance: relevance[i],
            };
            let score = weights.recency * breakdown.recency
                + weights.importance * breakdown.importance
                + weights.relevance * breakdown.relevance;
            ScoredObservation {
                id,
                score,
                breakdown,
            }
        })
        .collect();

    scored.sort_by_key(|s| (OrderedFloat(s.score), s.id));
    scored
}
