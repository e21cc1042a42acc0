//! Property-Based Tests for recall core.
//!
//! Uses `proptest` to check the store, scoring and budget invariants under
//! random inputs: dense ids, bounded normalized scores, ascending ranking,
//! suffix-preserving truncation and budget trimming.

use std::sync::Arc;

use proptest::prelude::*;

use recall_core::budget;
use recall_core::config::{MemorySettings, RecallConfig, RetrievalWeights};
use recall_core::embedding::{HashingEmbeddingProvider, StubEmbeddingProvider};
use recall_core::retrieval::scoring::{NEUTRAL_SCORE, normalize};
use recall_core::services::{CHARACTERS, ITEMS, RetryPolicy, VocabularyKeywordExtractor};
use recall_core::{AgentId, AgentMemory, Keywords, MemoryStore, MemoryType, ObservationId, ObservationInput, Services};

const CHARACTER_POOL: [&str; 4] = ["isabella", "klaus", "maria", "tom"];
const ITEM_POOL: [&str; 3] = ["lamp", "key", "letter"];

// ---------------------------------------------------------------------------
// Strategy helpers
// ---------------------------------------------------------------------------

fn arb_memory_type() -> impl Strategy<Value = MemoryType> {
    prop::sample::select(MemoryType::ALL.to_vec())
}

/// (round, type, character index, item index, importance)
fn arb_event() -> impl Strategy<Value = (u32, MemoryType, usize, usize, i64)> {
    (0..20u32, arb_memory_type(), 0..CHARACTER_POOL.len(), 0..ITEM_POOL.len(), 1..=10i64)
}

fn event_input(i: usize, (round, memory_type, c, t, importance): (u32, MemoryType, usize, usize, i64)) -> ObservationInput {
    let character = CHARACTER_POOL[c];
    let item = ITEM_POOL[t];
    ObservationInput::new(round, i as u32, memory_type, format!("{character} handled the {item} ({i})"))
        .with_keywords(Keywords::new().with(CHARACTERS, [character]).with(ITEMS, [item]))
        .with_importance(importance)
}

fn arb_weights() -> impl Strategy<Value = RetrievalWeights> {
    (0.0..5.0f64, 0.0..5.0f64, 0.0..5.0f64).prop_map(|(recency, importance, relevance)| RetrievalWeights {
        recency,
        importance,
        relevance,
    })
}

fn agent_with(weights: RetrievalWeights, gamma: f64) -> AgentMemory {
    let mut config = RecallConfig::default();
    config.retrieval.lookback = 0;
    config.retrieval.weights = weights;
    config.retrieval.gamma = gamma;
    let vocabulary = VocabularyKeywordExtractor::new()
        .with_terms(CHARACTERS, CHARACTER_POOL)
        .with_terms(ITEMS, ITEM_POOL);
    AgentMemory::new("prop", &config, Services::offline(vocabulary, 5))
}

// ---------------------------------------------------------------------------
// Property: ids are dense and indices never point past the end
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn append_assigns_dense_ids(events in prop::collection::vec(arb_event(), 0..40)) {
        let mut store = MemoryStore::new(
            AgentId::new(),
            Arc::new(StubEmbeddingProvider::new(4)),
            MemorySettings::default(),
            RetryPolicy::ONCE,
        );
        for (i, event) in events.iter().copied().enumerate() {
            let id = store.append(event_input(i, event)).expect("append");
            prop_assert_eq!(id, ObservationId(i));
        }
        prop_assert_eq!(store.len(), events.len());

        for (category, pool) in [(CHARACTERS, &CHARACTER_POOL[..]), (ITEMS, &ITEM_POOL[..])] {
            for word in pool {
                let ids = store.keyword_index().get(category, word);
                prop_assert!(ids.windows(2).all(|w| w[0] < w[1]));
                prop_assert!(ids.iter().all(|id| id.index() < store.len()));
            }
        }
        for memory_type in MemoryType::ALL {
            for &id in store.by_type(memory_type) {
                prop_assert_eq!(store.get(id).expect("get").memory_type, memory_type);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Property: normalized values stay in [0, 1] and span it when they vary
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn normalize_is_bounded(raw in prop::collection::vec(-1.0e6..1.0e6f64, 1..50)) {
        let normalized = normalize(&raw);
        prop_assert_eq!(normalized.len(), raw.len());
        prop_assert!(normalized.iter().all(|v| (0.0..=1.0).contains(v)));

        let min = raw.iter().copied().fold(f64::INFINITY, f64::min);
        let max = raw.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        if max > min {
            let lo = normalized.iter().copied().fold(f64::INFINITY, f64::min);
            let hi = normalized.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            prop_assert!(lo.abs() < 1e-12);
            prop_assert!((hi - 1.0).abs() < 1e-12);
        } else {
            prop_assert!(normalized.iter().all(|&v| v == NEUTRAL_SCORE));
        }
    }
}

// ---------------------------------------------------------------------------
// Property: ranking ascends, scores are bounded, truncation keeps the tail
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn retrieval_ascends_within_bounds(
        events in prop::collection::vec(arb_event(), 1..30),
        weights in arb_weights(),
        gamma in 0.5..0.99f64,
        limit in 1..10usize,
        who in 0..CHARACTER_POOL.len(),
    ) {
        let mut agent = agent_with(weights, gamma);
        for (i, event) in events.iter().copied().enumerate() {
            agent.append(event_input(i, event)).expect("append");
        }
        let query = CHARACTER_POOL[who];
        let expected = events.iter().filter(|e| e.2 == who).count();

        let all = agent.retrieve_scored(Some(query), Some(0));
        prop_assert_eq!(all.len(), expected);
        let upper = weights.total() + 1e-9;
        for s in &all {
            prop_assert!(s.score >= -1e-9 && s.score <= upper, "score {} outside [0, {}]", s.score, upper);
        }
        for pair in all.windows(2) {
            prop_assert!(
                pair[0].score < pair[1].score || (pair[0].score == pair[1].score && pair[0].id < pair[1].id)
            );
        }

        let top = agent.retrieve_scored(Some(query), Some(limit));
        prop_assert_eq!(top.len(), expected.min(limit));
        let top_ids: Vec<_> = top.iter().map(|s| s.id).collect();
        let tail_ids: Vec<_> = all[all.len() - top.len()..].iter().map(|s| s.id).collect();
        prop_assert_eq!(top_ids, tail_ids);
    }
}

// ---------------------------------------------------------------------------
// Property: budget trim returns the longest fitting suffix
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn trim_returns_longest_fitting_suffix(
        costs in prop::collection::vec(0..50usize, 0..30),
        max_tokens in 0..200usize,
        max_items in prop::option::of(0..10usize),
    ) {
        let items: Vec<String> = costs.iter().map(ToString::to_string).collect();
        let by_value = |s: &str| s.parse::<usize>().unwrap_or(0);
        let kept = budget::trim(&items, max_tokens, max_items, &by_value);

        prop_assert!(budget::total_tokens(kept, &by_value) <= max_tokens);
        prop_assert_eq!(kept, &items[items.len() - kept.len()..]);
        if let Some(limit) = max_items {
            prop_assert!(kept.len() <= limit);
        }

        let hit_item_cap = max_items == Some(kept.len());
        if kept.len() < items.len() && !hit_item_cap {
            let next = costs[items.len() - kept.len() - 1];
            prop_assert!(budget::total_tokens(kept, &by_value) + next > max_tokens);
        }
    }
}

// ---------------------------------------------------------------------------
// Property: a reflection revision never moves it or changes its type
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn revision_preserves_identity(text in "[a-z ]{1,40}", round in 0..100u32) {
        let mut store = MemoryStore::new(
            AgentId::new(),
            Arc::new(HashingEmbeddingProvider::new(32)),
            MemorySettings::default(),
            RetryPolicy::ONCE,
        );
        let id = store
            .append(ObservationInput::new(round, 3, MemoryType::Reflection, "first thought"))
            .expect("append");
        prop_assert!(store.update_description(id, text.clone()).expect("revise"));

        let obs = store.get(id).expect("get");
        prop_assert_eq!(obs.id, id);
        prop_assert_eq!(obs.round, round);
        prop_assert_eq!(obs.tick, 3);
        prop_assert_eq!(obs.memory_type, MemoryType::Reflection);
        prop_assert_eq!(&obs.description, &text);
        prop_assert_eq!(store.len(), 1);
    }
}
