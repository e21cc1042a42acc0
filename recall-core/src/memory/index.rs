//! Inverted indices over a store's observation ids.
//!
//! Lookups on a missing key return an empty slice; nothing is created on
//! read.

use std::collections::{BTreeMap, HashMap};

use crate::types::ObservationId;

/// (category, word) → ids of the observations tagged with that pair, in
/// insertion order.
#[derive(Debug, Clone, Default)]
pub struct KeywordIndex {
    by_category: HashMap<String, HashMap<String, Vec<ObservationId>>>,
}

impl KeywordIndex {
    /// An empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&mut self, category: &str, word: &str, id: ObservationId) {
        let ids = self
            .by_category
            .entry(category.to_string())
            .or_default()
            .entry(word.to_string())
            .or_default();
        if ids.last() != Some(&id) {
            ids.push(id);
        }
    }

    /// Ids tagged with `(category, word)`.
    #[must_use]
    pub fn get(&self, category: &str, word: &str) -> &[ObservationId] {
        self.by_category
            .get(category)
            .and_then(|words| words.get(word))
            .map_or(&[][..], Vec::as_slice)
    }

    /// Number of distinct `(category, word)` pairs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_category.values().map(HashMap::len).sum()
    }

    /// Whether the index holds no pairs.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Ordered key → ids index, used for the type and round indices.
#[derive(Debug, Clone)]
pub struct IdIndex<K: Ord> {
    map: BTreeMap<K, Vec<ObservationId>>,
}

impl<K: Ord> Default for IdIndex<K> {
    fn default() -> Self {
        Self {
            map: BTreeMap::new(),
        }
    }
}

impl<K: Ord> IdIndex<K> {
    /// An empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&mut self, key: K, id: ObservationId) {
        self.map.entry(key).or_default().push(id);
    }

    /// Ids filed under `key`, in insertion order.
    #[must_use]
    pub fn get(&self, key: &K) -> &[ObservationId] {
        self.map.get(key).map_or(&[][..], Vec::as_slice)
    }

    /// Ids for every key in `range`, ordered by key then insertion.
    pub fn range<R>(&self, range: R) -> impl Iterator<Item = ObservationId> + '_
    where
        R: std::ops::RangeBounds<K>,
    {
        self.map.range(range).flat_map(|(_, ids)| ids.iter().copied())
    }
}
