//! Simulated attention heads.
//!
//! An [`AttentionHead`] owns a [`HeadCache`] for one [`Specialization`].
//! Processing a token appends one key/value/token entry; computing attention
//! scores the query against every cached entry. Values and weights are
//! placeholders drawn from the head's [`RandomSource`], shaped by a
//! specialization-dependent bonus.

pub mod cache;
pub mod lexicon;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::engine::rng::{RandomSource, XorShiftRng};
use crate::error::SimulationError;
use crate::events::{EventSink, NullSink, SimEvent};
use crate::orchestration::SharedCache;

pub use cache::{CacheValue, HeadCache};

/// Length of the placeholder embedding vector.
pub const DEFAULT_EMBEDDING_DIM: usize = 4;

/// Multiplier applied to weights whose entry is present in the shared cache.
pub const SHARED_CACHE_BOOST: f32 = 1.2;

/// Behavioral profile of a head.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Specialization {
    Syntax,
    Semantic,
    Positional,
    LongRange,
}

impl Specialization {
    pub const ALL: [Specialization; 4] = [
        Specialization::Syntax,
        Specialization::Semantic,
        Specialization::Positional,
        Specialization::LongRange,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Specialization::Syntax => "syntax",
            Specialization::Semantic => "semantic",
            Specialization::Positional => "positional",
            Specialization::LongRange => "long-range",
        }
    }
}

impl fmt::Display for Specialization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Specialization {
    type Err = SimulationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Specialization::ALL
            .into_iter()
            .find(|spec| spec.as_str() == s)
            .ok_or_else(|| {
                SimulationError::InvalidConfig(format!(
                    "unknown specialization '{}'. Options: syntax, semantic, positional, long-range",
                    s
                ))
            })
    }
}

/// Result of processing one token on one head.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedToken {
    pub key: String,
    pub value: CacheValue,
}

/// Read-only view of a head shared with its peers under cross-head orchestration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeadSnapshot {
    pub specialization: Specialization,
    pub cache_size: usize,
    pub last_token: Option<String>,
}

/// Recency bonus for the positional specialization.
///
/// Grows as `index` approaches the end of a cache of length `cache_len`.
pub fn positional_bonus(cache_len: usize, index: usize) -> f32 {
    0.5 / (cache_len.saturating_sub(index) + 1) as f32
}

/// A single simulated attention head.
pub struct AttentionHead {
    id: String,
    specialization: Specialization,
    cache: HeadCache,
    /// Last orchestration mode label applied. Display only.
    mode: Option<String>,
    peer_view: Vec<HeadSnapshot>,
    embedding_dim: usize,
    rng: Box<dyn RandomSource>,
    events: Arc<dyn EventSink>,
}

impl AttentionHead {
    /// Create a head with a wall-clock seeded RNG and no event sink.
    pub fn new(id: impl Into<String>, specialization: Specialization) -> Self {
        Self::with_rng(id, specialization, Box::new(XorShiftRng::from_entropy()))
    }

    /// Create a head drawing weights and embeddings from `rng`.
    pub fn with_rng(
        id: impl Into<String>,
        specialization: Specialization,
        rng: Box<dyn RandomSource>,
    ) -> Self {
        Self {
            id: id.into(),
            specialization,
            cache: HeadCache::new(),
            mode: None,
            peer_view: Vec::new(),
            embedding_dim: DEFAULT_EMBEDDING_DIM,
            rng,
            events: Arc::new(NullSink),
        }
    }

    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    pub fn with_embedding_dim(mut self, embedding_dim: usize) -> Self {
        self.embedding_dim = embedding_dim;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn specialization(&self) -> Specialization {
        self.specialization
    }

    pub fn cache(&self) -> &HeadCache {
        &self.cache
    }

    /// The last orchestration mode label applied, if any.
    pub fn orchestration_mode(&self) -> Option<&str> {
        self.mode.as_deref()
    }

    /// Peer snapshots received during the last cross-head exchange.
    pub fn peer_view(&self) -> &[HeadSnapshot] {
        &self.peer_view
    }

    pub fn set_orchestration_mode(&mut self, mode: &str) {
        self.mode = Some(mode.to_string());
        self.events.emit(SimEvent::ModeChanged {
            head: self.id.clone(),
            mode: mode.to_string(),
        });
    }

    /// Deterministic cache key for `token` at `position`.
    pub fn generate_key(&self, token: &str, position: usize) -> String {
        match self.specialization {
            Specialization::Syntax => format!("{}_syntax_{}", token, position),
            Specialization::Semantic => {
                format!("{}_meaning_{}", token, lexicon::semantic_group(token))
            }
            Specialization::Positional => format!("pos_{}_{}", position, token),
            Specialization::LongRange => format!("{}_context_{}", token, position / 5),
        }
    }

    fn generate_value(&mut self, token: &str, position: usize) -> CacheValue {
        let embedding = (0..self.embedding_dim).map(|_| self.rng.next_f32()).collect();
        CacheValue {
            token: token.to_string(),
            position,
            embedding,
            specialization: self.specialization,
            allocation: None,
        }
    }

    fn append(&mut self, token: &str, position: usize, allocation: Option<f32>) -> ProcessedToken {
        let key = self.generate_key(token, position);
        let mut value = self.generate_value(token, position);
        value.allocation = allocation;

        trace!(head = %self.id, key = %key, position, "cache append");
        self.cache.append(key.clone(), value.clone(), token.to_string());
        self.events.emit(SimEvent::CacheItemAdded {
            head: self.id.clone(),
            key: key.clone(),
            value: value.clone(),
            token: token.to_string(),
        });

        ProcessedToken { key, value }
    }

    /// Generate a key/value for `token` and append it to the cache.
    pub fn process_token(&mut self, token: &str, position: usize) -> ProcessedToken {
        self.append(token, position, None)
    }

    /// Self-attention entry point. Cache growth is identical to [`process_token`](Self::process_token).
    pub fn process_token_with_self_attention(
        &mut self,
        token: &str,
        position: usize,
    ) -> ProcessedToken {
        self.append(token, position, None)
    }

    /// Process a token after checking the shared cache for `"<token>_<position>"`.
    ///
    /// A hit only emits an event; the head cache grows exactly as in
    /// [`process_token`](Self::process_token).
    pub fn process_token_with_shared_cache(
        &mut self,
        token: &str,
        position: usize,
        shared: &SharedCache,
    ) -> ProcessedToken {
        if shared.contains(token, position) {
            self.events.emit(SimEvent::SharedCacheHit {
                head: self.id.clone(),
                token: token.to_string(),
            });
        }
        self.append(token, position, None)
    }

    /// Process a token under a resource allocation factor.
    ///
    /// Allocations above 1.0 mark the value as enhanced. Weights are unaffected.
    pub fn process_token_with_allocation(
        &mut self,
        token: &str,
        position: usize,
        allocation: f32,
    ) -> ProcessedToken {
        let enhanced = (allocation > 1.0).then_some(allocation);
        let processed = self.append(token, position, enhanced);
        self.events.emit(SimEvent::AllocationAssigned {
            head: self.id.clone(),
            allocation,
        });
        processed
    }

    /// Specialization bonus for the cached entry at `index` against `query`.
    pub fn specialization_bonus(&self, query: &str, index: usize) -> f32 {
        let cached = self.cache.token(index).unwrap_or("");
        match self.specialization {
            Specialization::Syntax if lexicon::is_syntactically_related(query, cached) => 0.4,
            Specialization::Semantic if lexicon::is_semantically_related(query, cached) => 0.4,
            Specialization::Positional => positional_bonus(self.cache.len(), index),
            // First 30% of the cache, in exact integer arithmetic.
            Specialization::LongRange if index * 10 < self.cache.len() * 3 => 0.3,
            _ => 0.0,
        }
    }

    fn raw_weights(&mut self, query: &str) -> Vec<f32> {
        (0..self.cache.len())
            .map(|index| {
                let base = self.rng.uniform(0.1, 0.6);
                (base + self.specialization_bonus(query, index)).min(1.0)
            })
            .collect()
    }

    fn publish_weights(&self, weights: &[f32]) {
        self.events.emit(SimEvent::AttentionComputed {
            head: self.id.clone(),
            weights: weights.to_vec(),
        });
    }

    /// One weight in `[0, 1]` per cached key, in cache order.
    pub fn compute_attention(&mut self, query: &str) -> Vec<f32> {
        let weights = self.raw_weights(query);
        self.publish_weights(&weights);
        weights
    }

    /// Self-attention entry point. The cache already holds the current token.
    pub fn compute_self_attention(&mut self, query: &str) -> Vec<f32> {
        self.compute_attention(query)
    }

    /// Attention weights boosted for entries present in the shared cache.
    ///
    /// The lookup key is `"<token>_<index>"` using the weight's index in this
    /// head's cache, not the position the entry was written at. Boosted
    /// weights are clamped to 1.0.
    pub fn compute_attention_with_shared_cache(
        &mut self,
        query: &str,
        shared: &SharedCache,
    ) -> Vec<f32> {
        let mut weights = self.raw_weights(query);
        for (index, weight) in weights.iter_mut().enumerate() {
            let token = self.cache.token(index).unwrap_or("");
            if shared.contains(token, index) {
                *weight = (*weight * SHARED_CACHE_BOOST).min(1.0);
            }
        }
        self.publish_weights(&weights);
        weights
    }

    /// Record the peer snapshot from a cross-head exchange.
    pub fn receive_shared_info(&mut self, peers: Vec<HeadSnapshot>) {
        self.events.emit(SimEvent::SharedInfoReceived {
            head: self.id.clone(),
            peers: peers.len(),
        });
        self.peer_view = peers;
    }

    pub fn snapshot(&self) -> HeadSnapshot {
        HeadSnapshot {
            specialization: self.specialization,
            cache_size: self.cache.len(),
            last_token: self.cache.last_token().map(str::to_string),
        }
    }

    /// Empty the cache and clear the mode indicator. Idempotent.
    pub fn clear_cache(&mut self) {
        self.cache.clear();
        self.peer_view.clear();
        self.mode = None;
        self.events.emit(SimEvent::CacheCleared {
            head: self.id.clone(),
        });
    }
}

impl fmt::Debug for AttentionHead {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttentionHead")
            .field("id", &self.id)
            .field("specialization", &self.specialization)
            .field("cache_len", &self.cache.len())
            .field("mode", &self.mode)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::rng::FixedSource;
    use crate::events::RecordingSink;

    fn fixed_head(spec: Specialization, base: f32) -> AttentionHead {
        AttentionHead::with_rng("h", spec, Box::new(FixedSource::constant(base)))
    }

    fn feed(head: &mut AttentionHead, tokens: &[&str]) {
        for (pos, tok) in tokens.iter().enumerate() {
            head.process_token(tok, pos);
        }
    }

    #[test]
    fn test_key_generation_per_specialization() {
        let syntax = AttentionHead::new("a", Specialization::Syntax);
        let semantic = AttentionHead::new("b", Specialization::Semantic);
        let positional = AttentionHead::new("c", Specialization::Positional);
        let long_range = AttentionHead::new("d", Specialization::LongRange);

        assert_eq!(syntax.generate_key("cat", 3), "cat_syntax_3");
        assert_eq!(semantic.generate_key("cat", 3), "cat_meaning_animal");
        assert_eq!(semantic.generate_key("the", 3), "the_meaning_general");
        assert_eq!(positional.generate_key("cat", 3), "pos_3_cat");
        assert_eq!(long_range.generate_key("cat", 3), "cat_context_0");
        assert_eq!(long_range.generate_key("cat", 12), "cat_context_2");
    }

    #[test]
    fn test_cache_growth_invariant() {
        let mut head = AttentionHead::new("h", Specialization::Semantic);
        let shared = SharedCache::new();
        head.process_token("the", 0);
        head.process_token_with_self_attention("cat", 1);
        head.process_token_with_shared_cache("runs", 2, &shared);
        head.process_token_with_allocation("fast", 3, 1.5);

        let cache = head.cache();
        assert_eq!(cache.keys().len(), 4);
        assert_eq!(cache.values().len(), 4);
        assert_eq!(cache.tokens().len(), 4);
    }

    #[test]
    fn test_process_token_returns_appended_entry() {
        let mut head = AttentionHead::new("h", Specialization::Positional);
        let out = head.process_token("dog", 7);
        assert_eq!(out.key, "pos_7_dog");
        assert_eq!(out.value.token, "dog");
        assert_eq!(out.value.position, 7);
        assert_eq!(out.value.specialization, Specialization::Positional);
        assert_eq!(out.value.embedding.len(), DEFAULT_EMBEDDING_DIM);
        assert_eq!(head.cache().keys()[0], out.key);
    }

    #[test]
    fn test_embedding_dim_configurable() {
        let mut head = AttentionHead::new("h", Specialization::Syntax).with_embedding_dim(8);
        let out = head.process_token("a", 0);
        assert_eq!(out.value.embedding.len(), 8);
        assert!(out.value.embedding.iter().all(|v| (0.0..1.0).contains(v)));
    }

    #[test]
    fn test_weight_bounds_and_length() {
        for spec in Specialization::ALL {
            let mut head = AttentionHead::with_rng(spec.as_str(), spec, Box::new(XorShiftRng::new(9)));
            feed(&mut head, &["the", "cat", "run", "dog", "jump", "fish", "walk"]);
            for query in ["cat", "run", "zebra"] {
                let weights = head.compute_attention(query);
                assert_eq!(weights.len(), head.cache().len());
                assert!(weights.iter().all(|w| (0.0..=1.0).contains(w)), "{:?}", weights);
            }
        }
    }

    #[test]
    fn test_empty_cache_gives_no_weights() {
        let mut head = AttentionHead::new("h", Specialization::Syntax);
        assert!(head.compute_attention("cat").is_empty());
    }

    #[test]
    fn test_syntax_bonus_for_verb_noun_pairs() {
        let mut head = fixed_head(Specialization::Syntax, 0.0);
        feed(&mut head, &["dog", "the"]);
        let weights = head.compute_attention("run");
        assert!((weights[0] - 0.5).abs() < 1e-6);
        assert!((weights[1] - 0.1).abs() < 1e-6);
    }

    #[test]
    fn test_semantic_bonus_for_same_group() {
        let mut head = fixed_head(Specialization::Semantic, 0.0);
        feed(&mut head, &["bird", "run"]);
        let weights = head.compute_attention("fish");
        assert!((weights[0] - 0.5).abs() < 1e-6);
        assert!((weights[1] - 0.1).abs() < 1e-6);
    }

    #[test]
    fn test_positional_bonus_monotonic_recency() {
        let len = 10;
        for index in 1..len {
            assert!(positional_bonus(len, index) > positional_bonus(len, index - 1));
        }

        let mut head = fixed_head(Specialization::Positional, 0.5);
        feed(&mut head, &["a", "b", "c", "d", "e", "f"]);
        let weights = head.compute_attention("a");
        for pair in weights.windows(2) {
            assert!(pair[1] > pair[0], "{:?}", weights);
        }
    }

    #[test]
    fn test_long_range_privileges_oldest_entries() {
        let mut head = fixed_head(Specialization::LongRange, 0.0);
        feed(&mut head, &["a", "b", "c", "d", "e", "f", "g", "h", "i", "j"]);
        let weights = head.compute_attention("a");
        // first 30% of 10 entries: indices 0, 1, 2
        for (i, w) in weights.iter().enumerate() {
            let expected = if i < 3 { 0.4 } else { 0.1 };
            assert!((w - expected).abs() < 1e-6, "index {}: {}", i, w);
        }
    }

    #[test]
    fn test_long_range_boundary_is_exact() {
        // 50 * 0.3 in f32 rounds above 15; index 15 must still be excluded.
        let mut head = fixed_head(Specialization::LongRange, 0.0);
        let tokens: Vec<String> = (0..50).map(|i| format!("t{}", i)).collect();
        for (pos, tok) in tokens.iter().enumerate() {
            head.process_token(tok, pos);
        }
        assert_eq!(head.specialization_bonus("t0", 14), 0.3);
        assert_eq!(head.specialization_bonus("t0", 15), 0.0);

        let mut short = fixed_head(Specialization::LongRange, 0.0);
        feed(&mut short, &["a", "b", "c"]);
        // 30% of 3 entries is 0.9: only index 0 qualifies.
        assert_eq!(short.specialization_bonus("a", 0), 0.3);
        assert_eq!(short.specialization_bonus("a", 1), 0.0);
    }

    #[test]
    fn test_weights_clamped_to_one() {
        let mut head = fixed_head(Specialization::Syntax, 0.99);
        feed(&mut head, &["cat"]);
        let weights = head.compute_attention("run");
        assert!(weights[0] <= 1.0);
    }

    #[test]
    fn test_shared_cache_boost_uses_query_index() {
        let mut head = fixed_head(Specialization::Syntax, 0.0);
        feed(&mut head, &["the", "cat"]);

        let mut shared = SharedCache::new();
        shared.insert("cat", 1);
        let weights = head.compute_attention_with_shared_cache("zebra", &shared);
        assert!((weights[0] - 0.1).abs() < 1e-6);
        assert!((weights[1] - 0.12).abs() < 1e-6);

        // An entry written under a different position is not matched.
        let mut shared = SharedCache::new();
        shared.insert("cat", 5);
        let weights = head.compute_attention_with_shared_cache("zebra", &shared);
        assert!((weights[1] - 0.1).abs() < 1e-6);
    }

    #[test]
    fn test_shared_cache_hit_event_without_extra_growth() {
        let sink = Arc::new(RecordingSink::new());
        let mut head = AttentionHead::new("h", Specialization::Syntax).with_events(sink.clone());
        let mut shared = SharedCache::new();
        shared.insert("cat", 0);

        head.process_token_with_shared_cache("cat", 0, &shared);
        head.process_token_with_shared_cache("dog", 1, &shared);

        assert_eq!(head.cache().len(), 2);
        let hits: Vec<_> = sink
            .events()
            .into_iter()
            .filter(|e| matches!(e, SimEvent::SharedCacheHit { .. }))
            .collect();
        assert_eq!(
            hits,
            vec![SimEvent::SharedCacheHit {
                head: "h".into(),
                token: "cat".into()
            }]
        );
    }

    #[test]
    fn test_allocation_marks_enhanced_values() {
        let mut head = AttentionHead::new("h", Specialization::Syntax);
        let plain = head.process_token_with_allocation("a", 0, 1.0);
        let boosted = head.process_token_with_allocation("b", 1, 1.5);
        assert!(!plain.value.is_enhanced());
        assert_eq!(boosted.value.allocation, Some(1.5));
        assert!(head.cache().values()[1].is_enhanced());
    }

    #[test]
    fn test_snapshot_and_shared_info() {
        let mut head = AttentionHead::new("h", Specialization::Semantic);
        assert_eq!(head.snapshot().last_token, None);
        feed(&mut head, &["cat", "run"]);
        let snap = head.snapshot();
        assert_eq!(snap.cache_size, 2);
        assert_eq!(snap.last_token.as_deref(), Some("run"));

        head.receive_shared_info(vec![snap.clone(), snap]);
        assert_eq!(head.peer_view().len(), 2);
    }

    #[test]
    fn test_clear_cache_is_idempotent_and_clears_mode() {
        let mut head = AttentionHead::new("h", Specialization::LongRange);
        head.set_orchestration_mode("dynamic");
        feed(&mut head, &["a", "b"]);
        head.clear_cache();
        head.clear_cache();
        assert!(head.cache().is_empty());
        assert_eq!(head.orchestration_mode(), None);
    }

    #[test]
    fn test_specialization_from_str() {
        assert_eq!("long-range".parse::<Specialization>().unwrap(), Specialization::LongRange);
        assert!("vision".parse::<Specialization>().is_err());
    }
}
