// The built-in orchestration strategies.

use std::sync::Arc;

use tracing::trace;

use super::{OrchestrationMode, OrchestrationStrategy, SharedCache};
use crate::engine::rng::RandomSource;
use crate::events::{EventSink, NullSink, SimEvent};
use crate::head::{AttentionHead, HeadSnapshot, Specialization};

fn attend_all(query: &str, heads: &mut [AttentionHead]) -> Vec<Vec<f32>> {
    heads.iter_mut().map(|h| h.compute_attention(query)).collect()
}

/// Every head processes independently, no coordination.
#[derive(Debug, Default, Clone, Copy)]
pub struct BasicStrategy;

impl OrchestrationStrategy for BasicStrategy {
    fn name(&self) -> &str {
        OrchestrationMode::Basic.as_str()
    }

    fn process_token(&mut self, token: &str, position: usize, heads: &mut [AttentionHead]) {
        for head in heads.iter_mut() {
            head.process_token(token, position);
        }
    }

    fn compute_attention(&mut self, query: &str, heads: &mut [AttentionHead]) -> Vec<Vec<f32>> {
        attend_all(query, heads)
    }
}

/// Same fan-out as basic, through the heads' self-attention entry points.
#[derive(Debug, Default, Clone, Copy)]
pub struct SelfAttentionStrategy;

impl OrchestrationStrategy for SelfAttentionStrategy {
    fn name(&self) -> &str {
        OrchestrationMode::SelfAttention.as_str()
    }

    fn process_token(&mut self, token: &str, position: usize, heads: &mut [AttentionHead]) {
        for head in heads.iter_mut() {
            head.process_token_with_self_attention(token, position);
        }
    }

    fn compute_attention(&mut self, query: &str, heads: &mut [AttentionHead]) -> Vec<Vec<f32>> {
        heads
            .iter_mut()
            .map(|h| h.compute_self_attention(query))
            .collect()
    }
}

/// Heads exchange snapshots after each token and perturb each other's weights.
pub struct CrossHeadStrategy {
    rng: Box<dyn RandomSource>,
}

impl CrossHeadStrategy {
    pub fn new(rng: Box<dyn RandomSource>) -> Self {
        Self { rng }
    }

    /// Influence on one head's weights, in `[0, 0.2)`. Redrawn on every call.
    fn influence(&mut self) -> f32 {
        self.rng.next_f32() * 0.2
    }
}

impl OrchestrationStrategy for CrossHeadStrategy {
    fn name(&self) -> &str {
        OrchestrationMode::CrossHead.as_str()
    }

    fn process_token(&mut self, token: &str, position: usize, heads: &mut [AttentionHead]) {
        for head in heads.iter_mut() {
            head.process_token(token, position);
        }

        // Snapshot only after every head has the current token.
        let snapshots: Vec<HeadSnapshot> = heads.iter().map(AttentionHead::snapshot).collect();
        for (i, head) in heads.iter_mut().enumerate() {
            let peers = snapshots
                .iter()
                .enumerate()
                .filter(|&(j, _)| j != i)
                .map(|(_, s)| s.clone())
                .collect();
            head.receive_shared_info(peers);
        }
    }

    fn compute_attention(&mut self, query: &str, heads: &mut [AttentionHead]) -> Vec<Vec<f32>> {
        attend_all(query, heads)
            .into_iter()
            .map(|weights| {
                let scale = 1.0 + self.influence() * 0.1;
                weights.into_iter().map(|w| (w * scale).min(1.0)).collect()
            })
            .collect()
    }
}

/// Maintains a [`SharedCache`] that heads consult when processing and scoring.
#[derive(Debug, Default)]
pub struct SharedCacheStrategy {
    cache: SharedCache,
}

impl SharedCacheStrategy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared_cache(&self) -> &SharedCache {
        &self.cache
    }
}

impl OrchestrationStrategy for SharedCacheStrategy {
    fn name(&self) -> &str {
        OrchestrationMode::SharedCache.as_str()
    }

    fn process_token(&mut self, token: &str, position: usize, heads: &mut [AttentionHead]) {
        self.cache.insert(token, position);
        for head in heads.iter_mut() {
            head.process_token_with_shared_cache(token, position, &self.cache);
        }
    }

    fn compute_attention(&mut self, query: &str, heads: &mut [AttentionHead]) -> Vec<Vec<f32>> {
        heads
            .iter_mut()
            .map(|h| h.compute_attention_with_shared_cache(query, &self.cache))
            .collect()
    }

    fn reset(&mut self) {
        self.cache.clear();
    }

    fn auxiliary_len(&self) -> usize {
        self.cache.len()
    }
}

/// Assigns a per-head allocation from the token's complexity.
#[derive(Debug, Default, Clone, Copy)]
pub struct DynamicStrategy;

impl DynamicStrategy {
    /// `len(token) + position * 0.1`, length in characters.
    pub fn complexity(token: &str, position: usize) -> f32 {
        token.chars().count() as f32 + position as f32 * 0.1
    }

    /// Allocation for `head`. Uniform across heads for now.
    pub fn allocation(_head: &AttentionHead, complexity: f32) -> f32 {
        let bonus = if complexity > 5.0 { 0.5 } else { 0.0 };
        1.0 + bonus
    }
}

impl OrchestrationStrategy for DynamicStrategy {
    fn name(&self) -> &str {
        OrchestrationMode::Dynamic.as_str()
    }

    fn process_token(&mut self, token: &str, position: usize, heads: &mut [AttentionHead]) {
        let complexity = Self::complexity(token, position);
        for head in heads.iter_mut() {
            let allocation = Self::allocation(head, complexity);
            head.process_token_with_allocation(token, position, allocation);
        }
    }

    fn compute_attention(&mut self, query: &str, heads: &mut [AttentionHead]) -> Vec<Vec<f32>> {
        attend_all(query, heads)
    }
}

/// Layer processing order for hierarchical orchestration.
pub const LAYER_ORDER: [Specialization; 4] = [
    Specialization::Syntax,
    Specialization::Positional,
    Specialization::Semantic,
    Specialization::LongRange,
];

/// One non-empty layer of the hierarchical schedule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerSchedule {
    pub specialization: Specialization,
    /// Logical start offset. Empty layers contribute no offset.
    pub offset_ms: u64,
    /// Indices into the head slice, in head order.
    pub heads: Vec<usize>,
}

/// Processes heads layer by layer: syntax, positional, semantic, long-range.
///
/// A layer starts only after the previous layer has finished.
pub struct HierarchicalStrategy {
    layer_stagger_ms: u64,
    events: Arc<dyn EventSink>,
}

impl HierarchicalStrategy {
    pub fn new(layer_stagger_ms: u64) -> Self {
        Self {
            layer_stagger_ms,
            events: Arc::new(NullSink),
        }
    }

    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    /// The ordered non-empty layers for `heads`.
    pub fn schedule(&self, heads: &[AttentionHead]) -> Vec<LayerSchedule> {
        LAYER_ORDER
            .iter()
            .filter_map(|&spec| {
                let members: Vec<usize> = heads
                    .iter()
                    .enumerate()
                    .filter(|(_, h)| h.specialization() == spec)
                    .map(|(i, _)| i)
                    .collect();
                (!members.is_empty()).then_some((spec, members))
            })
            .enumerate()
            .map(|(layer, (specialization, members))| LayerSchedule {
                specialization,
                offset_ms: layer as u64 * self.layer_stagger_ms,
                heads: members,
            })
            .collect()
    }
}

impl OrchestrationStrategy for HierarchicalStrategy {
    fn name(&self) -> &str {
        OrchestrationMode::Hierarchical.as_str()
    }

    fn process_token(&mut self, token: &str, position: usize, heads: &mut [AttentionHead]) {
        for layer in self.schedule(heads) {
            trace!(layer = %layer.specialization, offset_ms = layer.offset_ms, "hierarchical layer");
            self.events.emit(SimEvent::LayerStarted {
                specialization: layer.specialization,
                offset_ms: layer.offset_ms,
            });
            for index in layer.heads {
                heads[index].process_token(token, position);
            }
        }
    }

    fn compute_attention(&mut self, query: &str, heads: &mut [AttentionHead]) -> Vec<Vec<f32>> {
        attend_all(query, heads)
    }
}
