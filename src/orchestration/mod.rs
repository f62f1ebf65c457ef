//! Orchestration of attention heads.
//!
//! An [`OrchestrationStrategy`] decides how a token is dispatched to the heads
//! and whether the heads exchange any state. The [`OrchestrationManager`] owns
//! the heads and a registry of strategies, exactly one of which is active.
//!
//! Six strategies are registered by default, one per [`OrchestrationMode`].
//! Additional strategies can be registered under new names.

pub mod shared_cache;
pub mod strategies;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::SimulationConfig;
use crate::engine::rng::seeded_source;
use crate::error::SimulationError;
use crate::events::{EventSink, NullSink};
use crate::head::AttentionHead;

pub use shared_cache::{SharedCache, SharedEntry};
pub use strategies::{
    BasicStrategy, CrossHeadStrategy, DynamicStrategy, HierarchicalStrategy, LayerSchedule,
    SelfAttentionStrategy, SharedCacheStrategy,
};

/// Salt for the cross-head strategy's random stream.
const CROSS_HEAD_SALT: u64 = 0xC055_4EAD;

/// The built-in orchestration modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OrchestrationMode {
    #[default]
    Basic,
    SelfAttention,
    CrossHead,
    SharedCache,
    Dynamic,
    Hierarchical,
}

impl OrchestrationMode {
    pub const ALL: [OrchestrationMode; 6] = [
        OrchestrationMode::Basic,
        OrchestrationMode::SelfAttention,
        OrchestrationMode::CrossHead,
        OrchestrationMode::SharedCache,
        OrchestrationMode::Dynamic,
        OrchestrationMode::Hierarchical,
    ];

    /// Registered strategy name.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrchestrationMode::Basic => "basic",
            OrchestrationMode::SelfAttention => "self-attention",
            OrchestrationMode::CrossHead => "cross-head",
            OrchestrationMode::SharedCache => "shared-cache",
            OrchestrationMode::Dynamic => "dynamic",
            OrchestrationMode::Hierarchical => "hierarchical",
        }
    }

    /// One-line description of how heads coordinate under this mode.
    pub fn explanation(&self) -> &'static str {
        match self {
            OrchestrationMode::Basic => {
                "Each attention head works independently without sharing information."
            }
            OrchestrationMode::SelfAttention => {
                "Each head attends over its own cache, including the current token."
            }
            OrchestrationMode::CrossHead => {
                "Heads communicate and share attention patterns with each other."
            }
            OrchestrationMode::SharedCache => {
                "Heads share a common cache to reduce memory usage."
            }
            OrchestrationMode::Dynamic => {
                "Resources are allocated dynamically based on input complexity."
            }
            OrchestrationMode::Hierarchical => {
                "Heads process tokens in layers with dependencies."
            }
        }
    }
}

impl fmt::Display for OrchestrationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrchestrationMode {
    type Err = SimulationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrchestrationMode::ALL
            .into_iter()
            .find(|mode| mode.as_str() == s)
            .ok_or_else(|| SimulationError::UnknownMode(s.to_string()))
    }
}

/// A policy for dispatching tokens to heads.
///
/// Strategies receive the full head collection on every call. Heads are
/// always updated sequentially; a call returns only after every head it
/// touches has been updated.
pub trait OrchestrationStrategy: Send {
    /// Registry name, e.g. `"cross-head"`.
    fn name(&self) -> &str;

    /// Feed `token` at `position` to the heads.
    fn process_token(&mut self, token: &str, position: usize, heads: &mut [AttentionHead]);

    /// Attention weights for `query`, one vector per head in head order.
    fn compute_attention(&mut self, query: &str, heads: &mut [AttentionHead]) -> Vec<Vec<f32>>;

    /// Clear any strategy-owned state.
    fn reset(&mut self) {}

    /// Number of entries in strategy-owned state (0 for stateless strategies).
    fn auxiliary_len(&self) -> usize {
        0
    }
}

/// The six built-in strategies, in [`OrchestrationMode::ALL`] order.
pub fn builtin_strategies(
    config: &SimulationConfig,
    events: Arc<dyn EventSink>,
) -> Vec<Box<dyn OrchestrationStrategy>> {
    vec![
        Box::new(BasicStrategy),
        Box::new(SelfAttentionStrategy),
        Box::new(CrossHeadStrategy::new(seeded_source(config.seed, CROSS_HEAD_SALT))),
        Box::new(SharedCacheStrategy::new()),
        Box::new(DynamicStrategy),
        Box::new(HierarchicalStrategy::new(config.layer_stagger_ms).with_events(events)),
    ]
}

/// Owns the heads and routes calls to the active strategy.
pub struct OrchestrationManager {
    heads: Vec<AttentionHead>,
    strategies: Vec<Box<dyn OrchestrationStrategy>>,
    active: usize,
}

impl OrchestrationManager {
    /// Manager over `heads` with the built-in strategies and `basic` active.
    pub fn new(heads: Vec<AttentionHead>) -> Result<Self, SimulationError> {
        let config = SimulationConfig::default();
        Self::with_strategies(heads, builtin_strategies(&config, Arc::new(NullSink)))
    }

    /// Build heads and strategies from `config`, activating `config.mode`.
    pub fn from_config(
        config: &SimulationConfig,
        events: Arc<dyn EventSink>,
    ) -> Result<Self, SimulationError> {
        config.validate()?;

        let heads = config
            .heads
            .iter()
            .enumerate()
            .map(|(i, head)| {
                AttentionHead::with_rng(
                    head.id.clone(),
                    head.specialization,
                    seeded_source(config.seed, i as u64 + 1),
                )
                .with_embedding_dim(config.embedding_dim)
                .with_events(events.clone())
            })
            .collect();

        let mut manager = Self::with_strategies(heads, builtin_strategies(config, events))?;
        manager.set_strategy(config.mode.as_str());
        Ok(manager)
    }

    /// Manager with an explicit strategy list. The first strategy is active.
    ///
    /// Fails if the list is empty or a name is blank or duplicated.
    pub fn with_strategies(
        heads: Vec<AttentionHead>,
        strategies: Vec<Box<dyn OrchestrationStrategy>>,
    ) -> Result<Self, SimulationError> {
        if strategies.is_empty() {
            return Err(SimulationError::Registration(
                "at least one strategy is required".to_string(),
            ));
        }

        let mut manager = Self {
            heads,
            strategies: Vec::with_capacity(strategies.len()),
            active: 0,
        };
        for strategy in strategies {
            manager.register(strategy)?;
        }
        manager.notify_strategy_change();
        Ok(manager)
    }

    /// Add a strategy to the registry without activating it.
    pub fn register(
        &mut self,
        strategy: Box<dyn OrchestrationStrategy>,
    ) -> Result<(), SimulationError> {
        let name = strategy.name();
        if name.trim().is_empty() {
            return Err(SimulationError::Registration(
                "strategy name must not be empty".to_string(),
            ));
        }
        if self.strategies.iter().any(|s| s.name() == name) {
            return Err(SimulationError::Registration(format!(
                "strategy '{}' is already registered",
                name
            )));
        }
        debug!(strategy = name, "registered orchestration strategy");
        self.strategies.push(strategy);
        Ok(())
    }

    /// Switch the active strategy. Unknown names are ignored and return `false`.
    ///
    /// Head caches are left untouched; every head is told the new mode label.
    pub fn set_strategy(&mut self, name: &str) -> bool {
        match self.strategies.iter().position(|s| s.name() == name) {
            Some(index) => {
                self.active = index;
                info!(strategy = name, "orchestration strategy switched");
                self.notify_strategy_change();
                true
            }
            None => {
                warn!(strategy = name, "ignoring unknown orchestration strategy");
                false
            }
        }
    }

    fn notify_strategy_change(&mut self) {
        let name = self.strategies[self.active].name().to_string();
        for head in &mut self.heads {
            head.set_orchestration_mode(&name);
        }
    }

    pub fn active_strategy_name(&self) -> &str {
        self.strategies[self.active].name()
    }

    /// The active built-in mode, or `None` for a custom strategy.
    pub fn active_mode(&self) -> Option<OrchestrationMode> {
        self.active_strategy_name().parse().ok()
    }

    pub fn active_strategy(&self) -> &dyn OrchestrationStrategy {
        self.strategies[self.active].as_ref()
    }

    pub fn strategy_names(&self) -> Vec<&str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.strategies.iter().any(|s| s.name() == name)
    }

    pub fn process_token(&mut self, token: &str, position: usize) {
        self.strategies[self.active].process_token(token, position, &mut self.heads);
    }

    pub fn compute_attention(&mut self, query: &str) -> Vec<Vec<f32>> {
        self.strategies[self.active].compute_attention(query, &mut self.heads)
    }

    /// Clear every head cache, then the active strategy's own state.
    pub fn reset(&mut self) {
        for head in &mut self.heads {
            head.clear_cache();
        }
        self.strategies[self.active].reset();
        info!(strategy = self.active_strategy_name(), "orchestration reset");
    }

    pub fn heads(&self) -> &[AttentionHead] {
        &self.heads
    }

    pub fn head(&self, id: &str) -> Option<&AttentionHead> {
        self.heads.iter().find(|h| h.id() == id)
    }
}
