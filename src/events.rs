//! Events emitted by the simulation core for a presentation layer.
//!
//! The core never renders anything. Heads, strategies, the pipeline and the
//! comparator publish [`SimEvent`]s to a shared [`EventSink`]; a consumer
//! decides what to draw, log or record.

use std::sync::Mutex;

use serde::Serialize;
use tracing::debug;

use crate::engine::pipeline::PipelineState;
use crate::head::{CacheValue, Specialization};

/// Everything observable about a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum SimEvent {
    // Head lifecycle
    CacheItemAdded {
        head: String,
        key: String,
        value: CacheValue,
        token: String,
    },
    CacheCleared {
        head: String,
    },
    ModeChanged {
        head: String,
        mode: String,
    },
    SharedCacheHit {
        head: String,
        token: String,
    },
    AllocationAssigned {
        head: String,
        allocation: f32,
    },
    SharedInfoReceived {
        head: String,
        peers: usize,
    },
    AttentionComputed {
        head: String,
        weights: Vec<f32>,
    },
    LayerStarted {
        specialization: Specialization,
        offset_ms: u64,
    },

    // Pipeline
    StateChanged {
        state: PipelineState,
    },
    StatusChanged {
        message: String,
    },
    PositionChanged {
        current: usize,
        total: usize,
    },
    TokensLoaded {
        tokens: Vec<String>,
    },
    TokenHighlighted {
        token: String,
        position: usize,
    },
    TokenProcessed {
        token: String,
        position: usize,
    },
    ExplanationChanged {
        mode: String,
        text: String,
    },

    // Comparison
    CountersUpdated {
        without_cache: u64,
        with_cache: u64,
        cached: u64,
    },
    DescriptionUpdated {
        message: String,
    },
}

impl SimEvent {
    /// Stable kebab-case event name.
    pub fn name(&self) -> &'static str {
        match self {
            SimEvent::CacheItemAdded { .. } => "cache-item-added",
            SimEvent::CacheCleared { .. } => "cache-cleared",
            SimEvent::ModeChanged { .. } => "mode-changed",
            SimEvent::SharedCacheHit { .. } => "shared-cache-hit",
            SimEvent::AllocationAssigned { .. } => "allocation-assigned",
            SimEvent::SharedInfoReceived { .. } => "shared-info-received",
            SimEvent::AttentionComputed { .. } => "attention-computed",
            SimEvent::LayerStarted { .. } => "layer-started",
            SimEvent::StateChanged { .. } => "state-changed",
            SimEvent::StatusChanged { .. } => "status-changed",
            SimEvent::PositionChanged { .. } => "position-changed",
            SimEvent::TokensLoaded { .. } => "tokens-loaded",
            SimEvent::TokenHighlighted { .. } => "token-highlighted",
            SimEvent::TokenProcessed { .. } => "token-processed",
            SimEvent::ExplanationChanged { .. } => "explanation-changed",
            SimEvent::CountersUpdated { .. } => "counters-updated",
            SimEvent::DescriptionUpdated { .. } => "description-updated",
        }
    }
}

/// Receiver for simulation events.
///
/// Implementations must be `Send + Sync`; the sink is shared by every
/// component of a run.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: SimEvent);
}

impl<F> EventSink for F
where
    F: Fn(SimEvent) + Send + Sync,
{
    fn emit(&self, event: SimEvent) {
        self(event)
    }
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: SimEvent) {}
}

/// Forwards events to `tracing` at debug level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: SimEvent) {
        debug!(event = event.name(), detail = ?event, "sim event");
    }
}

/// Buffers events in memory.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<SimEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every event recorded so far.
    pub fn events(&self) -> Vec<SimEvent> {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Drain the recorded events.
    pub fn take(&self) -> Vec<SimEvent> {
        std::mem::take(&mut *self.events.lock().unwrap_or_else(|e| e.into_inner()))
    }

    pub fn len(&self) -> usize {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: SimEvent) {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(event);
    }
}
