//! Theoretical cost comparison between cached and uncached attention.
//!
//! [`ComputationComparison`] walks a token sequence and keeps two running
//! counters. Costs depend only on position and orchestration mode, never on
//! the contents of any head cache:
//!
//! - without a cache, step `p` re-attends to all `p + 1` tokens so far;
//! - with a cache, step `p` computes one new entry and reuses `p`;
//! - under `shared-cache`, a simulated hit (probability 0.3 for `p > 0`)
//!   reuses all `p + 1` entries and computes nothing.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info};

use crate::config::SimulationConfig;
use crate::engine::rng::{seeded_source, RandomSource};
use crate::events::{EventSink, NullSink, SimEvent};
use crate::orchestration::OrchestrationMode;

/// Salt for the comparator's random stream.
pub const COMPARISON_SALT: u64 = 0xC0_3A_A7;

/// Probability of a simulated shared-cache hit at step `position`.
pub const SHARED_CACHE_HIT_PROBABILITY: f32 = 0.3;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UncachedStats {
    pub computations: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CachedStats {
    pub computations: u64,
    pub cached: u64,
}

/// Running totals for both sides of the comparison.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ComparisonStats {
    pub without_cache: UncachedStats,
    pub with_cache: CachedStats,
}

/// Cost of a single step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StepCost {
    pub position: usize,
    pub uncached_computations: u64,
    pub cached_computations: u64,
    pub cached_reused: u64,
    /// Simulated shared-cache outcome; `None` outside shared-cache mode.
    pub cache_hit: Option<bool>,
}

/// Uncached cost of step `position`.
pub fn uncached_cost(position: usize) -> u64 {
    position as u64 + 1
}

/// Cached cost of step `position` as `(computations, reused)`.
///
/// `hit` only matters in shared-cache mode.
pub fn cached_cost(mode: Option<OrchestrationMode>, position: usize, hit: bool) -> (u64, u64) {
    let p = position as u64;
    match mode {
        Some(OrchestrationMode::SharedCache) if hit => (0, p + 1),
        _ => (1, p),
    }
}

/// Hit probability for the shared-cache model at `position`.
pub fn shared_cache_hit_probability(position: usize) -> f32 {
    if position > 0 {
        SHARED_CACHE_HIT_PROBABILITY
    } else {
        0.0
    }
}

/// Steps through a token sequence accumulating both cost counters.
pub struct ComputationComparison {
    tokens: Vec<String>,
    mode: String,
    position: usize,
    running: bool,
    delay: Duration,
    stats: ComparisonStats,
    rng: Box<dyn RandomSource>,
    events: Arc<dyn EventSink>,
}

impl ComputationComparison {
    pub fn new(rng: Box<dyn RandomSource>, delay: Duration) -> Self {
        Self {
            tokens: Vec::new(),
            mode: OrchestrationMode::Basic.as_str().to_string(),
            position: 0,
            running: false,
            delay,
            stats: ComparisonStats::default(),
            rng,
            events: Arc::new(NullSink),
        }
    }

    pub fn from_config(config: &SimulationConfig, events: Arc<dyn EventSink>) -> Self {
        Self::new(
            seeded_source(config.seed, COMPARISON_SALT),
            config.comparison_delay(),
        )
        .with_events(events)
    }

    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    /// Reset both counters and begin a run over `tokens` under `mode`.
    ///
    /// Unrecognized modes are costed like `basic`.
    pub fn start_comparison(&mut self, tokens: &[String], mode: &str) {
        self.tokens = tokens.to_vec();
        self.mode = mode.to_string();
        self.position = 0;
        self.stats = ComparisonStats::default();
        self.running = !self.tokens.is_empty();
        info!(tokens = self.tokens.len(), mode = %self.mode, "comparison started");
        self.publish_counters();
    }

    /// Advance one position. Returns `None` once every token is costed.
    pub fn advance_one(&mut self) -> Option<StepCost> {
        if self.position >= self.tokens.len() {
            self.running = false;
            return None;
        }

        let position = self.position;
        let mode = self.mode.parse::<OrchestrationMode>().ok();

        let cache_hit = match mode {
            Some(OrchestrationMode::SharedCache) => {
                Some(self.rng.next_f32() < shared_cache_hit_probability(position))
            }
            _ => None,
        };

        let uncached = uncached_cost(position);
        let (computations, reused) = cached_cost(mode, position, cache_hit.unwrap_or(false));

        self.stats.without_cache.computations += uncached;
        self.stats.with_cache.computations += computations;
        self.stats.with_cache.cached += reused;

        if let Some(hit) = cache_hit {
            let token = &self.tokens[position];
            let message = if hit {
                format!("Cache HIT for \"{}\" - reusing cached computation!", token)
            } else {
                format!("Cache MISS for \"{}\" - computing new attention weights", token)
            };
            self.events.emit(SimEvent::DescriptionUpdated { message });
        }

        self.position += 1;
        if self.position >= self.tokens.len() {
            self.running = false;
        }

        debug!(
            position,
            without_cache = self.stats.without_cache.computations,
            with_cache = self.stats.with_cache.computations,
            cached = self.stats.with_cache.cached,
            "comparison step"
        );
        self.publish_counters();

        Some(StepCost {
            position,
            uncached_computations: uncached,
            cached_computations: computations,
            cached_reused: reused,
            cache_hit,
        })
    }

    /// Scheduler entry point: advance if running and return the delay
    /// before the next tick, or `None` when idle.
    pub fn tick(&mut self) -> Option<Duration> {
        if !self.running {
            return None;
        }
        self.advance_one();
        self.running.then_some(self.delay)
    }

    /// Advance through every remaining token.
    pub fn run_to_end(&mut self) -> ComparisonStats {
        while self.advance_one().is_some() {}
        self.stats
    }

    /// Stop scheduling further steps. Counters are kept.
    pub fn stop(&mut self) {
        self.running = false;
    }

    fn publish_counters(&self) {
        self.events.emit(SimEvent::CountersUpdated {
            without_cache: self.stats.without_cache.computations,
            with_cache: self.stats.with_cache.computations,
            cached: self.stats.with_cache.cached,
        });
    }

    pub fn stats(&self) -> ComparisonStats {
        self.stats
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    pub fn mode(&self) -> &str {
        &self.mode
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn animation_delay(&self) -> Duration {
        self.delay
    }

    pub fn set_animation_speed(&mut self, delay: Duration) {
        self.delay = delay;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::rng::{FixedSource, XorShiftRng};
    use crate::events::RecordingSink;

    fn tokens(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    fn comparison(rng: Box<dyn RandomSource>) -> ComputationComparison {
        ComputationComparison::new(rng, Duration::from_millis(10))
    }

    #[test]
    fn test_without_cache_is_triangular() {
        let mut cmp = comparison(Box::new(XorShiftRng::new(1)));
        cmp.start_comparison(&tokens(&["a", "b", "c", "d"]), "basic");
        let stats = cmp.run_to_end();
        assert_eq!(stats.without_cache.computations, 10);
    }

    #[test]
    fn test_basic_with_cache_costs() {
        let mut cmp = comparison(Box::new(XorShiftRng::new(1)));
        cmp.start_comparison(&tokens(&["a", "b", "c", "d"]), "basic");
        let stats = cmp.run_to_end();
        assert_eq!(stats.with_cache.computations, 4);
        assert_eq!(stats.with_cache.cached, 6);
    }

    #[test]
    fn test_self_attention_and_unknown_modes_cost_like_basic() {
        for mode in ["self-attention", "cross-head", "dynamic", "hierarchical", "custom"] {
            let mut cmp = comparison(Box::new(XorShiftRng::new(1)));
            cmp.start_comparison(&tokens(&["a", "b", "c", "d"]), mode);
            let stats = cmp.run_to_end();
            assert_eq!(stats.with_cache, CachedStats { computations: 4, cached: 6 }, "mode {}", mode);
        }
    }

    #[test]
    fn test_shared_cache_all_hits_after_first() {
        // 0.0 < 0.3 always hits where allowed; position 0 can never hit.
        let mut cmp = comparison(Box::new(FixedSource::constant(0.0)));
        cmp.start_comparison(&tokens(&["a", "b", "c", "d"]), "shared-cache");
        let stats = cmp.run_to_end();
        assert_eq!(stats.with_cache.computations, 1);
        assert_eq!(stats.with_cache.cached, 2 + 3 + 4);
        assert_eq!(stats.without_cache.computations, 10);
    }

    #[test]
    fn test_shared_cache_all_misses() {
        let mut cmp = comparison(Box::new(FixedSource::constant(0.9)));
        cmp.start_comparison(&tokens(&["a", "b", "c", "d"]), "shared-cache");
        let stats = cmp.run_to_end();
        assert_eq!(stats.with_cache, CachedStats { computations: 4, cached: 6 });
    }

    #[test]
    fn test_shared_cache_totals_are_consistent() {
        // Every step accounts for p + 1 tokens either as computed or reused.
        let mut cmp = comparison(Box::new(XorShiftRng::new(99)));
        let words: Vec<String> = (0..20).map(|i| format!("t{}", i)).collect();
        cmp.start_comparison(&words, "shared-cache");
        let stats = cmp.run_to_end();
        assert_eq!(
            stats.with_cache.computations + stats.with_cache.cached,
            stats.without_cache.computations
        );
        assert!(stats.with_cache.computations <= 20);
    }

    #[test]
    fn test_totals_queryable_mid_run() {
        let mut cmp = comparison(Box::new(XorShiftRng::new(1)));
        cmp.start_comparison(&tokens(&["a", "b", "c", "d"]), "basic");
        cmp.advance_one();
        cmp.advance_one();
        assert_eq!(cmp.position(), 2);
        assert!(cmp.is_running());
        let stats = cmp.stats();
        assert_eq!(stats.without_cache.computations, 3);
        assert_eq!(stats.with_cache, CachedStats { computations: 2, cached: 1 });
    }

    #[test]
    fn test_start_resets_counters() {
        let mut cmp = comparison(Box::new(XorShiftRng::new(1)));
        cmp.start_comparison(&tokens(&["a", "b"]), "basic");
        cmp.run_to_end();
        cmp.start_comparison(&tokens(&["x"]), "basic");
        assert_eq!(cmp.stats(), ComparisonStats::default());
        assert_eq!(cmp.run_to_end().without_cache.computations, 1);
    }

    #[test]
    fn test_tick_cadence_and_completion() {
        let mut cmp = comparison(Box::new(XorShiftRng::new(1)));
        assert_eq!(cmp.tick(), None);

        cmp.start_comparison(&tokens(&["a", "b"]), "basic");
        assert_eq!(cmp.tick(), Some(Duration::from_millis(10)));
        assert_eq!(cmp.tick(), None);
        assert!(!cmp.is_running());
        assert_eq!(cmp.advance_one(), None);
    }

    #[test]
    fn test_stop_keeps_counters() {
        let mut cmp = comparison(Box::new(XorShiftRng::new(1)));
        cmp.start_comparison(&tokens(&["a", "b", "c"]), "basic");
        cmp.tick();
        cmp.stop();
        assert_eq!(cmp.tick(), None);
        assert_eq!(cmp.stats().without_cache.computations, 1);
    }

    #[test]
    fn test_empty_sequence_never_runs() {
        let mut cmp = comparison(Box::new(XorShiftRng::new(1)));
        cmp.start_comparison(&[], "basic");
        assert!(!cmp.is_running());
        assert_eq!(cmp.run_to_end(), ComparisonStats::default());
    }

    #[test]
    fn test_step_cost_reports_hit() {
        let mut cmp = comparison(Box::new(FixedSource::constant(0.0)));
        cmp.start_comparison(&tokens(&["a", "b"]), "shared-cache");
        let first = cmp.advance_one().unwrap();
        assert_eq!(first.cache_hit, Some(false));
        let second = cmp.advance_one().unwrap();
        assert_eq!(second.cache_hit, Some(true));
        assert_eq!(second.cached_computations, 0);
        assert_eq!(second.cached_reused, 2);
    }

    #[test]
    fn test_events_published() {
        let sink = Arc::new(RecordingSink::new());
        let mut cmp = comparison(Box::new(FixedSource::constant(0.0))).with_events(sink.clone());
        cmp.start_comparison(&tokens(&["cat", "dog"]), "shared-cache");
        cmp.run_to_end();

        let events = sink.events();
        assert_eq!(
            events.last(),
            Some(&SimEvent::CountersUpdated {
                without_cache: 3,
                with_cache: 1,
                cached: 2
            })
        );
        let descriptions: Vec<&SimEvent> = events
            .iter()
            .filter(|e| matches!(e, SimEvent::DescriptionUpdated { .. }))
            .collect();
        assert_eq!(descriptions.len(), 2);
        assert_eq!(
            descriptions[1],
            &SimEvent::DescriptionUpdated {
                message: "Cache HIT for \"dog\" - reusing cached computation!".to_string()
            }
        );
    }

    #[test]
    fn test_set_animation_speed() {
        let mut cmp = comparison(Box::new(XorShiftRng::new(1)));
        cmp.set_animation_speed(Duration::from_millis(250));
        assert_eq!(cmp.animation_delay(), Duration::from_millis(250));
    }
}
