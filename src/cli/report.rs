//! Serializable summaries printed by the binaries.

use serde::Serialize;

use crate::engine::{ComparisonStats, TokenPipeline};
use crate::head::{AttentionHead, CacheValue, Specialization};

#[derive(Debug, Serialize)]
pub struct HeadReport {
    pub id: String,
    pub specialization: Specialization,
    pub cache_size: usize,
    pub keys: Vec<String>,
    pub values: Vec<CacheValue>,
}

impl HeadReport {
    pub fn from_head(head: &AttentionHead) -> Self {
        Self {
            id: head.id().to_string(),
            specialization: head.specialization(),
            cache_size: head.cache().len(),
            keys: head.cache().keys().to_vec(),
            values: head.cache().values().to_vec(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RunReport {
    pub mode: String,
    pub state: String,
    pub tokens: Vec<String>,
    pub position: usize,
    pub heads: Vec<HeadReport>,
    pub comparison: ComparisonStats,
}

impl RunReport {
    pub fn from_pipeline(pipeline: &TokenPipeline) -> Self {
        Self {
            mode: pipeline.manager().active_strategy_name().to_string(),
            state: pipeline.state().to_string(),
            tokens: pipeline.tokens().to_vec(),
            position: pipeline.position(),
            heads: pipeline
                .manager()
                .heads()
                .iter()
                .map(HeadReport::from_head)
                .collect(),
            comparison: pipeline.comparison().stats(),
        }
    }

    /// Human-readable rendering for `--output-format text`.
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!(
            "Mode: {}  State: {}  Position: {}/{}\n",
            self.mode,
            self.state,
            self.position,
            self.tokens.len()
        ));
        for head in &self.heads {
            out.push_str(&format!(
                "\n[{}] {} ({} cached)\n",
                head.id, head.specialization, head.cache_size
            ));
            for (key, value) in head.keys.iter().zip(&head.values) {
                let marker = if value.is_enhanced() { " *" } else { "" };
                out.push_str(&format!("  {:>3}  {}{}\n", value.position, key, marker));
            }
        }
        out.push_str(&format!("\n{}", render_stats(&self.comparison)));
        out
    }
}

/// Two-line counter summary shared by `kvsim-run` and `kvsim-compare`.
pub fn render_stats(stats: &ComparisonStats) -> String {
    let uncached = stats.without_cache.computations;
    let cached = stats.with_cache.computations;
    let saved = if uncached > 0 {
        100.0 * (uncached.saturating_sub(cached)) as f64 / uncached as f64
    } else {
        0.0
    };
    format!(
        "Without cache: {} computations\nWith cache:    {} computations, {} reused ({:.1}% saved)\n",
        uncached, cached, stats.with_cache.cached, saved
    )
}
