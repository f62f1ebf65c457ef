//! Simulation configuration.
//!
//! Every knob of a run lives in [`SimulationConfig`]: cadences, the head set,
//! the initial orchestration mode and the random seed. Configs can be built in
//! code or loaded from JSON; missing fields take their defaults.

use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::SimulationError;
use crate::head::{Specialization, DEFAULT_EMBEDDING_DIM};
use crate::orchestration::OrchestrationMode;

/// One head slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeadConfig {
    pub id: String,
    pub specialization: Specialization,
}

impl HeadConfig {
    pub fn new(id: impl Into<String>, specialization: Specialization) -> Self {
        Self {
            id: id.into(),
            specialization,
        }
    }
}

/// Full configuration for a simulation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Delay between pipeline advances in continuous mode.
    pub processing_delay_ms: u64,
    /// Delay between comparator advances.
    pub comparison_delay_ms: u64,
    /// Logical offset between consecutive hierarchical layers.
    pub layer_stagger_ms: u64,
    /// Length of placeholder embeddings.
    pub embedding_dim: usize,
    /// Seed for every random stream. `None` seeds from the clock.
    pub seed: Option<u64>,
    /// Orchestration mode active at start.
    pub mode: OrchestrationMode,
    pub heads: Vec<HeadConfig>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            processing_delay_ms: 1000,
            comparison_delay_ms: 1500,
            layer_stagger_ms: 200,
            embedding_dim: DEFAULT_EMBEDDING_DIM,
            seed: None,
            mode: OrchestrationMode::Basic,
            heads: Self::default_heads(),
        }
    }
}

impl SimulationConfig {
    /// The four reference heads: syntax, semantic, positional, long-range.
    pub fn default_heads() -> Vec<HeadConfig> {
        Specialization::ALL
            .iter()
            .enumerate()
            .map(|(i, &spec)| HeadConfig::new(format!("head-{}", i + 1), spec))
            .collect()
    }

    pub fn processing_delay(&self) -> Duration {
        Duration::from_millis(self.processing_delay_ms)
    }

    pub fn comparison_delay(&self) -> Duration {
        Duration::from_millis(self.comparison_delay_ms)
    }

    /// Check structural constraints.
    pub fn validate(&self) -> Result<(), SimulationError> {
        if self.heads.is_empty() {
            return Err(SimulationError::InvalidConfig(
                "at least one head is required".to_string(),
            ));
        }
        if self.embedding_dim == 0 {
            return Err(SimulationError::InvalidConfig(
                "embedding_dim must be greater than 0".to_string(),
            ));
        }
        let mut seen = HashSet::new();
        for head in &self.heads {
            if head.id.trim().is_empty() {
                return Err(SimulationError::InvalidConfig(
                    "head id must not be blank".to_string(),
                ));
            }
            if !seen.insert(head.id.as_str()) {
                return Err(SimulationError::InvalidConfig(format!(
                    "duplicate head id '{}'",
                    head.id
                )));
            }
        }
        Ok(())
    }

    /// Parse and validate a JSON config.
    pub fn from_json_str(json: &str) -> Result<Self, SimulationError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON config file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, SimulationError> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&text)
    }
}
