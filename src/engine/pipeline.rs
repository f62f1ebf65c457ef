//! Token pipeline: the state machine that feeds tokens through the heads.
//!
//! ```text
//! Idle -> Tokenizing -> Processing <-> Paused -> Complete -> (reset) -> Idle
//! ```
//!
//! The pipeline owns no timer. Continuous processing is driven from outside
//! by calling [`TokenPipeline::tick`] after the delay it returns, usually via
//! [`CooperativeScheduler`](super::scheduler::CooperativeScheduler).

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::SimulationConfig;
use crate::engine::comparison::ComputationComparison;
use crate::error::SimulationError;
use crate::events::{EventSink, SimEvent};
use crate::orchestration::{OrchestrationManager, OrchestrationMode};
use crate::tokenizer::{Tokenizer, WordTokenizer};

/// Pipeline lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PipelineState {
    /// No tokens loaded.
    Idle,
    /// Input is being split into tokens.
    Tokenizing,
    /// Continuous processing is advancing.
    Processing,
    /// Tokens loaded but continuous processing is stopped.
    Paused,
    /// Every token has been processed.
    Complete,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineState::Idle => "idle",
            PipelineState::Tokenizing => "tokenizing",
            PipelineState::Processing => "processing",
            PipelineState::Paused => "paused",
            PipelineState::Complete => "complete",
        };
        f.write_str(name)
    }
}

/// What one advance did.
#[derive(Debug, Clone, PartialEq)]
pub struct StepReport {
    pub token: String,
    pub position: usize,
    /// Attention weights per head, as returned by the active strategy.
    pub weights: Vec<Vec<f32>>,
}

/// Result of [`TokenPipeline::step`] and [`TokenPipeline::advance_one_token`].
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    Advanced(StepReport),
    /// Every token was already processed.
    Exhausted,
    /// Nothing loaded and the input is blank.
    NoInput,
}

/// Drives tokens through an [`OrchestrationManager`] and a [`ComputationComparison`].
pub struct TokenPipeline {
    manager: OrchestrationManager,
    comparison: ComputationComparison,
    tokenizer: Box<dyn Tokenizer>,
    input: String,
    tokens: Vec<String>,
    position: usize,
    is_processing: bool,
    state: PipelineState,
    processing_delay: Duration,
    events: Arc<dyn EventSink>,
}

impl TokenPipeline {
    pub fn new(
        manager: OrchestrationManager,
        comparison: ComputationComparison,
        processing_delay: Duration,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            manager,
            comparison,
            tokenizer: Box::new(WordTokenizer),
            input: String::new(),
            tokens: Vec::new(),
            position: 0,
            is_processing: false,
            state: PipelineState::Idle,
            processing_delay,
            events,
        }
    }

    /// Build the heads, strategies, comparator and pipeline for `config`.
    pub fn from_config(
        config: &SimulationConfig,
        events: Arc<dyn EventSink>,
    ) -> Result<Self, SimulationError> {
        let manager = OrchestrationManager::from_config(config, events.clone())?;
        let comparison = ComputationComparison::from_config(config, events.clone());
        Ok(Self::new(
            manager,
            comparison,
            config.processing_delay(),
            events,
        ))
    }

    /// Replace the tokenizer used for subsequent inputs.
    pub fn set_tokenizer(&mut self, tokenizer: Box<dyn Tokenizer>) {
        self.tokenizer = tokenizer;
    }

    /// Set the pending input text used by [`step`](Self::step).
    pub fn set_input(&mut self, text: impl Into<String>) {
        self.input = text.into();
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    /// Switch orchestration mode. Unknown names are rejected and return `false`.
    pub fn select_mode(&mut self, name: &str) -> bool {
        if !self.manager.set_strategy(name) {
            return false;
        }
        let text = name
            .parse::<OrchestrationMode>()
            .map(|mode| mode.explanation())
            .unwrap_or("Select a pattern to see explanation.");
        self.status(format!("Switched to {} orchestration", name));
        self.events.emit(SimEvent::ExplanationChanged {
            mode: name.to_string(),
            text: text.to_string(),
        });
        true
    }

    /// Tokenize `raw`, select `mode`, start a comparison run and begin
    /// continuous processing.
    ///
    /// Blank input, or input the tokenizer turns into no tokens, is ignored
    /// and returns `false`.
    pub fn process_input(&mut self, raw: &str, mode: &str) -> bool {
        if raw.trim().is_empty() {
            warn!("ignoring blank input");
            return false;
        }
        let tokens = self.tokenizer.tokenize(raw.trim());
        if tokens.is_empty() {
            warn!("ignoring input that produced no tokens");
            return false;
        }
        self.input = raw.to_string();
        self.load_tokens(tokens);
        self.select_mode(mode);

        self.is_processing = true;
        self.transition(PipelineState::Processing);
        self.status("Processing tokens...");

        let active = self.manager.active_strategy_name().to_string();
        self.comparison.start_comparison(&self.tokens, &active);
        info!(tokens = self.tokens.len(), mode = %active, "input loaded");
        true
    }

    fn load_tokens(&mut self, tokens: Vec<String>) {
        self.transition(PipelineState::Tokenizing);
        self.tokens = tokens;
        self.position = 0;
        self.events.emit(SimEvent::TokensLoaded {
            tokens: self.tokens.clone(),
        });
        self.publish_position();
    }

    /// Advance exactly one token, tokenizing the pending input first if
    /// nothing is loaded.
    ///
    /// Input that is blank or yields no tokens reports [`StepOutcome::NoInput`]
    /// without any state change.
    pub fn step(&mut self) -> StepOutcome {
        if self.tokens.is_empty() {
            if self.input.trim().is_empty() {
                return StepOutcome::NoInput;
            }
            let tokens = self.tokenizer.tokenize(self.input.trim());
            if tokens.is_empty() {
                return StepOutcome::NoInput;
            }
            self.load_tokens(tokens);
            self.transition(PipelineState::Paused);
            self.status("Ready to step through tokens...");
        }
        self.advance_one_token()
    }

    /// Process the token at the current position through the active strategy.
    pub fn advance_one_token(&mut self) -> StepOutcome {
        if self.position >= self.tokens.len() {
            self.is_processing = false;
            self.status("All tokens processed");
            return StepOutcome::Exhausted;
        }

        let position = self.position;
        let token = self.tokens[position].clone();
        self.events.emit(SimEvent::TokenHighlighted {
            token: token.clone(),
            position,
        });

        self.manager.process_token(&token, position);
        let weights = self.manager.compute_attention(&token);

        self.events.emit(SimEvent::TokenProcessed {
            token: token.clone(),
            position,
        });
        self.position += 1;
        self.publish_position();
        debug!(token = %token, position, "token processed");

        if self.position >= self.tokens.len() {
            self.finish();
        }

        StepOutcome::Advanced(StepReport {
            token,
            position,
            weights,
        })
    }

    /// Scheduler entry point for continuous processing.
    ///
    /// Advances one token if processing and returns the delay before the
    /// next tick, or `None` when paused or complete.
    pub fn tick(&mut self) -> Option<Duration> {
        if !self.is_processing {
            return None;
        }
        if self.position >= self.tokens.len() {
            self.finish();
            return None;
        }
        self.advance_one_token();
        self.is_processing.then_some(self.processing_delay)
    }

    /// Flip continuous processing. Returns the new processing flag.
    ///
    /// Pausing takes effect at the next tick boundary.
    pub fn toggle_pause(&mut self) -> bool {
        self.is_processing = !self.is_processing;
        if self.is_processing {
            if self.position >= self.tokens.len() {
                self.finish();
                return false;
            }
            self.transition(PipelineState::Processing);
            self.status("Processing resumed...");
        } else {
            if self.state == PipelineState::Processing {
                self.transition(PipelineState::Paused);
            }
            self.status("Processing paused");
        }
        self.is_processing
    }

    /// Clear tokens and position, stop processing and reset the orchestration.
    pub fn reset(&mut self) {
        self.tokens.clear();
        self.position = 0;
        self.is_processing = false;
        self.input.clear();
        self.manager.reset();
        self.comparison.stop();
        self.transition(PipelineState::Idle);
        self.status("Ready");
        self.publish_position();
        info!("pipeline reset");
    }

    fn finish(&mut self) {
        self.is_processing = false;
        if !self.tokens.is_empty() {
            self.transition(PipelineState::Complete);
        }
        self.status("Processing complete");
    }

    fn transition(&mut self, state: PipelineState) {
        if self.state != state {
            debug!(from = %self.state, to = %state, "pipeline state");
            self.state = state;
            self.events.emit(SimEvent::StateChanged { state });
        }
    }

    fn status(&self, message: impl Into<String>) {
        self.events.emit(SimEvent::StatusChanged {
            message: message.into(),
        });
    }

    fn publish_position(&self) {
        self.events.emit(SimEvent::PositionChanged {
            current: self.position,
            total: self.tokens.len(),
        });
    }

    pub fn set_processing_speed(&mut self, delay: Duration) {
        self.processing_delay = delay;
    }

    pub fn processing_delay(&self) -> Duration {
        self.processing_delay
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn is_processing(&self) -> bool {
        self.is_processing
    }

    pub fn is_complete(&self) -> bool {
        !self.tokens.is_empty() && self.position >= self.tokens.len()
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn manager(&self) -> &OrchestrationManager {
        &self.manager
    }

    pub fn manager_mut(&mut self) -> &mut OrchestrationManager {
        &mut self.manager
    }

    pub fn comparison(&self) -> &ComputationComparison {
        &self.comparison
    }

    pub fn comparison_mut(&mut self) -> &mut ComputationComparison {
        &mut self.comparison
    }
}
