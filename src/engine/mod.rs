//! Simulation drivers.
//!
//! - [`TokenPipeline`]: input text → tokens → orchestrated heads, step by step
//! - [`ComputationComparison`]: cached vs. uncached cost counters
//! - [`CooperativeScheduler`]: single-threaded cadence for both
//! - [`rng`]: injectable random sources

pub mod comparison;
pub mod pipeline;
pub mod rng;
pub mod scheduler;

pub use comparison::{ComparisonStats, ComputationComparison};
pub use pipeline::{PipelineState, StepOutcome, StepReport, TokenPipeline};
pub use scheduler::{
    Clock, CooperativeScheduler, Fired, RunSummary, SystemClock, Timer, VirtualClock,
};
