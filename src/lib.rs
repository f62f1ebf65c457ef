pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod head;
pub mod orchestration;
pub mod tokenizer;

pub use config::{HeadConfig, SimulationConfig};
pub use engine::{ComputationComparison, CooperativeScheduler, TokenPipeline};
pub use error::SimulationError;
pub use events::{EventSink, SimEvent};
pub use head::{AttentionHead, Specialization};
pub use orchestration::{OrchestrationManager, OrchestrationMode, OrchestrationStrategy};
pub use tokenizer::{tokenize, NormalizingTokenizer, Tokenizer, WordTokenizer};
