use thiserror::Error;

#[derive(Error, Debug)]
pub enum SimulationError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Strategy registration failed: {0}")]
    Registration(String),

    #[error("Unknown orchestration mode '{0}'. Options: basic, self-attention, cross-head, shared-cache, dynamic, hierarchical")]
    UnknownMode(String),
}
