use thiserror::Error;
use uuid::Uuid;

/// A convenience `Result` alias using [`DevcrewError`].
pub type DevcrewResult<T> = Result<T, DevcrewError>;

/// Top-level error type for the devcrew crates.
///
/// Eligibility refusals (busy agent, missing capability) and unknown task IDs
/// are not errors; they surface as `false` from the relevant operation.
#[derive(Error, Debug)]
pub enum DevcrewError {
    /// A task with this ID is already queued.
    #[error("Duplicate task id: {0}")]
    DuplicateTask(Uuid),

    /// An agent with this ID is already registered.
    #[error("Duplicate agent id: {0}")]
    DuplicateAgent(String),

    /// A failure inside the memory collaborator.
    #[error("Memory error: {0}")]
    Memory(String),

    /// A failure inside the language-model collaborator.
    #[error("LLM error: {0}")]
    Llm(String),

    /// An error in configuration parsing or validation.
    #[error("Config error: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
