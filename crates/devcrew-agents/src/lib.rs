//! Concrete devcrew agents.
//!
//! Every agent here embeds an [`AgentCore`](devcrew_orchestrator::AgentCore),
//! turns its current task into a prompt and asks an [`LlmClient`] for the
//! answer.

pub mod code_generator;
pub mod llm;
mod prompt;
pub mod test_writer;

pub use code_generator::CodeGeneratorAgent;
pub use llm::{LlmClient, MockLlmClient};
pub use test_writer::TestWriterAgent;

/// Capability tag served by [`CodeGeneratorAgent`].
pub const CODE_GENERATION: &str = "code_generation";
/// Capability tag served by [`TestWriterAgent`].
pub const TEST_WRITING: &str = "test_writing";
