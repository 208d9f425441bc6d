use crate::llm::LlmClient;
use crate::{prompt, CODE_GENERATION};
use async_trait::async_trait;
use devcrew_core::DevcrewResult;
use devcrew_memory::MemoryClient;
use devcrew_orchestrator::{Agent, AgentCore, ProgressReport};
use std::sync::Arc;
use tracing::{debug, info, warn};

const INSTRUCTIONS: &str = "You are a senior Rust developer. Write idiomatic, documented \
source code that satisfies the task below. Reply with a single fenced code block followed \
by a short explanation.";

/// Number of memory entries pulled into the prompt.
const CONTEXT_LIMIT: usize = 5;

/// Agent that writes implementation code with an LLM.
pub struct CodeGeneratorAgent {
    core: AgentCore,
    llm: Arc<dyn LlmClient>,
}

impl CodeGeneratorAgent {
    pub fn new(
        name: impl Into<String>,
        memory: Arc<dyn MemoryClient>,
        llm: Arc<dyn LlmClient>,
    ) -> Self {
        Self {
            core: AgentCore::new(name, [CODE_GENERATION], memory),
            llm,
        }
    }
}

#[async_trait]
impl Agent for CodeGeneratorAgent {
    fn core(&self) -> &AgentCore {
        &self.core
    }

    async fn execute(&self) -> DevcrewResult<()> {
        let Some(task) = self.core.current_task().await else {
            debug!(agent = %self.core.id(), "No task assigned");
            return Ok(());
        };

        info!(agent = %self.core.id(), task_id = %task.id, "Generating code");
        self.core
            .report_progress(ProgressReport::in_progress("Generating code"))
            .await;

        let context = self.core.get_context(&task.description, CONTEXT_LIMIT).await;
        let prompt = prompt::build(INSTRUCTIONS, &task, &[], &context);

        let report = match self.llm.generate(&prompt).await {
            Ok(output) => {
                ProgressReport::completed(output).with_message("Code generation successful")
            }
            Err(e) => {
                warn!(
                    agent = %self.core.id(),
                    task_id = %task.id,
                    error = %e,
                    "Code generation failed"
                );
                ProgressReport::failed(format!("Code generation failed: {e}"))
            }
        };
        self.core.report_progress(report).await;
        Ok(())
    }
}
