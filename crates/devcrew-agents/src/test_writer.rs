use crate::llm::LlmClient;
use crate::{prompt, TEST_WRITING};
use async_trait::async_trait;
use devcrew_core::DevcrewResult;
use devcrew_memory::{keys, MemoryClient};
use devcrew_orchestrator::{Agent, AgentCore, ProgressReport, Task};
use std::sync::Arc;
use tracing::{debug, info, warn};

const INSTRUCTIONS: &str = "You are a Rust engineer who writes unit tests. Write a \
`#[cfg(test)]` module that checks the behavior described below, including edge cases \
and error handling.";

const CONTEXT_LIMIT: usize = 5;

/// Agent that writes tests with an LLM.
///
/// Outputs of completed dependencies (usually the code under test) are read
/// from their durable task snapshots and quoted in the prompt.
pub struct TestWriterAgent {
    core: AgentCore,
    llm: Arc<dyn LlmClient>,
}

impl TestWriterAgent {
    pub fn new(
        name: impl Into<String>,
        memory: Arc<dyn MemoryClient>,
        llm: Arc<dyn LlmClient>,
    ) -> Self {
        Self {
            core: AgentCore::new(name, [TEST_WRITING], memory),
            llm,
        }
    }

    async fn dependency_outputs(&self, task: &Task) -> Vec<(String, String)> {
        let mut sections = Vec::new();
        for dep in &task.dependencies {
            match self.core.memory().get_long_term(&keys::task(*dep)).await {
                Ok(Some(snapshot)) => {
                    let output = snapshot
                        .get("result")
                        .and_then(|r| r.get("output"))
                        .and_then(serde_json::Value::as_str);
                    if let Some(output) = output {
                        sections.push(("Code under test".to_string(), output.to_string()));
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(
                        task_id = %task.id,
                        dependency = %dep,
                        error = %e,
                        "Could not read dependency output"
                    );
                }
            }
        }
        sections
    }
}

#[async_trait]
impl Agent for TestWriterAgent {
    fn core(&self) -> &AgentCore {
        &self.core
    }

    async fn execute(&self) -> DevcrewResult<()> {
        let Some(task) = self.core.current_task().await else {
            debug!(agent = %self.core.id(), "No task assigned");
            return Ok(());
        };

        info!(agent = %self.core.id(), task_id = %task.id, "Writing tests");
        self.core
            .report_progress(ProgressReport::in_progress("Writing tests"))
            .await;

        let sections = self.dependency_outputs(&task).await;
        let context = self.core.get_context(&task.description, CONTEXT_LIMIT).await;
        let prompt = prompt::build(INSTRUCTIONS, &task, &sections, &context);

        let report = match self.llm.generate(&prompt).await {
            Ok(output) => {
                ProgressReport::completed(output).with_message("Test writing successful")
            }
            Err(e) => {
                warn!(
                    agent = %self.core.id(),
                    task_id = %task.id,
                    error = %e,
                    "Test writing failed"
                );
                ProgressReport::failed(format!("Test writing failed: {e}"))
            }
        };
        self.core.report_progress(report).await;
        Ok(())
    }
}
