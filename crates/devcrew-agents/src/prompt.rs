use devcrew_orchestrator::Task;
use serde_json::Value;
use std::fmt::Write;

/// Render the prompt an agent sends to its LLM.
///
/// Sections appear in a fixed order: role instructions, the task, its
/// requirements, any extra `sections` supplied by the agent, then related
/// context from memory.
pub(crate) fn build(
    instructions: &str,
    task: &Task,
    sections: &[(String, String)],
    context: &[Value],
) -> String {
    let mut prompt = String::new();
    let _ = writeln!(prompt, "{instructions}\n");
    let _ = writeln!(prompt, "## Task\n{}\n", task.description);

    if !task.requirements.is_empty() {
        let _ = writeln!(prompt, "## Requirements");
        for requirement in &task.requirements {
            let _ = writeln!(prompt, "- {requirement}");
        }
        prompt.push('\n');
    }

    for (title, body) in sections {
        let _ = writeln!(prompt, "## {title}\n{body}\n");
    }

    if !context.is_empty() {
        let _ = writeln!(prompt, "## Related context");
        for item in context {
            let _ = writeln!(prompt, "- {item}");
        }
    }

    prompt
}
