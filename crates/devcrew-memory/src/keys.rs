//! Fixed key templates used by the orchestrator and agents.

use devcrew_core::TaskId;

/// World-state key of the aggregate system snapshot.
pub const SYSTEM_STATUS: &str = "system:status";

/// Durable (long-term) snapshot of a task; also the agent's short-term copy.
pub fn task(id: TaskId) -> String {
    format!("task:{id}")
}

/// World-state record published when an agent accepts a task.
pub fn task_assignment(id: TaskId) -> String {
    format!("task_assignment:{id}")
}

/// World-state record an agent writes when reporting progress.
pub fn task_progress(id: TaskId) -> String {
    format!("task_progress:{id}")
}
