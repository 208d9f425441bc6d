use crate::types::{AgentStatus, Task, TaskStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Number of tasks in each lifecycle state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskCounts {
    pub pending: usize,
    pub assigned: usize,
    pub completed: usize,
    pub failed: usize,
}

impl TaskCounts {
    pub fn record(&mut self, status: TaskStatus) {
        match status {
            TaskStatus::Pending => self.pending += 1,
            TaskStatus::Assigned => self.assigned += 1,
            TaskStatus::Completed => self.completed += 1,
            TaskStatus::Failed => self.failed += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.pending + self.assigned + self.completed + self.failed
    }
}

impl<'a> FromIterator<&'a Task> for TaskCounts {
    fn from_iter<I: IntoIterator<Item = &'a Task>>(iter: I) -> Self {
        let mut counts = Self::default();
        for task in iter {
            counts.record(task.status);
        }
        counts
    }
}

/// Number of agents in each availability state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentCounts {
    pub idle: usize,
    pub working: usize,
}

impl AgentCounts {
    pub fn record(&mut self, status: AgentStatus) {
        match status {
            AgentStatus::Idle => self.idle += 1,
            AgentStatus::Working => self.working += 1,
        }
    }
}

/// Aggregate snapshot published to world state under `system:status` at the
/// end of every orchestration cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemStatus {
    pub tasks: TaskCounts,
    pub agents: AgentCounts,
    pub updated_at: DateTime<Utc>,
}

impl SystemStatus {
    pub fn new(tasks: TaskCounts, agents: AgentCounts) -> Self {
        Self {
            tasks,
            agents,
            updated_at: Utc::now(),
        }
    }

    /// Serialize as JSON (for world state or a dashboard).
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "tasks": self.tasks,
            "agents": self.agents,
            "updated_at": self.updated_at,
        })
    }
}
