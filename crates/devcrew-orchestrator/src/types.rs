use chrono::{DateTime, Utc};
use devcrew_core::{Capability, DevcrewResult, TaskId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use uuid::Uuid;

/// Lifecycle status of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Assigned,
    Completed,
    Failed,
}

impl TaskStatus {
    /// `Completed` and `Failed` are final; a task never leaves them.
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::Pending => write!(f, "pending"),
            TaskStatus::Assigned => write!(f, "assigned"),
            TaskStatus::Completed => write!(f, "completed"),
            TaskStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Availability of an agent, derived from its execution slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    Idle,
    Working,
}

impl std::fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AgentStatus::Idle => write!(f, "idle"),
            AgentStatus::Working => write!(f, "working"),
        }
    }
}

fn default_priority() -> i64 {
    1
}

/// A unit of work in the queue.
///
/// Serializes to the storage representation used for durable snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub description: String,
    pub requirements: Vec<String>,
    #[serde(default)]
    pub required_capabilities: BTreeSet<Capability>,
    /// Higher is more urgent.
    #[serde(default = "default_priority")]
    pub priority: i64,
    /// Tasks that must be `Completed` first. Unknown IDs never resolve.
    #[serde(default)]
    pub dependencies: BTreeSet<TaskId>,
    #[serde(default)]
    pub context: HashMap<String, Value>,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    /// ID of the agent that accepted the task.
    #[serde(default)]
    pub assigned_to: Option<String>,
    /// Progress record (or failure data) the task ended with.
    #[serde(default)]
    pub result: Option<Value>,
}

impl Task {
    /// Storage representation of the task.
    pub fn to_snapshot(&self) -> DevcrewResult<Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// Rebuild a task from its storage representation. Fields a snapshot may
    /// carry beyond the task's own (e.g. `completed_at`) are ignored.
    pub fn from_snapshot(snapshot: Value) -> DevcrewResult<Self> {
        Ok(serde_json::from_value(snapshot)?)
    }

    /// True when every required capability is in `capabilities`.
    pub fn is_runnable_with(&self, capabilities: &BTreeSet<Capability>) -> bool {
        self.required_capabilities.is_subset(capabilities)
    }
}

/// Parameters for a new task. The orchestrator turns it into a [`Task`] with a
/// fresh ID, `Pending` status and the current timestamp.
#[derive(Debug, Clone)]
pub struct NewTask {
    pub description: String,
    pub requirements: Vec<String>,
    pub required_capabilities: BTreeSet<Capability>,
    pub priority: i64,
    pub dependencies: BTreeSet<TaskId>,
    pub context: HashMap<String, Value>,
}

impl NewTask {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            requirements: Vec::new(),
            required_capabilities: BTreeSet::new(),
            priority: default_priority(),
            dependencies: BTreeSet::new(),
            context: HashMap::new(),
        }
    }

    pub fn requirement(mut self, requirement: impl Into<String>) -> Self {
        self.requirements.push(requirement.into());
        self
    }

    pub fn requirements<I, S>(mut self, requirements: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.requirements
            .extend(requirements.into_iter().map(Into::into));
        self
    }

    pub fn capability(mut self, capability: impl Into<Capability>) -> Self {
        self.required_capabilities.insert(capability.into());
        self
    }

    pub fn priority(mut self, priority: i64) -> Self {
        self.priority = priority;
        self
    }

    pub fn depends_on(mut self, id: TaskId) -> Self {
        self.dependencies.insert(id);
        self
    }

    pub fn context_value(mut self, key: impl Into<String>, value: Value) -> Self {
        self.context.insert(key.into(), value);
        self
    }

    /// Materialize the task in `Pending` state.
    pub fn into_task(self) -> Task {
        Task {
            id: Uuid::new_v4(),
            description: self.description,
            requirements: self.requirements,
            required_capabilities: self.required_capabilities,
            priority: self.priority,
            dependencies: self.dependencies,
            context: self.context,
            status: TaskStatus::Pending,
            created_at: Utc::now(),
            assigned_to: None,
            result: None,
        }
    }
}

/// Partial update of a task's mutable fields. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskUpdate {
    pub status: Option<TaskStatus>,
    pub assigned_to: Option<String>,
    pub result: Option<Value>,
}

impl TaskUpdate {
    pub fn status(status: TaskStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn with_assigned_to(mut self, agent_id: impl Into<String>) -> Self {
        self.assigned_to = Some(agent_id.into());
        self
    }

    pub fn with_result(mut self, result: Value) -> Self {
        self.result = Some(result);
        self
    }
}

/// Status field of a progress record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStatus {
    InProgress,
    Completed,
    Failed,
    /// Any status string this crate does not interpret.
    #[serde(other)]
    Other,
}

impl ProgressStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, ProgressStatus::Completed | ProgressStatus::Failed)
    }

    /// Status of a raw progress record, read from its `status` field alone.
    /// `None` when the field is missing or not a string.
    pub fn of_record(record: &Value) -> Option<Self> {
        let status = match record.get("status").and_then(Value::as_str)? {
            "in_progress" => ProgressStatus::InProgress,
            "completed" => ProgressStatus::Completed,
            "failed" => ProgressStatus::Failed,
            _ => ProgressStatus::Other,
        };
        Some(status)
    }
}

/// A progress record an agent publishes to world state under
/// `task_progress:{task_id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressReport {
    pub status: ProgressStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Stamped by the agent when the report is published.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reported_at: Option<DateTime<Utc>>,
    /// ID of the reporting agent, stamped on publish.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
    /// Extra fields supplied by the agent, kept verbatim.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl ProgressReport {
    fn with_status(status: ProgressStatus) -> Self {
        Self {
            status,
            output: None,
            message: None,
            reported_at: None,
            agent: None,
            extra: serde_json::Map::new(),
        }
    }

    pub fn in_progress(message: impl Into<String>) -> Self {
        Self::with_status(ProgressStatus::InProgress).with_message(message)
    }

    pub fn completed(output: impl Into<String>) -> Self {
        let mut report = Self::with_status(ProgressStatus::Completed);
        report.output = Some(output.into());
        report
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self::with_status(ProgressStatus::Failed).with_message(message)
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }
}
