use crate::types::{AgentStatus, ProgressReport, Task, TaskStatus};
use async_trait::async_trait;
use chrono::Utc;
use devcrew_core::{Capability, DevcrewResult, TaskId};
use devcrew_memory::{keys, MemoryClient, DEFAULT_SHORT_TERM_TTL};
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, info, warn};
use uuid::Uuid;

/// A capability-tagged worker.
///
/// Implementors embed an [`AgentCore`] for the shared state machine and supply
/// [`Agent::execute`]. `execute` reads the current task from the core, does the
/// work, and must call [`AgentCore::report_progress`] exactly once with a
/// terminal status. An agent that never reports keeps its task `assigned`.
#[async_trait]
pub trait Agent: Send + Sync {
    fn core(&self) -> &AgentCore;

    async fn execute(&self) -> DevcrewResult<()>;
}

/// The single-task execution slot. Status is derived from it, so a working
/// agent always has a task and an idle one never does.
#[derive(Debug, Clone)]
enum Slot {
    Idle,
    Working(Task),
}

/// State and contracts shared by every agent kind.
pub struct AgentCore {
    id: String,
    name: String,
    capabilities: BTreeSet<Capability>,
    memory: Arc<dyn MemoryClient>,
    slot: RwLock<Slot>,
}

impl AgentCore {
    pub fn new<I, C>(
        name: impl Into<String>,
        capabilities: I,
        memory: Arc<dyn MemoryClient>,
    ) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Capability>,
    {
        let name = name.into();
        Self {
            id: agent_id(&name),
            name,
            capabilities: capabilities.into_iter().map(Into::into).collect(),
            memory,
            slot: RwLock::new(Slot::Idle),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn capabilities(&self) -> &BTreeSet<Capability> {
        &self.capabilities
    }

    pub fn memory(&self) -> &Arc<dyn MemoryClient> {
        &self.memory
    }

    pub async fn status(&self) -> AgentStatus {
        match &*self.slot.read().await {
            Slot::Idle => AgentStatus::Idle,
            Slot::Working(_) => AgentStatus::Working,
        }
    }

    /// The task currently held, if any.
    pub async fn current_task(&self) -> Option<Task> {
        match &*self.slot.read().await {
            Slot::Idle => None,
            Slot::Working(task) => Some(task.clone()),
        }
    }

    pub async fn current_task_id(&self) -> Option<TaskId> {
        match &*self.slot.read().await {
            Slot::Idle => None,
            Slot::Working(task) => Some(task.id),
        }
    }

    /// Try to take `task`.
    ///
    /// Refused (returns `false`, nothing changed) when the agent is busy, lacks
    /// a required capability, or the memory collaborator fails. On success the
    /// task is kept in short-term memory, an assignment record is published to
    /// world state, and the agent becomes `working`.
    pub async fn assign(&self, task: &Task) -> bool {
        let mut slot = self.slot.write().await;

        if let Slot::Working(current) = &*slot {
            warn!(
                agent = %self.id,
                task_id = %task.id,
                current_task = %current.id,
                "Cannot assign task: agent is working"
            );
            return false;
        }

        if !task.is_runnable_with(&self.capabilities) {
            warn!(
                agent = %self.id,
                task_id = %task.id,
                "Cannot assign task: missing required capabilities"
            );
            return false;
        }

        let mut held = task.clone();
        held.status = TaskStatus::Assigned;
        held.assigned_to = Some(self.id.clone());

        if let Err(e) = self.publish_assignment(&held).await {
            error!(agent = %self.id, task_id = %task.id, error = %e, "Failed to assign task");
            return false;
        }

        info!(agent = %self.id, task_id = %task.id, "Task assigned to agent");
        *slot = Slot::Working(held);
        true
    }

    async fn publish_assignment(&self, task: &Task) -> DevcrewResult<()> {
        self.memory
            .store_short_term(
                &keys::task(task.id),
                task.to_snapshot()?,
                DEFAULT_SHORT_TERM_TTL,
                false,
            )
            .await?;
        self.memory
            .update_world_state(
                &keys::task_assignment(task.id),
                serde_json::json!({
                    "agent": self.id,
                    "assigned_at": Utc::now(),
                    "status": "assigned",
                }),
            )
            .await
    }

    /// Publish a progress record for the current task.
    ///
    /// The record is stamped with `reported_at` and `agent` and written to
    /// `task_progress:{task_id}`. A terminal status frees the slot. Without a
    /// current task this only logs a warning. A failed write is logged and
    /// leaves the slot as it was.
    pub async fn report_progress(&self, mut report: ProgressReport) {
        let mut slot = self.slot.write().await;

        let task_id = match &*slot {
            Slot::Working(task) => task.id,
            Slot::Idle => {
                warn!(agent = %self.id, "Cannot report progress: no task assigned");
                return;
            }
        };

        report.reported_at = Some(Utc::now());
        report.agent = Some(self.id.clone());

        let published = match serde_json::to_value(&report) {
            Ok(value) => {
                self.memory
                    .update_world_state(&keys::task_progress(task_id), value)
                    .await
            }
            Err(e) => Err(e.into()),
        };
        if let Err(e) = published {
            error!(agent = %self.id, task_id = %task_id, error = %e, "Failed to report progress");
            return;
        }

        info!(
            agent = %self.id,
            task_id = %task_id,
            status = ?report.status,
            "Reported progress"
        );

        if report.status.is_terminal() {
            *slot = Slot::Idle;
        }
    }

    /// Return to idle if the agent still holds `task_id`.
    ///
    /// Used by the orchestrator when it reconciles a terminal progress record
    /// that did not come through [`AgentCore::report_progress`].
    pub async fn release(&self, task_id: TaskId) -> bool {
        let mut slot = self.slot.write().await;
        match &*slot {
            Slot::Working(task) if task.id == task_id => {
                *slot = Slot::Idle;
                true
            }
            _ => false,
        }
    }

    /// Context for the current work: short-term matches first, then long-term
    /// matches up to `limit` in total. Collaborator errors yield an empty list.
    pub async fn get_context(&self, query: &str, limit: usize) -> Vec<Value> {
        match self.search_context(query, limit).await {
            Ok(results) => results,
            Err(e) => {
                error!(agent = %self.id, error = %e, "Failed to get context");
                Vec::new()
            }
        }
    }

    async fn search_context(&self, query: &str, limit: usize) -> DevcrewResult<Vec<Value>> {
        let mut results = self.memory.search_short_term(query, limit).await?;
        results.truncate(limit);
        if results.len() < limit {
            let remaining = limit - results.len();
            results.extend(self.memory.search_long_term(query, remaining).await?);
            results.truncate(limit);
        }
        Ok(results)
    }
}

impl std::fmt::Debug for AgentCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentCore")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("capabilities", &self.capabilities)
            .finish_non_exhaustive()
    }
}

/// `"Code Writer"` becomes `"code_writer_1a2b3c4d"`.
fn agent_id(name: &str) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}_{}", name.to_lowercase().replace(' ', "_"), &suffix[..8])
}
