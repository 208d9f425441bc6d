use crate::agent::Agent;
use crate::monitor::{AgentCounts, SystemStatus, TaskCounts};
use crate::task_queue::TaskQueue;
use crate::types::{
    AgentStatus, NewTask, ProgressReport, ProgressStatus, Task, TaskStatus, TaskUpdate,
};
use chrono::Utc;
use devcrew_core::{DevcrewError, DevcrewResult, TaskId};
use devcrew_memory::{keys, MemoryClient};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// The task orchestrator.
///
/// Owns the task queue and the agent registry and drives the
/// assign → execute → monitor → reconcile cycle. Agents report back only
/// through world state; the orchestrator polls it.
pub struct Orchestrator {
    memory: Arc<dyn MemoryClient>,
    /// Registration order is the iteration order of every cycle.
    agents: RwLock<Vec<Arc<dyn Agent>>>,
    queue: RwLock<TaskQueue>,
    /// Serialises cycles; passes never overlap.
    cycle: Mutex<()>,
    dispatch: bool,
}

/// Outcome of one orchestration cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleReport {
    pub assigned: usize,
    pub reconciled: usize,
    pub status: SystemStatus,
}

impl Orchestrator {
    pub fn new(memory: Arc<dyn MemoryClient>) -> Self {
        Self {
            memory,
            agents: RwLock::new(Vec::new()),
            queue: RwLock::new(TaskQueue::new()),
            cycle: Mutex::new(()),
            dispatch: false,
        }
    }

    /// Spawn `execute()` for every agent right after it accepts a task.
    ///
    /// Off by default: execution is then driven by whoever owns the agents.
    pub fn with_dispatch(mut self, dispatch: bool) -> Self {
        self.dispatch = dispatch;
        self
    }

    /// Register an agent. Agent IDs must be unique.
    pub async fn register_agent(&self, agent: Arc<dyn Agent>) -> DevcrewResult<()> {
        let mut agents = self.agents.write().await;
        let id = agent.core().id();
        if agents.iter().any(|a| a.core().id() == id) {
            return Err(DevcrewError::DuplicateAgent(id.to_string()));
        }
        info!(
            agent = %id,
            name = %agent.core().name(),
            capabilities = ?agent.core().capabilities(),
            "Registered agent"
        );
        agents.push(agent);
        Ok(())
    }

    /// Registered agents in registration order.
    pub async fn agents(&self) -> Vec<Arc<dyn Agent>> {
        self.agents.read().await.clone()
    }

    pub async fn agent(&self, id: &str) -> Option<Arc<dyn Agent>> {
        self.agents
            .read()
            .await
            .iter()
            .find(|a| a.core().id() == id)
            .cloned()
    }

    /// Copy of the canonical task.
    pub async fn task(&self, id: TaskId) -> Option<Task> {
        self.queue.read().await.get(id).cloned()
    }

    /// Copies of all tasks in creation order.
    pub async fn tasks(&self) -> Vec<Task> {
        self.queue
            .read()
            .await
            .all_tasks()
            .into_iter()
            .cloned()
            .collect()
    }

    pub async fn task_counts(&self) -> TaskCounts {
        self.queue.read().await.counts()
    }

    /// True once every task is `completed` or `failed`.
    pub async fn is_done(&self) -> bool {
        self.queue.read().await.is_done()
    }

    /// Queue a new task in `pending` state and write its durable snapshot.
    ///
    /// Dependencies not yet in the queue are accepted but will never resolve,
    /// so the task stays blocked; this is logged as a warning.
    pub async fn create_task(&self, new_task: NewTask) -> DevcrewResult<TaskId> {
        let task = new_task.into_task();
        let snapshot = task.to_snapshot()?;
        let description = task.description.clone();

        let task_id = {
            let mut queue = self.queue.write().await;
            let missing = queue.missing_dependencies(&task);
            if !missing.is_empty() {
                warn!(
                    task_id = %task.id,
                    missing = ?missing,
                    "Task depends on unknown tasks and will stay blocked"
                );
            }
            let id = queue.add(task)?;
            if queue.has_cycle() {
                warn!(task_id = %id, "Dependency cycle detected; tasks on it will never run");
            }
            id
        };

        if let Err(e) = self.memory.store_long_term(&keys::task(task_id), snapshot).await {
            warn!(task_id = %task_id, error = %e, "Failed to store durable task snapshot");
        }

        info!(task_id = %task_id, description = %description, "Created task");
        Ok(task_id)
    }

    /// Hand pending tasks to idle agents. Returns the number of assignments.
    pub async fn assign_tasks(&self) -> usize {
        let _cycle = self.cycle.lock().await;
        self.assign_pass().await
    }

    /// Reconcile progress records of in-flight tasks. Returns how many tasks
    /// reached a terminal state.
    ///
    /// A record that cannot be read is logged and retried next cycle; the
    /// other tasks are still reconciled.
    pub async fn monitor_progress(&self) -> usize {
        let _cycle = self.cycle.lock().await;
        self.monitor_pass().await
    }

    /// One full cycle: assign, monitor, publish the system status.
    pub async fn run_cycle(&self) -> DevcrewResult<CycleReport> {
        let _cycle = self.cycle.lock().await;
        let assigned = self.assign_pass().await;
        let reconciled = self.monitor_pass().await;
        let status = self.update_system_state().await?;
        Ok(CycleReport {
            assigned,
            reconciled,
            status,
        })
    }

    /// Run cycles every `interval` until `cancel` fires.
    ///
    /// A failing cycle is logged and the loop carries on after the usual
    /// sleep. Cancellation is observed between cycles, so a cycle that has
    /// started always finishes.
    pub async fn run(&self, interval: Duration, cancel: CancellationToken) {
        info!(interval_ms = interval.as_millis() as u64, "Starting orchestrator");

        while !cancel.is_cancelled() {
            match self.run_cycle().await {
                Ok(report) => {
                    if report.assigned > 0 {
                        info!(assigned = report.assigned, "Assigned tasks");
                    }
                    debug!(
                        reconciled = report.reconciled,
                        pending = report.status.tasks.pending,
                        working = report.status.agents.working,
                        "Cycle complete"
                    );
                }
                Err(e) => error!(error = %e, "Error in orchestrator cycle"),
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }
        }

        info!("Orchestrator stopped");
    }

    async fn assign_pass(&self) -> usize {
        let agents = self.agents().await;
        let mut assigned = 0;

        for agent in agents {
            let core = agent.core();
            if core.status().await != AgentStatus::Idle {
                continue;
            }

            let candidate = self
                .queue
                .read()
                .await
                .next_for(core.capabilities())
                .cloned();
            let Some(task) = candidate else {
                continue;
            };

            if !core.assign(&task).await {
                continue;
            }

            let update = TaskUpdate::status(TaskStatus::Assigned).with_assigned_to(core.id());
            if !self.queue.write().await.update(task.id, update) {
                warn!(task_id = %task.id, "Assigned task missing from queue");
            }
            assigned += 1;
            info!(task_id = %task.id, agent = %core.id(), "Assigned task");

            if self.dispatch {
                spawn_execution(Arc::clone(&agent), task.id);
            }
        }

        assigned
    }

    async fn monitor_pass(&self) -> usize {
        let mut in_flight: Vec<TaskId> = Vec::new();
        for agent in self.agents().await {
            if let Some(task_id) = agent.core().current_task_id().await {
                in_flight.push(task_id);
            }
        }
        // Agents that already reported a terminal status are idle again, but
        // their tasks are still `assigned` here until reconciled.
        for task in self.queue.read().await.with_status(TaskStatus::Assigned) {
            if !in_flight.contains(&task.id) {
                in_flight.push(task.id);
            }
        }

        let mut reconciled = 0;
        for task_id in in_flight {
            let record = match self
                .memory
                .get_world_state(&keys::task_progress(task_id))
                .await
            {
                Ok(Some(record)) => record,
                Ok(None) => continue,
                Err(e) => {
                    warn!(task_id = %task_id, error = %e, "Failed to read progress record");
                    continue;
                }
            };

            // Only `status` decides; the rest of the record is kept verbatim.
            match ProgressStatus::of_record(&record) {
                Some(ProgressStatus::Completed) => {
                    self.handle_completed_task(task_id, record).await;
                    reconciled += 1;
                }
                Some(ProgressStatus::Failed) => {
                    self.handle_failed_task(task_id, record).await;
                    reconciled += 1;
                }
                Some(ProgressStatus::InProgress | ProgressStatus::Other) => {}
                None => {
                    warn!(task_id = %task_id, "Ignoring progress record without a status");
                }
            }
        }

        reconciled
    }

    /// Mark a task completed with `result` and mirror it to the durable snapshot.
    pub async fn handle_completed_task(&self, task_id: TaskId, result: Value) {
        if self
            .finish_task(task_id, TaskStatus::Completed, result, "completed_at")
            .await
        {
            info!(task_id = %task_id, "Task completed successfully");
        }
    }

    /// Mark a task failed with `error_data` and mirror it to the durable snapshot.
    pub async fn handle_failed_task(&self, task_id: TaskId, error_data: Value) {
        let message = match error_data.get("message") {
            Some(Value::String(message)) => message.clone(),
            Some(other) => other.to_string(),
            None => "Unknown error".to_string(),
        };
        if self
            .finish_task(task_id, TaskStatus::Failed, error_data, "failed_at")
            .await
        {
            error!(task_id = %task_id, message = %message, "Task failed");
        }
    }

    /// Moves the canonical task to a terminal `status`, frees the owning agent
    /// and updates the durable snapshot. Returns `false` if the queue refused
    /// the update (unknown ID or already terminal).
    async fn finish_task(
        &self,
        task_id: TaskId,
        status: TaskStatus,
        result: Value,
        stamp_field: &str,
    ) -> bool {
        let update = TaskUpdate::status(status).with_result(result.clone());
        if !self.queue.write().await.update(task_id, update) {
            warn!(task_id = %task_id, status = %status, "Could not update task");
            return false;
        }

        for agent in self.agents().await {
            if agent.core().release(task_id).await {
                debug!(task_id = %task_id, agent = %agent.core().id(), "Released agent");
            }
        }

        if let Err(e) = self.mirror_snapshot(task_id, status, result, stamp_field).await {
            warn!(task_id = %task_id, error = %e, "Failed to update durable task snapshot");
        }
        true
    }

    /// Read-modify-write of `task:{id}` in long-term memory. Skipped when no
    /// snapshot exists; the queue stays authoritative either way.
    async fn mirror_snapshot(
        &self,
        task_id: TaskId,
        status: TaskStatus,
        result: Value,
        stamp_field: &str,
    ) -> DevcrewResult<()> {
        let key = keys::task(task_id);
        match self.memory.get_long_term(&key).await? {
            Some(Value::Object(mut snapshot)) => {
                snapshot.insert("status".into(), serde_json::to_value(status)?);
                snapshot.insert("result".into(), result);
                snapshot.insert(stamp_field.into(), serde_json::to_value(Utc::now())?);
                self.memory
                    .store_long_term(&key, Value::Object(snapshot))
                    .await
            }
            Some(_) => {
                warn!(task_id = %task_id, "Durable task snapshot is not an object; skipping");
                Ok(())
            }
            None => {
                debug!(task_id = %task_id, "No durable task snapshot; skipping");
                Ok(())
            }
        }
    }

    /// Publish task and agent counts to `system:status`.
    pub async fn update_system_state(&self) -> DevcrewResult<SystemStatus> {
        let tasks = self.task_counts().await;
        let mut agents = AgentCounts::default();
        for agent in self.agents().await {
            agents.record(agent.core().status().await);
        }

        let status = SystemStatus::new(tasks, agents);
        self.memory
            .update_world_state(keys::SYSTEM_STATUS, status.to_json())
            .await?;
        Ok(status)
    }
}

/// Run `agent.execute()` in the background. An error while the agent still
/// holds the task is reported as a failure on its behalf.
fn spawn_execution(agent: Arc<dyn Agent>, task_id: TaskId) {
    tokio::spawn(async move {
        let core = agent.core();
        if let Err(e) = agent.execute().await {
            error!(task_id = %task_id, agent = %core.id(), error = %e, "Agent execution failed");
            if core.current_task_id().await == Some(task_id) {
                core.report_progress(ProgressReport::failed(e.to_string()))
                    .await;
            }
        }
    });
}
