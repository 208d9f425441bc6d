#![allow(clippy::unwrap_used, clippy::expect_used)]

//! Integration tests for the orchestration cycle.
//!
//! Drives the public API the way a host process does: agents are registered,
//! tasks created, and progress is published through world state only.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use devcrew_core::{DevcrewError, DevcrewResult};
use devcrew_memory::{keys, InMemoryClient, MemoryClient};
use devcrew_orchestrator::*;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Agent whose work is driven by the test.
struct ManualAgent {
    core: AgentCore,
}

impl ManualAgent {
    fn new(name: &str, caps: &[&str], memory: Arc<dyn MemoryClient>) -> Arc<Self> {
        Arc::new(Self {
            core: AgentCore::new(name, caps.iter().copied(), memory),
        })
    }
}

#[async_trait]
impl Agent for ManualAgent {
    fn core(&self) -> &AgentCore {
        &self.core
    }

    async fn execute(&self) -> DevcrewResult<()> {
        Ok(())
    }
}

/// Agent that finishes its task immediately with a fixed output.
struct EchoAgent {
    core: AgentCore,
}

#[async_trait]
impl Agent for EchoAgent {
    fn core(&self) -> &AgentCore {
        &self.core
    }

    async fn execute(&self) -> DevcrewResult<()> {
        if let Some(task) = self.core.current_task().await {
            self.core
                .report_progress(ProgressReport::completed(format!(
                    "done: {}",
                    task.description
                )))
                .await;
        }
        Ok(())
    }
}

/// Memory client that rejects the first `failures` world-state writes to
/// `system:status`.
struct FlakyMemory {
    inner: InMemoryClient,
    failures: AtomicUsize,
}

#[async_trait]
impl MemoryClient for FlakyMemory {
    async fn store_short_term(
        &self,
        key: &str,
        value: Value,
        ttl: Duration,
        lock: bool,
    ) -> DevcrewResult<()> {
        self.inner.store_short_term(key, value, ttl, lock).await
    }

    async fn get_short_term(&self, key: &str) -> DevcrewResult<Option<Value>> {
        self.inner.get_short_term(key).await
    }

    async fn store_long_term(&self, key: &str, value: Value) -> DevcrewResult<()> {
        self.inner.store_long_term(key, value).await
    }

    async fn get_long_term(&self, key: &str) -> DevcrewResult<Option<Value>> {
        self.inner.get_long_term(key).await
    }

    async fn update_world_state(&self, key: &str, value: Value) -> DevcrewResult<()> {
        if key == keys::SYSTEM_STATUS {
            let remaining = self.failures.load(Ordering::SeqCst);
            if remaining > 0 {
                self.failures.store(remaining - 1, Ordering::SeqCst);
                return Err(DevcrewError::Memory("world state unavailable".into()));
            }
        }
        self.inner.update_world_state(key, value).await
    }

    async fn get_world_state(&self, key: &str) -> DevcrewResult<Option<Value>> {
        self.inner.get_world_state(key).await
    }

    async fn world_state_version(&self, key: &str) -> DevcrewResult<u64> {
        self.inner.world_state_version(key).await
    }

    async fn search_short_term(&self, query: &str, limit: usize) -> DevcrewResult<Vec<Value>> {
        self.inner.search_short_term(query, limit).await
    }

    async fn search_long_term(&self, query: &str, limit: usize) -> DevcrewResult<Vec<Value>> {
        self.inner.search_long_term(query, limit).await
    }
}

async fn wait_until_done(orchestrator: &Orchestrator, max_cycles: usize) {
    for _ in 0..max_cycles {
        if orchestrator.is_done().await {
            return;
        }
        orchestrator.run_cycle().await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

// ---------------------------------------------------------------------------
// 1. Dependency scenario: code task, then the test task that depends on it
// ---------------------------------------------------------------------------

#[tokio::test]
async fn dependent_task_waits_for_completion() {
    let memory: Arc<dyn MemoryClient> = Arc::new(InMemoryClient::new());
    let orchestrator = Orchestrator::new(Arc::clone(&memory));

    let coder = ManualAgent::new("Coder", &["code_generation"], Arc::clone(&memory));
    orchestrator.register_agent(coder.clone()).await.unwrap();

    let a = orchestrator
        .create_task(NewTask::new("A").capability("code_generation").priority(2))
        .await
        .unwrap();
    let b = orchestrator
        .create_task(
            NewTask::new("B")
                .capability("test_writing")
                .depends_on(a)
                .priority(1),
        )
        .await
        .unwrap();

    assert_eq!(orchestrator.assign_tasks().await, 1);
    assert_eq!(coder.core().current_task_id().await, Some(a));
    assert_eq!(orchestrator.task(a).await.unwrap().status, TaskStatus::Assigned);
    assert_eq!(orchestrator.task(b).await.unwrap().status, TaskStatus::Pending);

    memory
        .update_world_state(
            &keys::task_progress(a),
            json!({"status": "completed", "output": "fn a() {}"}),
        )
        .await
        .unwrap();
    assert_eq!(orchestrator.monitor_progress().await, 1);
    assert_eq!(orchestrator.task(a).await.unwrap().status, TaskStatus::Completed);
    assert_eq!(coder.core().status().await, AgentStatus::Idle);

    // The coder cannot take B; a tester can.
    assert_eq!(orchestrator.assign_tasks().await, 0);
    let tester = ManualAgent::new("Tester", &["test_writing"], Arc::clone(&memory));
    orchestrator.register_agent(tester.clone()).await.unwrap();

    assert_eq!(orchestrator.assign_tasks().await, 1);
    assert_eq!(tester.core().current_task_id().await, Some(b));
    let b_task = orchestrator.task(b).await.unwrap();
    assert_eq!(b_task.status, TaskStatus::Assigned);
    assert_eq!(b_task.assigned_to.as_deref(), Some(tester.core().id()));
}

#[tokio::test]
async fn failed_dependency_blocks_dependents() {
    let memory: Arc<dyn MemoryClient> = Arc::new(InMemoryClient::new());
    let orchestrator = Orchestrator::new(Arc::clone(&memory));
    let agent = ManualAgent::new(
        "Generalist",
        &["code_generation", "test_writing"],
        Arc::clone(&memory),
    );
    orchestrator.register_agent(agent.clone()).await.unwrap();

    let a = orchestrator
        .create_task(NewTask::new("A").capability("code_generation"))
        .await
        .unwrap();
    let b = orchestrator
        .create_task(NewTask::new("B").capability("test_writing").depends_on(a))
        .await
        .unwrap();

    orchestrator.assign_tasks().await;
    agent
        .core()
        .report_progress(ProgressReport::failed("does not compile"))
        .await;
    orchestrator.monitor_progress().await;

    assert_eq!(orchestrator.task(a).await.unwrap().status, TaskStatus::Failed);
    assert_eq!(orchestrator.assign_tasks().await, 0);
    assert_eq!(orchestrator.task(b).await.unwrap().status, TaskStatus::Pending);
}

// ---------------------------------------------------------------------------
// 2. Selection order
// ---------------------------------------------------------------------------

#[tokio::test]
async fn highest_priority_assigned_first() {
    let memory: Arc<dyn MemoryClient> = Arc::new(InMemoryClient::new());
    let orchestrator = Orchestrator::new(Arc::clone(&memory));
    let agent = ManualAgent::new("Solo", &[], Arc::clone(&memory));
    orchestrator.register_agent(agent.clone()).await.unwrap();

    orchestrator.create_task(NewTask::new("three").priority(3)).await.unwrap();
    let five = orchestrator.create_task(NewTask::new("five").priority(5)).await.unwrap();

    orchestrator.assign_tasks().await;
    assert_eq!(agent.core().current_task_id().await, Some(five));
}

#[tokio::test]
async fn equal_priority_assigned_in_creation_order() {
    let memory: Arc<dyn MemoryClient> = Arc::new(InMemoryClient::new());
    let orchestrator = Orchestrator::new(Arc::clone(&memory));
    let agent = ManualAgent::new("Solo", &[], Arc::clone(&memory));
    orchestrator.register_agent(agent.clone()).await.unwrap();

    let first = orchestrator.create_task(NewTask::new("first")).await.unwrap();
    let second = orchestrator.create_task(NewTask::new("second")).await.unwrap();

    orchestrator.assign_tasks().await;
    assert_eq!(agent.core().current_task_id().await, Some(first));

    agent
        .core()
        .report_progress(ProgressReport::completed("ok"))
        .await;
    orchestrator.run_cycle().await.unwrap();
    orchestrator.assign_tasks().await;
    assert_eq!(agent.core().current_task_id().await, Some(second));
}

// ---------------------------------------------------------------------------
// 3. Published state
// ---------------------------------------------------------------------------

#[tokio::test]
async fn cycle_publishes_system_status_and_snapshots() {
    let memory: Arc<dyn MemoryClient> = Arc::new(InMemoryClient::new());
    let orchestrator = Orchestrator::new(Arc::clone(&memory));
    let agent = ManualAgent::new("Coder", &[], Arc::clone(&memory));
    orchestrator.register_agent(agent.clone()).await.unwrap();

    let id = orchestrator
        .create_task(NewTask::new("publish").requirement("be visible"))
        .await
        .unwrap();

    let report = orchestrator.run_cycle().await.unwrap();
    assert_eq!(report.assigned, 1);
    assert_eq!(report.reconciled, 0);
    assert_eq!(report.status.tasks.assigned, 1);
    assert_eq!(report.status.agents.working, 1);

    let assignment = memory
        .get_world_state(&keys::task_assignment(id))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(assignment["agent"], agent.core().id());
    assert_eq!(assignment["status"], "assigned");

    agent
        .core()
        .report_progress(ProgressReport::completed("visible"))
        .await;
    let report = orchestrator.run_cycle().await.unwrap();
    assert_eq!(report.reconciled, 1);
    assert_eq!(report.status.tasks.completed, 1);
    assert_eq!(report.status.agents.idle, 1);

    let status = memory
        .get_world_state(keys::SYSTEM_STATUS)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(status["tasks"]["completed"], 1);
    assert_eq!(memory.world_state_version(keys::SYSTEM_STATUS).await.unwrap(), 2);

    let snapshot = memory.get_long_term(&keys::task(id)).await.unwrap().unwrap();
    assert_eq!(snapshot["status"], "completed");
    assert_eq!(snapshot["result"]["output"], "visible");
    assert!(snapshot["completed_at"].is_string());

    // The durable snapshot still reads back as a task.
    let restored = Task::from_snapshot(snapshot).unwrap();
    assert_eq!(restored.id, id);
    assert_eq!(restored.requirements, vec!["be visible".to_string()]);
}

// ---------------------------------------------------------------------------
// 4. Run loop
// ---------------------------------------------------------------------------

#[tokio::test]
async fn run_loop_survives_failing_cycles() {
    let memory = Arc::new(FlakyMemory {
        inner: InMemoryClient::new(),
        failures: AtomicUsize::new(2),
    });
    let orchestrator = Arc::new(Orchestrator::new(memory.clone()));
    orchestrator.create_task(NewTask::new("waiting")).await.unwrap();

    let cancel = CancellationToken::new();
    let handle = {
        let orchestrator = Arc::clone(&orchestrator);
        let cancel = cancel.clone();
        tokio::spawn(async move { orchestrator.run(Duration::from_millis(5), cancel).await })
    };

    let mut published = false;
    for _ in 0..100 {
        if memory.world_state_version(keys::SYSTEM_STATUS).await.unwrap() > 0 {
            published = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .expect("run loop should stop after cancellation")
        .unwrap();

    assert!(published, "loop should keep cycling after errors");
    assert_eq!(memory.failures.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn dispatch_runs_tasks_to_completion() {
    let memory: Arc<dyn MemoryClient> = Arc::new(InMemoryClient::new());
    let orchestrator = Orchestrator::new(Arc::clone(&memory)).with_dispatch(true);
    let agent = Arc::new(EchoAgent {
        core: AgentCore::new("Echo", ["code_generation", "test_writing"], Arc::clone(&memory)),
    });
    orchestrator.register_agent(agent).await.unwrap();

    let code = orchestrator
        .create_task(NewTask::new("code").capability("code_generation").priority(2))
        .await
        .unwrap();
    let tests = orchestrator
        .create_task(NewTask::new("tests").capability("test_writing").depends_on(code))
        .await
        .unwrap();

    wait_until_done(&orchestrator, 50).await;

    assert!(orchestrator.is_done().await);
    let counts = orchestrator.task_counts().await;
    assert_eq!(counts.completed, 2);
    assert_eq!(counts.total(), 2);
    assert_eq!(
        orchestrator.task(tests).await.unwrap().result.unwrap()["output"],
        "done: tests"
    );
}
