//! Task assignment and lifecycle reconciliation for devcrew.
//!
//! Tasks wait in a [`TaskQueue`] until every dependency has completed. Each
//! orchestration cycle hands the best runnable task to every idle [`Agent`],
//! then reads the progress records agents publish to world state and moves
//! finished tasks to `completed` or `failed`.
//!
//! # Main types
//!
//! - [`Orchestrator`]: owns the queue and the agent registry and runs the cycle.
//! - [`TaskQueue`]: canonical task records with priority and dependency selection.
//! - [`AgentCore`]: the idle/working state machine shared by every agent.
//! - [`SystemStatus`]: aggregate counts published under `system:status`.

pub mod agent;
/// Orchestration loop.
pub mod engine;
/// Aggregate task and agent counts.
pub mod monitor;
/// Canonical task store and selection.
pub mod task_queue;
/// Shared orchestration types (Task, ProgressReport, statuses).
pub mod types;

pub use agent::{Agent, AgentCore};
pub use engine::{CycleReport, Orchestrator};
pub use monitor::{AgentCounts, SystemStatus, TaskCounts};
pub use task_queue::TaskQueue;
pub use types::{
    AgentStatus, NewTask, ProgressReport, ProgressStatus, Task, TaskStatus, TaskUpdate,
};
