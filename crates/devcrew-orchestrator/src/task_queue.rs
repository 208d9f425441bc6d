use crate::monitor::TaskCounts;
use crate::types::{Task, TaskStatus, TaskUpdate};
use devcrew_core::{Capability, DevcrewError, DevcrewResult, TaskId};
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};
use tracing::warn;

/// Holds every known task and picks the best pending one for an agent.
///
/// Selection is a linear scan; [`TaskQueue::next_for`] is the only entry point,
/// so an index keyed on priority can replace it without touching callers.
pub struct TaskQueue {
    tasks: HashMap<TaskId, Task>,
    /// Insertion sequence, the last tie-break when priority and timestamp match.
    order: HashMap<TaskId, u64>,
    next_seq: u64,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self {
            tasks: HashMap::new(),
            order: HashMap::new(),
            next_seq: 0,
        }
    }

    /// Add a task to the queue.
    pub fn add(&mut self, task: Task) -> DevcrewResult<TaskId> {
        let id = task.id;
        if self.tasks.contains_key(&id) {
            return Err(DevcrewError::DuplicateTask(id));
        }
        self.order.insert(id, self.next_seq);
        self.next_seq += 1;
        self.tasks.insert(id, task);
        Ok(id)
    }

    /// Best pending task an agent with `capabilities` can take.
    ///
    /// A candidate is `Pending`, has every dependency `Completed` and needs no
    /// capability outside `capabilities`. Highest priority wins; ties go to the
    /// earliest `created_at`, then to the earliest insertion.
    pub fn next_for(&self, capabilities: &BTreeSet<Capability>) -> Option<&Task> {
        self.tasks
            .values()
            .filter(|t| t.status == TaskStatus::Pending)
            .filter(|t| t.is_runnable_with(capabilities))
            .filter(|t| self.dependencies_met(t))
            .max_by(|a, b| self.rank(a, b))
    }

    fn rank(&self, a: &Task, b: &Task) -> Ordering {
        a.priority
            .cmp(&b.priority)
            .then_with(|| b.created_at.cmp(&a.created_at))
            .then_with(|| self.seq(b.id).cmp(&self.seq(a.id)))
    }

    fn seq(&self, id: TaskId) -> u64 {
        self.order.get(&id).copied().unwrap_or(u64::MAX)
    }

    /// Every dependency resolves to a `Completed` task. Missing IDs never do.
    pub fn dependencies_met(&self, task: &Task) -> bool {
        task.dependencies.iter().all(|dep| {
            self.tasks
                .get(dep)
                .is_some_and(|d| d.status == TaskStatus::Completed)
        })
    }

    /// Dependency IDs of `task` that are not in the queue.
    pub fn missing_dependencies(&self, task: &Task) -> Vec<TaskId> {
        task.dependencies
            .iter()
            .filter(|dep| !self.tasks.contains_key(*dep))
            .copied()
            .collect()
    }

    /// Apply a partial update. Returns `false` if the task is unknown or the
    /// update would move a terminal task to another status.
    pub fn update(&mut self, id: TaskId, update: TaskUpdate) -> bool {
        let Some(task) = self.tasks.get_mut(&id) else {
            return false;
        };

        if let Some(status) = update.status {
            if task.status.is_terminal() && status != task.status {
                warn!(
                    task_id = %id,
                    from = %task.status,
                    to = %status,
                    "Refusing to move task out of a terminal state"
                );
                return false;
            }
            task.status = status;
        }
        if let Some(agent_id) = update.assigned_to {
            task.assigned_to = Some(agent_id);
        }
        if let Some(result) = update.result {
            task.result = Some(result);
        }
        true
    }

    /// Get a task by ID.
    pub fn get(&self, id: TaskId) -> Option<&Task> {
        self.tasks.get(&id)
    }

    /// All tasks in creation order.
    pub fn all_tasks(&self) -> Vec<&Task> {
        let mut tasks: Vec<&Task> = self.tasks.values().collect();
        tasks.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| self.seq(a.id).cmp(&self.seq(b.id)))
        });
        tasks
    }

    /// Tasks currently in `status`, in creation order.
    pub fn with_status(&self, status: TaskStatus) -> Vec<&Task> {
        self.all_tasks()
            .into_iter()
            .filter(|t| t.status == status)
            .collect()
    }

    pub fn counts(&self) -> TaskCounts {
        self.tasks.values().collect()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Check if all tasks are in a terminal state.
    pub fn is_done(&self) -> bool {
        self.tasks.values().all(|t| t.status.is_terminal())
    }

    /// Check for cycles in the dependency graph.
    /// Tasks on a cycle can never become eligible.
    pub fn has_cycle(&self) -> bool {
        let mut visited = HashMap::new();
        for &id in self.tasks.keys() {
            if self.dfs_cycle(id, &mut visited) {
                return true;
            }
        }
        false
    }

    fn dfs_cycle(&self, id: TaskId, visited: &mut HashMap<TaskId, u8>) -> bool {
        match visited.get(&id) {
            Some(1) => return true,  // back edge = cycle
            Some(2) => return false, // already processed
            _ => {}
        }
        visited.insert(id, 1);
        if let Some(task) = self.tasks.get(&id) {
            for dep in &task.dependencies {
                if self.dfs_cycle(*dep, visited) {
                    return true;
                }
            }
        }
        visited.insert(id, 2);
        false
    }
}

impl Default for TaskQueue {
    fn default() -> Self {
        Self::new()
    }
}
