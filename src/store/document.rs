use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::sweep::StaleStats;
use crate::task::{Agent, Task, TaskStatus};

/// Root of the persisted JSON document. Everything taskwarden knows lives
/// here; the store guarantees it is never written partially or re-encoded.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskDocument {
    pub tasks: Vec<Task>,
    pub agents: HashMap<String, Agent>,
    pub counters: Counters,
    pub stale_stats: StaleStats,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Counters {
    pub execution_count: u64,
    pub review_strikes: u64,
}

impl TaskDocument {
    pub fn task(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn task_mut(&mut self, id: &str) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|t| t.id == id)
    }

    /// The in-progress task owned by the given agent, if any. One agent owns
    /// at most one in-progress task; other agents' tasks are unaffected.
    pub fn in_progress_for(&self, agent_id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| {
            t.status == TaskStatus::InProgress && t.assigned_agent.as_deref() == Some(agent_id)
        })
    }

    pub fn completed_ids(&self) -> Vec<&str> {
        self.tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Completed)
            .map(|t| t.id.as_str())
            .collect()
    }

    pub fn tasks_by_status(&self, status: TaskStatus) -> Vec<&Task> {
        self.tasks.iter().filter(|t| t.status == status).collect()
    }
}
