use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::TaskStatus;

/// Access history entries kept per task. Oldest entries are evicted first.
pub const DEFAULT_HISTORY_CAP: usize = 50;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub title: String,

    #[serde(default)]
    pub description: String,

    pub status: TaskStatus,

    /// Primary owner. At most one per task; an agent holds at most one
    /// in-progress task at a time.
    #[serde(default)]
    pub assigned_agent: Option<String>,

    /// Secondary collaborators, no exclusivity semantics.
    #[serde(default)]
    pub assigned_agents: Vec<String>,

    /// Task IDs that must be completed before this task is claimable.
    #[serde(default)]
    pub dependencies: Vec<String>,

    #[serde(default)]
    pub category: TaskCategory,

    #[serde(default)]
    pub priority: Priority,

    /// For audit tasks: the agent whose work is under review.
    #[serde(default)]
    pub original_implementer: Option<String>,

    #[serde(default)]
    pub access_history: Vec<AccessRecord>,

    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

impl Task {
    pub fn new(title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            title: title.into(),
            description: String::new(),
            status: TaskStatus::Pending,
            assigned_agent: None,
            assigned_agents: Vec::new(),
            dependencies: Vec::new(),
            category: TaskCategory::Implementation,
            priority: Priority::P2,
            original_implementer: None,
            access_history: Vec::new(),
            created_at: now,
            last_activity: now,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_category(mut self, category: TaskCategory) -> Self {
        self.category = category;
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_dependencies(mut self, deps: Vec<String>) -> Self {
        self.dependencies = deps;
        self
    }

    pub fn with_original_implementer(mut self, agent_id: impl Into<String>) -> Self {
        self.original_implementer = Some(agent_id.into());
        self
    }

    /// Checks if the task can be claimed. All dependencies must be completed.
    pub fn is_claimable(&self, completed_ids: &[&str]) -> bool {
        self.status.is_claimable()
            && self
                .dependencies
                .iter()
                .all(|dep| completed_ids.contains(&dep.as_str()))
    }

    /// Transitions the task to in-progress under the given agent.
    pub fn claim(&mut self, agent_id: &str, now: DateTime<Utc>, history_cap: usize) {
        self.status = TaskStatus::InProgress;
        self.assigned_agent = Some(agent_id.to_string());
        self.last_activity = now;
        self.push_access(agent_id, AccessAction::Claimed, now, history_cap);
    }

    /// Returns a stale in-progress task to the pending pool.
    pub fn revert(&mut self, now: DateTime<Utc>, history_cap: usize) {
        let agent = self.assigned_agent.take().unwrap_or_default();
        self.status = TaskStatus::Pending;
        self.push_access(&agent, AccessAction::Reverted, now, history_cap);
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_activity = now;
    }

    pub fn push_access(
        &mut self,
        agent_id: &str,
        action: AccessAction,
        at: DateTime<Utc>,
        history_cap: usize,
    ) {
        self.access_history.push(AccessRecord {
            agent_id: agent_id.to_string(),
            action,
            at,
        });
        if self.access_history.len() > history_cap {
            let drain = self.access_history.len() - history_cap;
            self.access_history.drain(..drain);
        }
    }

    pub fn stale_for(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.last_activity
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessRecord {
    pub agent_id: String,
    pub action: AccessAction,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessAction {
    Created,
    Accessed,
    Claimed,
    StatusChanged,
    Reverted,
    /// Claim that bypassed audit-objectivity validation; kept for traceability.
    OverrideClaimed,
}

impl AccessAction {
    /// Actions that represent forward progress on the task, as opposed to
    /// reads. The repetition check only counts non-progress accesses.
    pub fn is_progress(&self) -> bool {
        matches!(
            self,
            Self::Claimed | Self::StatusChanged | Self::Reverted | Self::OverrideClaimed
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskCategory {
    #[default]
    Implementation,
    /// Review of another agent's work; routed through objectivity validation.
    Audit,
    Research,
    Maintenance,
}

impl std::fmt::Display for TaskCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Implementation => write!(f, "implementation"),
            Self::Audit => write!(f, "audit"),
            Self::Research => write!(f, "research"),
            Self::Maintenance => write!(f, "maintenance"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    P1,
    #[default]
    P2,
    P3,
}

impl Priority {
    /// Lower rank sorts first when picking the next claimable task.
    pub fn rank(&self) -> u8 {
        match self {
            Self::P1 => 0,
            Self::P2 => 1,
            Self::P3 => 2,
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::P1 => write!(f, "p1"),
            Self::P2 => write!(f, "p2"),
            Self::P3 => write!(f, "p3"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claim_sets_ownership() {
        let mut task = Task::new("implement parser");
        let now = Utc::now();
        task.claim("agent-1", now, DEFAULT_HISTORY_CAP);

        assert_eq!(task.status, TaskStatus::InProgress);
        assert_eq!(task.assigned_agent.as_deref(), Some("agent-1"));
        assert_eq!(task.last_activity, now);
        assert_eq!(task.access_history.len(), 1);
        assert_eq!(task.access_history[0].action, AccessAction::Claimed);
    }

    #[test]
    fn test_revert_clears_ownership() {
        let mut task = Task::new("implement parser");
        let now = Utc::now();
        task.claim("agent-1", now, DEFAULT_HISTORY_CAP);
        task.revert(now, DEFAULT_HISTORY_CAP);

        assert_eq!(task.status, TaskStatus::Pending);
        assert!(task.assigned_agent.is_none());
        assert_eq!(
            task.access_history.last().unwrap().action,
            AccessAction::Reverted
        );
    }

    #[test]
    fn test_claimable_requires_completed_dependencies() {
        let task = Task::new("step two").with_dependencies(vec!["t-1".into()]);

        assert!(!task.is_claimable(&[]));
        assert!(task.is_claimable(&["t-1"]));
    }

    #[test]
    fn test_access_history_bounded() {
        let mut task = Task::new("busy task");
        let now = Utc::now();
        for _ in 0..10 {
            task.push_access("agent-1", AccessAction::Accessed, now, 4);
        }
        assert_eq!(task.access_history.len(), 4);
    }

    #[test]
    fn test_history_eviction_drops_oldest() {
        let mut task = Task::new("busy task");
        let now = Utc::now();
        task.push_access("agent-1", AccessAction::Claimed, now, 3);
        task.push_access("agent-1", AccessAction::Accessed, now, 3);
        task.push_access("agent-1", AccessAction::Accessed, now, 3);
        task.push_access("agent-1", AccessAction::StatusChanged, now, 3);

        assert_eq!(task.access_history.len(), 3);
        // The Claimed record was oldest and must be gone.
        assert_eq!(task.access_history[0].action, AccessAction::Accessed);
    }
}
