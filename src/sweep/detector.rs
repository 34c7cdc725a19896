use chrono::{DateTime, Duration, Utc};
use tracing::info;

use crate::store::TaskDocument;
use crate::task::{TaskStatus, DEFAULT_HISTORY_CAP};

/// Reclaims in-progress tasks whose owners went quiet. A task is stale when
/// `now - last_activity` strictly exceeds the threshold; boundary equality
/// is not stale.
pub struct StalenessDetector {
    threshold: Duration,
    history_cap: usize,
}

impl StalenessDetector {
    pub fn new(threshold: Duration) -> Self {
        Self {
            threshold,
            history_cap: DEFAULT_HISTORY_CAP,
        }
    }

    pub fn from_minutes(minutes: i64) -> Self {
        Self::new(Duration::minutes(minutes))
    }

    pub fn with_history_cap(mut self, cap: usize) -> Self {
        self.history_cap = cap;
        self
    }

    /// Reverts every stale in-progress task to pending, clears its owner,
    /// and folds the revert into the document's stats. Mutates only the
    /// in-memory document; the caller persists once, so a sweep is
    /// all-or-nothing on disk. Returns the reverted task IDs.
    pub fn sweep(&self, doc: &mut TaskDocument, now: DateTime<Utc>) -> Vec<String> {
        let mut reverted = Vec::new();

        for task in doc.tasks.iter_mut() {
            if task.status != TaskStatus::InProgress {
                continue;
            }
            let elapsed = task.stale_for(now);
            if elapsed <= self.threshold {
                continue;
            }

            let agent = task.assigned_agent.clone().unwrap_or_default();
            doc.stale_stats
                .record_revert(&agent, task.category, elapsed);
            task.revert(now, self.history_cap);

            info!(
                task_id = %task.id,
                agent = %agent,
                stale_minutes = elapsed.num_minutes(),
                "Stale task reverted to pending"
            );
            reverted.push(task.id.clone());
        }

        reverted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{AccessAction, Task};

    fn in_progress_task(title: &str, agent: &str, last_activity: DateTime<Utc>) -> Task {
        let mut task = Task::new(title);
        task.claim(agent, last_activity, DEFAULT_HISTORY_CAP);
        task
    }

    #[test]
    fn test_stale_task_reverted() {
        let now = Utc::now();
        let mut doc = TaskDocument::default();
        doc.tasks
            .push(in_progress_task("stale", "agent-1", now - Duration::minutes(31)));

        let reverted = StalenessDetector::from_minutes(30).sweep(&mut doc, now);

        assert_eq!(reverted.len(), 1);
        let task = &doc.tasks[0];
        assert_eq!(task.status, TaskStatus::Pending);
        assert!(task.assigned_agent.is_none());
        assert_eq!(
            task.access_history.last().unwrap().action,
            AccessAction::Reverted
        );
        assert_eq!(doc.stale_stats.total_reverts, 1);
        assert_eq!(doc.stale_stats.most_affected_agent(), Some(("agent-1", 1)));
    }

    #[test]
    fn test_boundary_equality_is_not_stale() {
        let now = Utc::now();
        let mut doc = TaskDocument::default();
        doc.tasks
            .push(in_progress_task("on the line", "agent-1", now - Duration::minutes(30)));

        let reverted = StalenessDetector::from_minutes(30).sweep(&mut doc, now);

        assert!(reverted.is_empty());
        assert_eq!(doc.tasks[0].status, TaskStatus::InProgress);
        assert_eq!(doc.tasks[0].assigned_agent.as_deref(), Some("agent-1"));
    }

    #[test]
    fn test_one_past_boundary_is_stale() {
        let now = Utc::now();
        let mut doc = TaskDocument::default();
        doc.tasks.push(in_progress_task(
            "just over",
            "agent-1",
            now - Duration::minutes(30) - Duration::seconds(1),
        ));

        let reverted = StalenessDetector::from_minutes(30).sweep(&mut doc, now);
        assert_eq!(reverted.len(), 1);
    }

    #[test]
    fn test_non_in_progress_tasks_never_mutated() {
        let now = Utc::now();
        let ancient = now - Duration::days(30);
        let mut doc = TaskDocument::default();

        let mut pending = Task::new("pending");
        pending.last_activity = ancient;
        let mut completed = Task::new("completed");
        completed.status = TaskStatus::Completed;
        completed.last_activity = ancient;
        let mut blocked = Task::new("blocked");
        blocked.status = TaskStatus::Blocked;
        blocked.last_activity = ancient;

        doc.tasks.push(pending);
        doc.tasks.push(completed);
        doc.tasks.push(blocked);

        let before = serde_json::to_value(&doc.tasks).unwrap();
        let reverted = StalenessDetector::from_minutes(30).sweep(&mut doc, now);

        assert!(reverted.is_empty());
        assert_eq!(serde_json::to_value(&doc.tasks).unwrap(), before);
    }

    #[test]
    fn test_stats_accumulate_across_sweeps() {
        let now = Utc::now();
        let mut doc = TaskDocument::default();
        doc.tasks
            .push(in_progress_task("first", "agent-1", now - Duration::minutes(45)));
        doc.tasks
            .push(in_progress_task("second", "agent-1", now - Duration::minutes(75)));

        let detector = StalenessDetector::from_minutes(30);
        let reverted = detector.sweep(&mut doc, now);

        assert_eq!(reverted.len(), 2);
        assert_eq!(doc.stale_stats.total_reverts, 2);
        assert!((doc.stale_stats.avg_stale_minutes - 60.0).abs() < 1e-9);
        assert_eq!(doc.stale_stats.most_affected_agent(), Some(("agent-1", 2)));
    }
}
