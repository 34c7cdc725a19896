use chrono::{DateTime, Duration, Utc};

use crate::task::{AccessAction, Task};

/// Detects the no-progress polling pattern: the same agent reading its
/// in-progress task over and over inside a trailing window without any
/// status change.
#[derive(Debug, Clone, Copy)]
pub struct RepetitionCheck {
    pub window: Duration,
    pub threshold: usize,
}

impl Default for RepetitionCheck {
    fn default() -> Self {
        Self {
            window: Duration::hours(1),
            threshold: 3,
        }
    }
}

impl RepetitionCheck {
    pub fn new(window: Duration, threshold: usize) -> Self {
        Self { window, threshold }
    }

    /// Whether the access currently being decided would be the one that
    /// trips the pattern. The invocation under evaluation counts toward the
    /// threshold, so with a threshold of 3 the second access never trips and
    /// the third does. Any progress action inside the window resets the
    /// pattern.
    pub fn trips(&self, task: &Task, agent_id: &str, now: DateTime<Utc>) -> bool {
        let cutoff = now - self.window;
        let mut recent_accesses = 0usize;

        for record in &task.access_history {
            if record.at <= cutoff || record.agent_id != agent_id {
                continue;
            }
            if record.action.is_progress() {
                return false;
            }
            if record.action == AccessAction::Accessed {
                recent_accesses += 1;
            }
        }

        recent_accesses + 1 >= self.threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::DEFAULT_HISTORY_CAP;

    fn task_with_accesses(agent: &str, count: usize, now: DateTime<Utc>) -> Task {
        let mut task = Task::new("stuck candidate");
        for i in 0..count {
            task.push_access(
                agent,
                AccessAction::Accessed,
                now - Duration::minutes(10 * (count - i) as i64),
                DEFAULT_HISTORY_CAP,
            );
        }
        task
    }

    #[test]
    fn test_second_access_does_not_trip() {
        let now = Utc::now();
        let task = task_with_accesses("agent-1", 1, now);
        assert!(!RepetitionCheck::default().trips(&task, "agent-1", now));
    }

    #[test]
    fn test_third_access_trips() {
        let now = Utc::now();
        let task = task_with_accesses("agent-1", 2, now);
        assert!(RepetitionCheck::default().trips(&task, "agent-1", now));
    }

    #[test]
    fn test_accesses_outside_window_ignored() {
        let now = Utc::now();
        let mut task = Task::new("old reads");
        for hours in [3, 2] {
            task.push_access(
                "agent-1",
                AccessAction::Accessed,
                now - Duration::hours(hours),
                DEFAULT_HISTORY_CAP,
            );
        }
        assert!(!RepetitionCheck::default().trips(&task, "agent-1", now));
    }

    #[test]
    fn test_progress_inside_window_resets() {
        let now = Utc::now();
        let mut task = task_with_accesses("agent-1", 4, now);
        task.push_access(
            "agent-1",
            AccessAction::StatusChanged,
            now - Duration::minutes(1),
            DEFAULT_HISTORY_CAP,
        );
        assert!(!RepetitionCheck::default().trips(&task, "agent-1", now));
    }

    #[test]
    fn test_other_agents_accesses_ignored() {
        let now = Utc::now();
        let task = task_with_accesses("agent-2", 5, now);
        assert!(!RepetitionCheck::default().trips(&task, "agent-1", now));
    }
}
