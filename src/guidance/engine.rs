use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use super::RepetitionCheck;
use crate::audit::validate_claim;
use crate::store::TaskDocument;
use crate::task::{AccessAction, Task, DEFAULT_HISTORY_CAP};

/// What an agent should do next. `decide` computes this purely from a
/// document snapshot; `apply` performs the single side effect (claiming or
/// recording the access) so the transition stays testable without I/O.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Guidance {
    ContinueTask {
        task_id: String,
        title: String,
    },
    StartNewTask {
        task_id: String,
        title: String,
    },
    NoTasksAvailable,
    StuckTaskIntervention {
        task_id: String,
        title: String,
        guidance: String,
    },
}

impl Guidance {
    /// Exit code contract: 0 means nothing to do, 2 means the caller should
    /// keep working (continue, start, or resolve the stuck task).
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::NoTasksAvailable => 0,
            _ => 2,
        }
    }
}

pub struct GuidanceEngine {
    repetition: RepetitionCheck,
    history_cap: usize,
}

impl Default for GuidanceEngine {
    fn default() -> Self {
        Self {
            repetition: RepetitionCheck::default(),
            history_cap: DEFAULT_HISTORY_CAP,
        }
    }
}

impl GuidanceEngine {
    pub fn new(repetition: RepetitionCheck, history_cap: usize) -> Self {
        Self {
            repetition,
            history_cap,
        }
    }

    /// Pure decision over (document snapshot, agent, now). Evaluated per
    /// agent independently; other agents' in-progress tasks never serialize
    /// this one.
    pub fn decide(&self, doc: &TaskDocument, agent_id: &str, now: DateTime<Utc>) -> Guidance {
        if let Some(task) = doc.in_progress_for(agent_id) {
            if self.repetition.trips(task, agent_id, now) {
                return Guidance::StuckTaskIntervention {
                    task_id: task.id.clone(),
                    title: task.title.clone(),
                    guidance: format!(
                        "Task '{}' has been read repeatedly without progress. \
                         Finish it and run `taskwarden update-status {} completed --agent {}`, \
                         or move it out of the way with status 'blocked'.",
                        task.title, task.id, agent_id
                    ),
                };
            }
            return Guidance::ContinueTask {
                task_id: task.id.clone(),
                title: task.title.clone(),
            };
        }

        match self.next_claimable(doc, agent_id) {
            Some(task) => Guidance::StartNewTask {
                task_id: task.id.clone(),
                title: task.title.clone(),
            },
            None => Guidance::NoTasksAvailable,
        }
    }

    fn next_claimable<'a>(&self, doc: &'a TaskDocument, agent_id: &str) -> Option<&'a Task> {
        let completed = doc.completed_ids();
        let mut candidates: Vec<&Task> = doc
            .tasks
            .iter()
            .filter(|t| t.is_claimable(&completed))
            .filter(|t| validate_claim(t, agent_id, false).is_allowed())
            .collect();
        candidates.sort_by_key(|t| (t.priority.rank(), t.created_at));
        candidates.first().copied()
    }

    /// Applies the decision's side effect to the document: a claim for
    /// `StartNewTask`, an access record for continue/stuck. Guidance reads
    /// do not refresh `last_activity`; only real progress (status changes,
    /// heartbeats) keeps a task from going stale.
    pub fn apply(
        &self,
        doc: &mut TaskDocument,
        agent_id: &str,
        decision: &Guidance,
        now: DateTime<Utc>,
    ) {
        doc.counters.execution_count += 1;

        match decision {
            Guidance::StartNewTask { task_id, .. } => {
                if let Some(task) = doc.task_mut(task_id) {
                    task.claim(agent_id, now, self.history_cap);
                    debug!(task_id = %task_id, agent = %agent_id, "Task claimed via guidance");
                }
            }
            Guidance::ContinueTask { task_id, .. }
            | Guidance::StuckTaskIntervention { task_id, .. } => {
                if let Some(task) = doc.task_mut(task_id) {
                    task.push_access(agent_id, AccessAction::Accessed, now, self.history_cap);
                }
            }
            Guidance::NoTasksAvailable => {}
        }
    }
}
