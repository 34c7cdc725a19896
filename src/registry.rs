//! Agent liveness tracking, independent of task assignment.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::info;

use crate::store::TaskDocument;
use crate::task::Agent;

#[derive(Debug, Clone, Serialize)]
pub struct RegistrySweepReport {
    pub removed: usize,
    pub remaining: usize,
    pub removed_ids: Vec<String>,
}

pub struct AgentRegistry {
    inactive_threshold: Duration,
}

impl AgentRegistry {
    pub fn new(inactive_threshold: Duration) -> Self {
        Self { inactive_threshold }
    }

    pub fn from_minutes(minutes: i64) -> Self {
        Self::new(Duration::minutes(minutes))
    }

    /// Updates the agent's last-activity timestamp, registering the agent on
    /// first contact.
    pub fn record_activity(&self, doc: &mut TaskDocument, agent_id: &str, now: DateTime<Utc>) {
        doc.agents
            .entry(agent_id.to_string())
            .and_modify(|agent| agent.last_activity = Some(now))
            .or_insert_with(|| Agent::new(agent_id, now));
    }

    /// Drops every inactive agent from the registry and returns the counts.
    /// Inactivity uses the same strict elapsed rule as the staleness sweep;
    /// an agent that never recorded activity is maximally stale and goes on
    /// the first sweep. Callers write a backup of the document before
    /// persisting the pruned registry.
    pub fn sweep_inactive(&self, doc: &mut TaskDocument, now: DateTime<Utc>) -> RegistrySweepReport {
        let threshold = self.inactive_threshold;
        let mut removed_ids = Vec::new();

        doc.agents.retain(|id, agent| {
            let active = agent.is_active_at(now, threshold);
            if !active {
                removed_ids.push(id.clone());
            }
            active
        });
        removed_ids.sort();

        let report = RegistrySweepReport {
            removed: removed_ids.len(),
            remaining: doc.agents.len(),
            removed_ids,
        };

        if report.removed > 0 {
            info!(
                removed = report.removed,
                remaining = report.remaining,
                "Inactive agents removed from registry"
            );
        }

        report
    }
}
