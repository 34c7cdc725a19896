use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::task::TaskCategory;

/// Running revert statistics, persisted with the document so the sweep's
/// task mutation and its accounting land in a single save.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StaleStats {
    pub total_reverts: u64,
    pub avg_stale_minutes: f64,
    pub reverts_by_agent: HashMap<String, u64>,
    pub reverts_by_category: HashMap<String, u64>,
}

impl StaleStats {
    pub fn record_revert(
        &mut self,
        agent_id: &str,
        category: TaskCategory,
        stale_for: chrono::Duration,
    ) {
        let minutes = stale_for.num_seconds() as f64 / 60.0;
        self.total_reverts += 1;
        // Running mean, no sample list retained.
        self.avg_stale_minutes += (minutes - self.avg_stale_minutes) / self.total_reverts as f64;

        *self
            .reverts_by_agent
            .entry(agent_id.to_string())
            .or_insert(0) += 1;
        *self
            .reverts_by_category
            .entry(category.to_string())
            .or_insert(0) += 1;
    }

    pub fn most_affected_agent(&self) -> Option<(&str, u64)> {
        self.reverts_by_agent
            .iter()
            .max_by_key(|(_, count)| **count)
            .map(|(id, count)| (id.as_str(), *count))
    }

    pub fn most_affected_category(&self) -> Option<(&str, u64)> {
        self.reverts_by_category
            .iter()
            .max_by_key(|(_, count)| **count)
            .map(|(cat, count)| (cat.as_str(), *count))
    }
}
