use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub id: String,

    #[serde(default)]
    pub role: Option<String>,

    #[serde(default)]
    pub specialization: Option<String>,

    /// None means the agent was registered but never reported activity.
    #[serde(default)]
    pub last_activity: Option<DateTime<Utc>>,

    pub registered_at: DateTime<Utc>,
}

impl Agent {
    pub fn new(id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            role: None,
            specialization: None,
            last_activity: Some(now),
            registered_at: now,
        }
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    pub fn with_specialization(mut self, specialization: impl Into<String>) -> Self {
        self.specialization = Some(specialization.into());
        self
    }

    /// An agent is active while `now - last_activity <= threshold`. Boundary
    /// equality counts as active; only strictly greater elapsed time is
    /// inactive. An agent with no recorded activity is treated as maximally
    /// stale and is therefore inactive on every check.
    pub fn is_active_at(&self, now: DateTime<Utc>, threshold: Duration) -> bool {
        match self.last_activity {
            Some(last) => now - last <= threshold,
            None => false,
        }
    }

    pub fn status_at(&self, now: DateTime<Utc>, threshold: Duration) -> AgentStatus {
        if self.is_active_at(now, threshold) {
            AgentStatus::Active
        } else {
            AgentStatus::Inactive
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Active,
    Inactive,
}

impl std::fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Inactive => write!(f, "inactive"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_active_within_threshold() {
        let now = Utc::now();
        let agent = Agent::new("agent-1", now - Duration::minutes(5));
        assert!(agent.is_active_at(now, Duration::minutes(30)));
    }

    #[test]
    fn test_inactive_beyond_threshold() {
        let now = Utc::now();
        let agent = Agent::new("agent-1", now - Duration::minutes(45));
        assert!(!agent.is_active_at(now, Duration::minutes(30)));
        assert_eq!(
            agent.status_at(now, Duration::minutes(30)),
            AgentStatus::Inactive
        );
    }

    #[test]
    fn test_boundary_equality_is_active() {
        let now = Utc::now();
        let agent = Agent::new("agent-1", now - Duration::minutes(30));
        assert!(agent.is_active_at(now, Duration::minutes(30)));
    }

    #[test]
    fn test_never_active_agent_is_inactive() {
        let now = Utc::now();
        let mut agent = Agent::new("agent-1", now);
        agent.last_activity = None;
        assert!(!agent.is_active_at(now, Duration::minutes(30)));
    }
}
