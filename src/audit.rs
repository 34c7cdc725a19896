//! Reviewer-independence validation for audit task claims.

use serde::Serialize;

use crate::task::{Task, TaskCategory};

/// Outcome of validating a claim attempt. A self-review rejection is a
/// business-rule refusal with a reason, not a system fault; it is returned
/// as data and surfaced to the caller as `{success: false, reason}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ClaimValidation {
    Allowed,
    /// The caller explicitly bypassed the objectivity rule; the claim
    /// proceeds but is flagged in the task history.
    AllowedWithOverride,
    Refused { reason: String },
}

impl ClaimValidation {
    pub fn is_allowed(&self) -> bool {
        !matches!(self, Self::Refused { .. })
    }
}

/// Pure predicate, evaluated before any state mutation: an agent may not
/// audit work it originally implemented unless `allow_out_of_order` is set.
pub fn validate_claim(task: &Task, agent_id: &str, allow_out_of_order: bool) -> ClaimValidation {
    if task.category != TaskCategory::Audit {
        return ClaimValidation::Allowed;
    }

    match task.original_implementer.as_deref() {
        Some(implementer) if implementer == agent_id => {
            if allow_out_of_order {
                ClaimValidation::AllowedWithOverride
            } else {
                ClaimValidation::Refused {
                    reason: format!(
                        "agent '{}' implemented the work under audit in task '{}' and may not review it",
                        agent_id, task.id
                    ),
                }
            }
        }
        _ => ClaimValidation::Allowed,
    }
}
