//! # Status Snapshot
//!
//! Value copies of a status block used as comparison baselines.

use crate::crd::condition::{find_condition, Condition, ConditionedStatus};

/// A point-in-time copy of a status block
#[derive(Debug, Clone)]
pub struct StatusSnapshot<S> {
    status: S,
}

impl<S: ConditionedStatus> StatusSnapshot<S> {
    pub fn take(status: &S) -> Self {
        Self {
            status: status.clone(),
        }
    }

    pub fn status(&self) -> &S {
        &self.status
    }

    /// Whether `current` needs to be written to reach this baseline
    pub fn differs(&self, current: &S) -> bool {
        current.differs_from(&self.status)
    }

    /// Conditions in `current` whose status, reason or message differ from
    /// the condition of the same type in the baseline
    pub fn changed_conditions<'a>(&self, current: &'a S) -> Vec<&'a Condition> {
        current
            .conditions()
            .iter()
            .filter(|condition| {
                find_condition(self.status.conditions(), &condition.r#type)
                    .is_none_or(|previous| !previous.same_observation(condition))
            })
            .collect()
    }
}
