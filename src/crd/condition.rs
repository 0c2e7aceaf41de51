//! # Conditions and Lifecycle State
//!
//! Vocabulary shared by every status block: the coarse [`State`] and the
//! typed [`Condition`] entries, keyed by type.
//!
//! Conditions are upserted in place. The transition time only moves when the
//! status or reason changes, so a message rewrite does not look like a new
//! transition.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Coarse lifecycle state of a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub enum State {
    Processing,
    Ready,
    Warning,
    Error,
    Deleting,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            State::Processing => "Processing",
            State::Ready => "Ready",
            State::Warning => "Warning",
            State::Error => "Error",
            State::Deleting => "Deleting",
        };
        f.write_str(s)
    }
}

/// Status of a condition (True, False, Unknown)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize, JsonSchema)]
pub enum ConditionStatus {
    True,
    False,
    #[default]
    Unknown,
}

/// Condition represents one observed aspect of a resource
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Type of condition, unique within a status block
    pub r#type: String,
    pub status: ConditionStatus,
    /// Generation of the resource this condition was computed for
    #[serde(default)]
    pub observed_generation: Option<i64>,
    /// Last time status or reason changed (RFC3339)
    #[serde(default)]
    pub last_transition_time: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl Condition {
    pub fn new(
        kind: &str,
        status: ConditionStatus,
        reason: &str,
        message: impl Into<String>,
    ) -> Self {
        Self {
            r#type: kind.to_string(),
            status,
            observed_generation: None,
            last_transition_time: None,
            reason: Some(reason.to_string()),
            message: Some(message.into()),
        }
    }

    #[must_use]
    pub fn with_generation(mut self, generation: Option<i64>) -> Self {
        self.observed_generation = generation;
        self
    }

    /// Same status, reason and message
    ///
    /// This is the identity used for event deduplication.
    pub fn same_observation(&self, other: &Condition) -> bool {
        self.status == other.status && self.reason == other.reason && self.message == other.message
    }

    /// Field-by-field equality, including timestamps
    pub fn identical(&self, other: &Condition) -> bool {
        self.r#type == other.r#type
            && self.same_observation(other)
            && self.observed_generation == other.observed_generation
            && self.last_transition_time == other.last_transition_time
    }

    fn is_transition_from(&self, previous: &Condition) -> bool {
        self.status != previous.status || self.reason != previous.reason
    }
}

/// Insert or replace the condition with the same type
///
/// The existing entry keeps its position. Its transition time is carried
/// over unless status or reason changed.
pub fn set_condition(conditions: &mut Vec<Condition>, condition: Condition) {
    set_condition_at(conditions, condition, Utc::now());
}

/// [`set_condition`] with an explicit clock
pub fn set_condition_at(conditions: &mut Vec<Condition>, mut condition: Condition, now: DateTime<Utc>) {
    let now = now.to_rfc3339();
    match conditions.iter_mut().find(|c| c.r#type == condition.r#type) {
        Some(existing) => {
            condition.last_transition_time = if condition.is_transition_from(existing) {
                Some(now)
            } else {
                existing.last_transition_time.clone().or(Some(now))
            };
            *existing = condition;
        }
        None => {
            condition.last_transition_time = Some(now);
            conditions.push(condition);
        }
    }
}

pub fn find_condition<'a>(conditions: &'a [Condition], kind: &str) -> Option<&'a Condition> {
    conditions.iter().find(|c| c.r#type == kind)
}

/// True when both sequences hold identical conditions in the same order
pub fn conditions_identical(a: &[Condition], b: &[Condition]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.identical(y))
}

/// A status block that carries a lifecycle state and conditions
///
/// `differs_from` is an explicit comparator: it decides whether a status
/// write is needed, so every persisted field must be listed in it.
pub trait ConditionedStatus: Clone + Default + Send + Sync + 'static {
    fn state(&self) -> Option<State>;
    fn set_state(&mut self, state: State);
    fn conditions(&self) -> &[Condition];
    fn conditions_mut(&mut self) -> &mut Vec<Condition>;
    fn differs_from(&self, other: &Self) -> bool;

    fn condition(&self, kind: &str) -> Option<&Condition> {
        find_condition(self.conditions(), kind)
    }

    fn set_condition(&mut self, condition: Condition) {
        set_condition(self.conditions_mut(), condition);
    }
}
