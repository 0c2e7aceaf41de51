//! # Events
//!
//! Kubernetes Event emission for condition transitions.
//!
//! Events are fire-and-forget: a failed publish is logged and never turns
//! into a reconciliation error. [`emit_condition_events`] emits one event per
//! condition that changed against a baseline, which keeps repeated
//! reconciliations of a settled resource silent.

use super::snapshot::StatusSnapshot;
use crate::crd::condition::{Condition, ConditionStatus, ConditionedStatus};
use crate::observability::metrics;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::ObjectReference;
use kube::runtime::events::{Event, EventType, Recorder, Reporter};
use kube::Client;
use tracing::{debug, warn};

/// Event severity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventSeverity {
    Normal,
    Warning,
}

impl EventSeverity {
    /// False conditions are warnings, everything else is normal
    pub fn for_condition(condition: &Condition) -> Self {
        if condition.status == ConditionStatus::False {
            EventSeverity::Warning
        } else {
            EventSeverity::Normal
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EventSeverity::Normal => "Normal",
            EventSeverity::Warning => "Warning",
        }
    }
}

/// Sink for Kubernetes Events
#[async_trait]
pub trait EventRecorder: Send + Sync {
    /// Publish an event about `owner`. Never fails.
    async fn emit(
        &self,
        owner: &ObjectReference,
        severity: EventSeverity,
        reason: &str,
        message: &str,
    );
}

/// Production recorder wrapping `kube::runtime::events::Recorder`
pub struct KubeEventRecorder {
    recorder: Recorder,
}

impl std::fmt::Debug for KubeEventRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeEventRecorder").finish_non_exhaustive()
    }
}

impl KubeEventRecorder {
    /// The controller name shows up as the event's reporting component
    pub fn new(client: Client, controller_name: &str) -> Self {
        let reporter = Reporter {
            controller: controller_name.to_string(),
            instance: None,
        };
        Self {
            recorder: Recorder::new(client, reporter),
        }
    }
}

#[async_trait]
impl EventRecorder for KubeEventRecorder {
    async fn emit(
        &self,
        owner: &ObjectReference,
        severity: EventSeverity,
        reason: &str,
        message: &str,
    ) {
        let event = Event {
            type_: match severity {
                EventSeverity::Normal => EventType::Normal,
                EventSeverity::Warning => EventType::Warning,
            },
            reason: reason.to_string(),
            note: Some(message.to_string()),
            action: "Reconcile".to_string(),
            secondary: None,
        };
        if let Err(e) = self.recorder.publish(&event, owner).await {
            warn!(reason, error = %e, "Failed to publish Kubernetes event");
        }
    }
}

/// Recorder that drops every event
#[derive(Debug, Default)]
pub struct NoopEventRecorder;

#[async_trait]
impl EventRecorder for NoopEventRecorder {
    async fn emit(
        &self,
        _owner: &ObjectReference,
        _severity: EventSeverity,
        _reason: &str,
        _message: &str,
    ) {
    }
}

/// Emit one event per condition of `current` that changed against `baseline`
///
/// Returns the number of events emitted. The caller refreshes the baseline
/// afterwards regardless of publish failures.
pub async fn emit_condition_events<S: ConditionedStatus>(
    recorder: &dyn EventRecorder,
    owner: &ObjectReference,
    current: &S,
    baseline: &StatusSnapshot<S>,
) -> usize {
    let changed = baseline.changed_conditions(current);
    for condition in &changed {
        let severity = EventSeverity::for_condition(condition);
        let reason = condition
            .reason
            .as_deref()
            .filter(|r| !r.is_empty())
            .unwrap_or(&condition.r#type);
        let message = condition.message.as_deref().unwrap_or_default();
        debug!(
            condition = %condition.r#type,
            severity = severity.as_str(),
            reason,
            "emitting event"
        );
        recorder.emit(owner, severity, reason, message).await;
        metrics::increment_events_emitted(severity.as_str());
    }
    changed.len()
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct RecordedEvent {
        pub severity: EventSeverity,
        pub reason: String,
        pub message: String,
    }

    /// Recorder that keeps every event in memory
    #[derive(Debug, Default)]
    pub struct RecordingEventRecorder {
        events: Mutex<Vec<RecordedEvent>>,
    }

    impl RecordingEventRecorder {
        pub fn events(&self) -> Vec<RecordedEvent> {
            self.events.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl EventRecorder for RecordingEventRecorder {
        async fn emit(
            &self,
            _owner: &ObjectReference,
            severity: EventSeverity,
            reason: &str,
            message: &str,
        ) {
            self.events.lock().unwrap().push(RecordedEvent {
                severity,
                reason: reason.to_string(),
                message: message.to_string(),
            });
        }
    }
}
