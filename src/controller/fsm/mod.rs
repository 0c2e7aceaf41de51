//! # State Machine
//!
//! Continuation-driven reconciliation loop shared by the Function and
//! Serverless controllers.
//!
//! A controller defines its steps as an enum implementing [`Step`]. Each step
//! mutates the working status held by the [`StateMachine`] and returns a
//! [`Transition`] naming the next step (or none), an optional [`Requeue`] and
//! whether its condition changes should be announced as events.
//!
//! After every step the machine writes the status subresource if, and only
//! if, the working status differs from the last persisted copy. A failed
//! write ends the pass with that error. Cancellation is checked before each
//! step; once observed, nothing else is written.
//!
//! Two baselines are kept. The persistence baseline tracks what the API
//! server holds. The event baseline tracks what has been announced, so each
//! condition transition produces at most one event.

pub mod events;
pub mod snapshot;

use crate::cluster::{ObjectKey, ObjectStore};
use crate::crd::condition::{Condition, ConditionStatus, ConditionedStatus, State};
use crate::error::ReconcilerError;
use crate::observability::metrics;
use async_trait::async_trait;
use events::{emit_condition_events, EventRecorder};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use kube::runtime::controller::Action;
use kube::Resource;
use snapshot::StatusSnapshot;
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// A custom resource driven by the state machine
pub trait Reconciled: Resource<DynamicType = ()> + Clone + Send + Sync + 'static {
    type Status: ConditionedStatus;

    fn current_status(&self) -> Option<&Self::Status>;

    fn replace_status(&mut self, status: Self::Status);
}

/// Request to run reconciliation again
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requeue {
    Now,
    After(Duration),
}

impl fmt::Display for Requeue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Requeue::Now => f.write_str("now"),
            Requeue::After(d) => write!(f, "after {}s", d.as_secs()),
        }
    }
}

/// Controller action for the outcome of a pass
///
/// Without an explicit requeue the controller waits for the next watch event.
pub fn into_action(requeue: Option<Requeue>) -> Action {
    match requeue {
        Some(Requeue::Now) => Action::requeue(Duration::ZERO),
        Some(Requeue::After(d)) => Action::requeue(d),
        None => Action::await_change(),
    }
}

/// What a step decided
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition<S> {
    pub next: Option<S>,
    pub requeue: Option<Requeue>,
    /// Emit events for conditions changed since the last announcement
    pub announce: bool,
}

impl<S> Transition<S> {
    pub fn next(step: S) -> Self {
        Self {
            next: Some(step),
            requeue: None,
            announce: false,
        }
    }

    pub fn stop() -> Self {
        Self {
            next: None,
            requeue: None,
            announce: false,
        }
    }

    #[must_use]
    pub fn with_requeue(mut self, requeue: Option<Requeue>) -> Self {
        self.requeue = requeue;
        self
    }

    #[must_use]
    pub fn requeue_now(self) -> Self {
        self.with_requeue(Some(Requeue::Now))
    }

    #[must_use]
    pub fn requeue_after(self, delay: Duration) -> Self {
        self.with_requeue(Some(Requeue::After(delay)))
    }

    #[must_use]
    pub fn announced(mut self) -> Self {
        self.announce = true;
        self
    }
}

pub type StepResult<S> = Result<Transition<S>, ReconcilerError>;

/// One named unit of reconciliation logic
///
/// `Display` provides the name logged when the machine switches to the step.
#[async_trait]
pub trait Step<K: Reconciled, D: Sync>: fmt::Display + Send + Sized {
    async fn run(self, machine: &mut StateMachine<'_, K, D>) -> StepResult<Self>;
}

/// Cooperative cancellation: process shutdown plus an optional deadline
#[derive(Debug, Clone)]
pub struct Cancellation {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl Cancellation {
    pub fn new(token: CancellationToken) -> Self {
        Self {
            token,
            deadline: None,
        }
    }

    /// A cancellation that never fires
    pub fn none() -> Self {
        Self::new(CancellationToken::new())
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some(Instant::now() + timeout);
        self
    }

    pub fn check(&self) -> Result<(), ReconcilerError> {
        if self.token.is_cancelled() {
            return Err(ReconcilerError::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(ReconcilerError::DeadlineExceeded),
            _ => Ok(()),
        }
    }
}

/// Per-invocation working state of one reconciliation
///
/// The working status lives here, not in `resource`; it is copied into the
/// resource only when written.
pub struct StateMachine<'a, K: Reconciled, D> {
    resource: K,
    status: K::Status,
    persisted: StatusSnapshot<K::Status>,
    announced: StatusSnapshot<K::Status>,
    store: &'a dyn ObjectStore<K>,
    recorder: &'a dyn EventRecorder,
    deps: &'a D,
}

impl<K: Reconciled, D> fmt::Debug for StateMachine<'_, K, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateMachine")
            .field("resource", &self.resource.meta().name)
            .finish_non_exhaustive()
    }
}

impl<'a, K: Reconciled, D: Sync> StateMachine<'a, K, D> {
    pub fn new(
        resource: K,
        store: &'a dyn ObjectStore<K>,
        recorder: &'a dyn EventRecorder,
        deps: &'a D,
    ) -> Self {
        let status = resource.current_status().cloned().unwrap_or_default();
        Self {
            persisted: StatusSnapshot::take(&status),
            announced: StatusSnapshot::take(&status),
            resource,
            status,
            store,
            recorder,
            deps,
        }
    }

    pub fn resource(&self) -> &K {
        &self.resource
    }

    pub fn metadata_mut(&mut self) -> &mut ObjectMeta {
        self.resource.meta_mut()
    }

    /// Adopt an object returned by a full-object write, keeping the working status
    pub fn replace_resource(&mut self, stored: K) {
        self.resource = stored;
    }

    pub fn status(&self) -> &K::Status {
        &self.status
    }

    pub fn status_mut(&mut self) -> &mut K::Status {
        &mut self.status
    }

    pub fn store(&self) -> &'a dyn ObjectStore<K> {
        self.store
    }

    pub fn deps(&self) -> &'a D {
        self.deps
    }

    pub fn generation(&self) -> Option<i64> {
        self.resource.meta().generation
    }

    pub fn is_deleting(&self) -> bool {
        self.resource.meta().deletion_timestamp.is_some()
    }

    pub fn key(&self) -> Result<ObjectKey, ReconcilerError> {
        ObjectKey::of(&self.resource).ok_or(ReconcilerError::MissingMetadata("metadata.namespace"))
    }

    /// Controller owner reference pointing at the reconciled resource
    pub fn owner_reference(&self) -> Result<OwnerReference, ReconcilerError> {
        self.resource
            .controller_owner_ref(&())
            .ok_or(ReconcilerError::MissingMetadata("metadata.uid"))
    }

    pub fn set_state(&mut self, state: State) {
        self.status.set_state(state);
    }

    /// Set `Processing` on the first observation of a resource
    pub fn mark_observed(&mut self) {
        if self.status.state().is_none() {
            self.status.set_state(State::Processing);
        }
    }

    pub fn set_condition(
        &mut self,
        kind: &str,
        status: ConditionStatus,
        reason: &str,
        message: impl Into<String>,
    ) {
        let generation = self.generation();
        self.status
            .set_condition(Condition::new(kind, status, reason, message).with_generation(generation));
    }

    /// Drive `start` and its successors to completion
    ///
    /// Returns the last requeue any step supplied.
    pub async fn run<S: Step<K, D>>(
        mut self,
        start: S,
        cancel: &Cancellation,
    ) -> Result<Option<Requeue>, ReconcilerError> {
        let name = self.resource.meta().name.clone().unwrap_or_default();
        let namespace = self.resource.meta().namespace.clone().unwrap_or_default();

        let mut next = Some(start);
        let mut requeue = None;
        let mut failure = None;

        while let Some(step) = next.take() {
            if let Err(err) = cancel.check() {
                failure = Some(err);
                break;
            }

            info!(
                resource.name = %name,
                resource.namespace = %namespace,
                step = %step,
                "switching state"
            );
            let outcome = step.run(&mut self).await;

            if let Err(err) = self.persist_status().await {
                failure = Some(err);
                break;
            }

            match outcome {
                Ok(transition) => {
                    if transition.requeue.is_some() {
                        requeue = transition.requeue;
                    }
                    if transition.announce {
                        self.announce().await;
                    }
                    next = transition.next;
                }
                Err(err) => {
                    self.announce().await;
                    failure = Some(err);
                }
            }
        }

        match &failure {
            Some(err) => warn!(
                resource.name = %name,
                resource.namespace = %namespace,
                error = %err,
                "reconciliation done"
            ),
            None => info!(
                resource.name = %name,
                resource.namespace = %namespace,
                requeue = %requeue.map_or_else(|| "none".to_string(), |r| r.to_string()),
                "reconciliation done"
            ),
        }

        failure.map_or(Ok(requeue), Err)
    }

    async fn persist_status(&mut self) -> Result<(), ReconcilerError> {
        if !self.persisted.differs(&self.status) {
            return Ok(());
        }
        let mut obj = self.resource.clone();
        obj.replace_status(self.status.clone());
        debug!(resource.name = ?self.resource.meta().name, "updating status");
        let stored = self.store.update_status(&obj).await?;
        self.resource.meta_mut().resource_version = stored.meta().resource_version.clone();
        self.persisted = StatusSnapshot::take(&self.status);
        metrics::increment_status_writes(&K::kind(&()));
        Ok(())
    }

    async fn announce(&mut self) {
        let owner = self.resource.object_ref(&());
        emit_condition_events(self.recorder, &owner, &self.status, &self.announced).await;
        self.announced = StatusSnapshot::take(&self.status);
    }
}
