//! Deployment convergence and the `Running` condition it reports.

use super::{converge, Converged, Convergent};
use crate::cluster::ObjectStore;
use crate::controller::fsm::{Reconciled, Requeue, StateMachine};
use crate::crd::condition::ConditionStatus;
use crate::crd::function::{condition_types, reasons};
use crate::error::ReconcilerError;
use crate::resources::quantity::quantity_maps_equal;
use k8s_openapi::api::apps::v1::{Deployment, DeploymentCondition};
use k8s_openapi::api::core::v1::{Container, EnvVar, PodTemplateSpec, ResourceRequirements};
use std::collections::BTreeMap;
use std::time::Duration;

fn template(d: &Deployment) -> Option<&PodTemplateSpec> {
    d.spec.as_ref().map(|s| &s.template)
}

fn first_container(d: &Deployment) -> Option<&Container> {
    template(d)?.spec.as_ref()?.containers.first()
}

fn template_labels(d: &Deployment) -> BTreeMap<String, String> {
    template(d)
        .and_then(|t| t.metadata.as_ref())
        .and_then(|m| m.labels.clone())
        .unwrap_or_default()
}

/// Replica count with the API default applied
fn replicas(d: &Deployment) -> i32 {
    d.spec.as_ref().and_then(|s| s.replicas).unwrap_or(1)
}

fn slice<T>(v: Option<&Vec<T>>) -> &[T] {
    v.map_or(&[], Vec::as_slice)
}

fn resources_equal(a: Option<&ResourceRequirements>, b: Option<&ResourceRequirements>) -> bool {
    let limits = |r: Option<&ResourceRequirements>| r.and_then(|r| r.limits.clone()).unwrap_or_default();
    let requests =
        |r: Option<&ResourceRequirements>| r.and_then(|r| r.requests.clone()).unwrap_or_default();
    quantity_maps_equal(&limits(a), &limits(b)) && quantity_maps_equal(&requests(a), &requests(b))
}

/// Env var as the API server returns it: an empty value is omitted
fn normalized_env(env: Option<&Vec<EnvVar>>) -> Vec<EnvVar> {
    slice(env)
        .iter()
        .map(|e| EnvVar {
            value: e.value.clone().filter(|v| !v.is_empty()),
            ..e.clone()
        })
        .collect()
}

/// Whether `live` differs from `desired` in a field the builder controls
///
/// Compared: container image, pod template labels, replicas, working dir,
/// command, resources, env and volume mounts. Absent and empty values are
/// equal, quantities compare by value and an unset replica count counts as 1.
pub fn deployment_changed(live: &Deployment, desired: &Deployment) -> bool {
    let (Some(a), Some(b)) = (first_container(live), first_container(desired)) else {
        return first_container(live).is_some() != first_container(desired).is_some();
    };

    a.image != b.image
        || template_labels(live) != template_labels(desired)
        || replicas(live) != replicas(desired)
        || a.working_dir != b.working_dir
        || slice(a.command.as_ref()) != slice(b.command.as_ref())
        || !resources_equal(a.resources.as_ref(), b.resources.as_ref())
        || normalized_env(a.env.as_ref()) != normalized_env(b.env.as_ref())
        || slice(a.volume_mounts.as_ref()) != slice(b.volume_mounts.as_ref())
}

impl Convergent for Deployment {
    fn has_drifted(live: &Self, desired: &Self) -> bool {
        deployment_changed(live, desired)
    }

    fn adopt_owned_fields(live: &mut Self, desired: &Self) {
        let Some(desired_spec) = desired.spec.as_ref() else {
            return;
        };
        let live_spec = live.spec.get_or_insert_with(Default::default);
        live_spec.template = desired_spec.template.clone();
        live_spec.replicas = desired_spec.replicas;
    }
}

/// Rollout state of a live Deployment
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rollout {
    /// Available, with every desired replica updated and ready for the
    /// current generation
    Ready,
    /// The progress deadline passed; carries the controller's message
    Failed(String),
    /// Still rolling out, or not yet observed by the deployment controller
    InProgress,
}

fn deployment_condition<'a>(d: &'a Deployment, kind: &str) -> Option<&'a DeploymentCondition> {
    d.status
        .as_ref()?
        .conditions
        .as_ref()?
        .iter()
        .find(|c| c.type_ == kind)
}

/// Classify the rollout of `live`
///
/// Only definitive observations count: a status that lags behind the
/// object's generation is always `InProgress`.
pub fn rollout_status(live: &Deployment) -> Rollout {
    let Some(status) = live.status.as_ref() else {
        return Rollout::InProgress;
    };
    if status.observed_generation < live.metadata.generation {
        return Rollout::InProgress;
    }

    if let Some(progressing) = deployment_condition(live, "Progressing") {
        if progressing.reason.as_deref() == Some("ProgressDeadlineExceeded") {
            return Rollout::Failed(progressing.message.clone().unwrap_or_default());
        }
    }

    let desired = replicas(live);
    let available = deployment_condition(live, "Available").is_some_and(|c| c.status == "True");
    let settled = status.updated_replicas.unwrap_or(0) == desired
        && status.ready_replicas.unwrap_or(0) == desired
        && status.replicas.unwrap_or(0) == desired;

    if available && settled {
        Rollout::Ready
    } else {
        Rollout::InProgress
    }
}

/// Converge the Deployment and record the outcome in the `Running` condition
///
/// Creation requeues after `created_requeue` to watch the rollout, an update
/// requeues immediately, and a settled Deployment neither writes nor requeues.
pub async fn converge_deployment<K: Reconciled, D: Sync>(
    machine: &mut StateMachine<'_, K, D>,
    store: &dyn ObjectStore<Deployment>,
    desired: Deployment,
    created_requeue: Duration,
) -> Result<Option<Requeue>, ReconcilerError> {
    let owner = machine.owner_reference()?;
    let name = format!(
        "{}/{}",
        desired.metadata.namespace.as_deref().unwrap_or_default(),
        desired.metadata.name.as_deref().unwrap_or_default()
    );

    match converge(store, desired, owner).await {
        Ok(Converged::Created(_)) => {
            machine.set_condition(
                condition_types::RUNNING,
                ConditionStatus::Unknown,
                reasons::DEPLOYMENT_CREATED,
                format!("Deployment {name} created"),
            );
            Ok(Some(Requeue::After(created_requeue)))
        }
        Ok(Converged::Updated(_)) => {
            machine.set_condition(
                condition_types::RUNNING,
                ConditionStatus::Unknown,
                reasons::DEPLOYMENT_UPDATED,
                format!("Deployment {name} updated"),
            );
            Ok(Some(Requeue::Now))
        }
        Ok(Converged::Unchanged(_)) => Ok(None),
        Err(err) => {
            machine.set_condition(
                condition_types::RUNNING,
                ConditionStatus::False,
                reasons::DEPLOYMENT_FAILED,
                format!("Deployment {name} {} failed: {}", err.action, err.source),
            );
            Err(err.into())
        }
    }
}
