//! # Convergence
//!
//! Drives a live child object toward a freshly built desired object.
//!
//! - absent: create it, owned by the reconciled resource
//! - present and drifted in an owned field: copy the owned fields onto the
//!   live object and update it
//! - present and matching: nothing
//!
//! The live object is never replaced wholesale, so fields set by the platform
//! or other controllers survive an update.

pub mod deployment;
pub mod service;

use crate::cluster::{ObjectKey, ObjectStore, StoreError};
use crate::observability::metrics;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::Resource;
use std::fmt;
use thiserror::Error;
use tracing::{error, info};

/// A child object kind the controller keeps in sync
pub trait Convergent: Resource<DynamicType = ()> + Clone + Send + Sync + 'static {
    /// True when any field the builder owns differs
    fn has_drifted(live: &Self, desired: &Self) -> bool;

    /// Copy the owned fields of `desired` onto `live`
    fn adopt_owned_fields(live: &mut Self, desired: &Self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConvergeAction {
    Get,
    Create,
    Update,
}

impl ConvergeAction {
    pub fn as_str(self) -> &'static str {
        match self {
            ConvergeAction::Get => "get",
            ConvergeAction::Create => "create",
            ConvergeAction::Update => "update",
        }
    }
}

impl fmt::Display for ConvergeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What convergence did
#[derive(Debug, Clone)]
pub enum Converged<K> {
    Created(K),
    Updated(K),
    Unchanged(K),
}

#[derive(Debug, Error)]
#[error("failed to {action} {kind} {key}: {source}")]
pub struct ConvergeError {
    pub action: ConvergeAction,
    pub kind: String,
    pub key: String,
    #[source]
    pub source: StoreError,
}

/// Create, update or leave `desired`'s live counterpart
pub async fn converge<K: Convergent>(
    store: &dyn ObjectStore<K>,
    mut desired: K,
    owner: OwnerReference,
) -> Result<Converged<K>, ConvergeError> {
    let kind = K::kind(&()).to_string();
    let key = ObjectKey::of(&desired).ok_or_else(|| ConvergeError {
        action: ConvergeAction::Get,
        kind: kind.clone(),
        key: String::new(),
        source: StoreError::InvalidObject("metadata.namespace"),
    })?;
    let fail = |action: ConvergeAction, source: StoreError| {
        error!(kind = %kind, object = %key, action = %action, error = %source, "convergence failed");
        metrics::increment_convergence_errors(&kind, action.as_str());
        ConvergeError {
            action,
            kind: kind.clone(),
            key: key.to_string(),
            source,
        }
    };

    match store.get(&key).await {
        Err(err) if err.is_not_found() => {
            info!(kind = %kind, object = %key, "creating");
            desired.meta_mut().owner_references = Some(vec![owner]);
            let created = store
                .create(&desired)
                .await
                .map_err(|e| fail(ConvergeAction::Create, e))?;
            metrics::increment_convergence_actions(&kind, ConvergeAction::Create.as_str());
            Ok(Converged::Created(created))
        }
        Err(err) => Err(fail(ConvergeAction::Get, err)),
        Ok(mut live) => {
            if !K::has_drifted(&live, &desired) {
                return Ok(Converged::Unchanged(live));
            }
            info!(kind = %kind, object = %key, "updating drifted object");
            K::adopt_owned_fields(&mut live, &desired);
            let updated = store
                .update(&live)
                .await
                .map_err(|e| fail(ConvergeAction::Update, e))?;
            metrics::increment_convergence_actions(&kind, ConvergeAction::Update.as_str());
            Ok(Converged::Updated(updated))
        }
    }
}
