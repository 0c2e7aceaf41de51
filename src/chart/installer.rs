//! # Manifest Installer
//!
//! [`ChartInstaller`] that server-side applies the rendered manifests.

use super::cache::ManifestCache;
use super::render::{chart_version, render};
use super::{ChartError, ChartInstaller, ChartRelease, Verification};
use crate::constants::CONTROLLER_NAME;
use crate::controller::convergence::deployment::{rollout_status, Rollout};
use crate::observability::metrics;
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use kube::api::{Api, DeleteParams, DynamicObject, GroupVersionKind, Patch, PatchParams};
use kube::discovery::{pinned_kind, Scope};
use kube::{Client, ResourceExt};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

pub struct ManifestInstaller {
    client: Client,
    cache: ManifestCache,
}

impl std::fmt::Debug for ManifestInstaller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManifestInstaller")
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

fn gvk_of(obj: &DynamicObject) -> Option<GroupVersionKind> {
    let types = obj.types.as_ref()?;
    let (group, version) = types
        .api_version
        .split_once('/')
        .unwrap_or(("", types.api_version.as_str()));
    Some(GroupVersionKind::gvk(group, version, &types.kind))
}

fn kind_of(obj: &DynamicObject) -> String {
    obj.types
        .as_ref()
        .map(|t| t.kind.clone())
        .unwrap_or_default()
}

/// Overall verification of the chart's Deployments
pub fn classify_deployments(deployments: &[Deployment]) -> Verification {
    let mut degraded = Vec::new();
    for deployment in deployments {
        let name = deployment.name_any();
        match rollout_status(deployment) {
            Rollout::Failed(message) => {
                return Verification::Failed(format!("deployment {name} failed: {message}"));
            }
            Rollout::InProgress => {
                let status = deployment.status.as_ref();
                let desired = deployment.spec.as_ref().and_then(|s| s.replicas).unwrap_or(1);
                let updated = status.and_then(|s| s.updated_replicas).unwrap_or(0);
                let ready = status.and_then(|s| s.ready_replicas).unwrap_or(0);
                let observed = status.and_then(|s| s.observed_generation)
                    >= deployment.metadata.generation;
                if observed && updated == desired && ready > 0 && ready < desired {
                    degraded.push(format!("deployment {name} has {ready}/{desired} replicas ready"));
                } else {
                    return Verification::Pending;
                }
            }
            Rollout::Ready => {}
        }
    }
    if degraded.is_empty() {
        Verification::Ready
    } else {
        Verification::Warning(degraded.join(", "))
    }
}

impl ManifestInstaller {
    pub fn new(client: Client, cache: ManifestCache) -> Self {
        Self { client, cache }
    }

    /// Rendered objects for `release`, from the cache when still valid
    fn objects(&self, release: &ChartRelease) -> Result<Arc<Vec<DynamicObject>>, ChartError> {
        let key = release.cache_key();
        let version = chart_version(&release.chart_path)?;
        if let Some(objects) = self.cache.get(&key, &version, &release.flags) {
            debug!(release = %key, version = %version, "using cached manifests");
            return Ok(objects);
        }
        let objects = render(release)?;
        info!(release = %key, version = %version, objects = objects.len(), "rendered chart manifests");
        Ok(self.cache.set(&key, &version, &release.flags, objects))
    }

    async fn api_for(
        &self,
        obj: &DynamicObject,
        release: &ChartRelease,
    ) -> Result<Api<DynamicObject>, ChartError> {
        let kind = kind_of(obj);
        let gvk = gvk_of(obj).ok_or_else(|| ChartError::Discovery {
            kind: kind.clone(),
            message: "object has no apiVersion/kind".to_string(),
        })?;
        let (resource, caps) = pinned_kind(&self.client, &gvk)
            .await
            .map_err(|e| ChartError::Discovery {
                kind,
                message: e.to_string(),
            })?;
        Ok(match caps.scope {
            Scope::Namespaced => {
                let namespace = obj.namespace().unwrap_or_else(|| release.namespace.clone());
                Api::namespaced_with(self.client.clone(), &namespace, &resource)
            }
            Scope::Cluster => Api::all_with(self.client.clone(), &resource),
        })
    }

    async fn apply_all(&self, release: &ChartRelease) -> Result<(), ChartError> {
        let params = PatchParams::apply(CONTROLLER_NAME).force();
        for obj in self.objects(release)?.iter() {
            let name = obj.name_any();
            let api = self.api_for(obj, release).await?;
            api.patch(&name, &params, &Patch::Apply(obj))
                .await
                .map_err(|e| ChartError::Apply {
                    kind: kind_of(obj),
                    name: name.clone(),
                    message: e.to_string(),
                })?;
            debug!(kind = %kind_of(obj), name = %name, "applied");
        }
        Ok(())
    }

    async fn delete_all(&self, release: &ChartRelease) -> Result<(), ChartError> {
        let objects = match self.cache.last(&release.cache_key()) {
            Some(objects) => objects,
            None => Arc::new(render(release)?),
        };
        for obj in objects.iter().rev() {
            let name = obj.name_any();
            let api = self.api_for(obj, release).await?;
            match api.delete(&name, &DeleteParams::background()).await {
                Ok(_) => debug!(kind = %kind_of(obj), name = %name, "deleted"),
                Err(kube::Error::Api(e)) if e.code == 404 => {}
                Err(e) => {
                    return Err(ChartError::Delete {
                        kind: kind_of(obj),
                        name,
                        message: e.to_string(),
                    })
                }
            }
        }
        self.cache.remove(&release.cache_key());
        Ok(())
    }

    async fn live_deployments(&self, release: &ChartRelease) -> Result<Vec<Deployment>, String> {
        let objects = self.objects(release).map_err(|e| e.to_string())?;
        let mut live = Vec::new();
        for obj in objects.iter().filter(|o| kind_of(o) == "Deployment") {
            let namespace = obj.namespace().unwrap_or_else(|| release.namespace.clone());
            let api: Api<Deployment> = Api::namespaced(self.client.clone(), &namespace);
            match api.get_opt(&obj.name_any()).await {
                Ok(Some(deployment)) => live.push(deployment),
                Ok(None) => {
                    return Err(format!("deployment {namespace}/{} not found", obj.name_any()))
                }
                Err(e) => return Err(e.to_string()),
            }
        }
        Ok(live)
    }
}

#[async_trait]
impl ChartInstaller for ManifestInstaller {
    async fn install(&self, release: &ChartRelease) -> Result<(), ChartError> {
        let started = Instant::now();
        let result = self.apply_all(release).await;
        metrics::record_chart_operation("install", result.is_ok(), started.elapsed().as_secs_f64());
        result
    }

    async fn verify(&self, release: &ChartRelease) -> Verification {
        match self.live_deployments(release).await {
            Ok(deployments) => classify_deployments(&deployments),
            Err(message) => {
                warn!(release = %release.cache_key(), error = %message, "verification failed");
                Verification::Failed(message)
            }
        }
    }

    async fn uninstall(&self, release: &ChartRelease) -> Result<(), ChartError> {
        let started = Instant::now();
        let result = self.delete_all(release).await;
        metrics::record_chart_operation("uninstall", result.is_ok(), started.elapsed().as_secs_f64());
        result
    }
}
