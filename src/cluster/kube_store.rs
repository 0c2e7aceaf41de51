//! API-server backed [`ObjectStore`].

use super::{ObjectKey, ObjectStore, StoreError};
use crate::constants::CONTROLLER_NAME;
use async_trait::async_trait;
use kube::api::{Api, Patch, PatchParams, PostParams};
use kube::{Client, Resource};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;
use std::marker::PhantomData;
use tracing::debug;

/// Real Kubernetes store for one namespaced kind
pub struct KubeStore<K> {
    client: Client,
    _kind: PhantomData<fn() -> K>,
}

impl<K> KubeStore<K> {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            _kind: PhantomData,
        }
    }
}

impl<K> Debug for KubeStore<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeStore").finish_non_exhaustive()
    }
}

impl<K> KubeStore<K>
where
    K: Resource<Scope = k8s_openapi::NamespaceResourceScope, DynamicType = ()>
        + Clone
        + DeserializeOwned
        + Serialize
        + Debug,
{
    fn api(&self, namespace: &str) -> Api<K> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn key_of(obj: &K) -> Result<ObjectKey, StoreError> {
        let meta = obj.meta();
        let name = meta.name.clone().ok_or(StoreError::InvalidObject("metadata.name"))?;
        let namespace = meta
            .namespace
            .clone()
            .ok_or(StoreError::InvalidObject("metadata.namespace"))?;
        Ok(ObjectKey::new(namespace, name))
    }

    fn map_err(err: kube::Error, key: &ObjectKey) -> StoreError {
        StoreError::from_kube(err, &K::kind(&()), &key.to_string())
    }
}

#[async_trait]
impl<K> ObjectStore<K> for KubeStore<K>
where
    K: Resource<Scope = k8s_openapi::NamespaceResourceScope, DynamicType = ()>
        + Clone
        + DeserializeOwned
        + Serialize
        + Debug
        + Send
        + Sync
        + 'static,
{
    async fn get(&self, key: &ObjectKey) -> Result<K, StoreError> {
        self.api(&key.namespace)
            .get(&key.name)
            .await
            .map_err(|e| Self::map_err(e, key))
    }

    async fn create(&self, obj: &K) -> Result<K, StoreError> {
        let key = Self::key_of(obj)?;
        debug!(kind = %K::kind(&()), object = %key, "creating object");
        let pp = PostParams {
            field_manager: Some(CONTROLLER_NAME.to_string()),
            ..PostParams::default()
        };
        self.api(&key.namespace)
            .create(&pp, obj)
            .await
            .map_err(|e| Self::map_err(e, &key))
    }

    async fn update(&self, obj: &K) -> Result<K, StoreError> {
        let key = Self::key_of(obj)?;
        debug!(kind = %K::kind(&()), object = %key, "replacing object");
        let pp = PostParams {
            field_manager: Some(CONTROLLER_NAME.to_string()),
            ..PostParams::default()
        };
        self.api(&key.namespace)
            .replace(&key.name, &pp, obj)
            .await
            .map_err(|e| Self::map_err(e, &key))
    }

    async fn update_status(&self, obj: &K) -> Result<K, StoreError> {
        let key = Self::key_of(obj)?;
        let value = serde_json::to_value(obj)?;
        // resourceVersion in a merge patch makes the API server reject stale writes
        let patch = serde_json::json!({
            "metadata": { "resourceVersion": obj.meta().resource_version },
            "status": value.get("status").cloned().unwrap_or(serde_json::Value::Null),
        });
        debug!(kind = %K::kind(&()), object = %key, "patching status");
        self.api(&key.namespace)
            .patch_status(
                &key.name,
                &PatchParams::apply(CONTROLLER_NAME),
                &Patch::Merge(&patch),
            )
            .await
            .map_err(|e| Self::map_err(e, &key))
    }
}
