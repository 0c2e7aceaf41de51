//! In-memory [`ObjectStore`] for tests.
//!
//! Assigns increasing resource versions, rejects stale writes and lets a test
//! inject a failure for the next call of an operation.

use super::{ObjectKey, ObjectStore, StoreError};
use async_trait::async_trait;
use kube::Resource;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Get,
    Create,
    Update,
    UpdateStatus,
}

#[derive(Debug)]
pub struct InMemoryStore<K> {
    objects: Mutex<BTreeMap<ObjectKey, K>>,
    version: AtomicU64,
    failures: Mutex<HashMap<Operation, StoreError>>,
    calls: Mutex<HashMap<Operation, usize>>,
}

impl<K> Default for InMemoryStore<K> {
    fn default() -> Self {
        Self {
            objects: Mutex::new(BTreeMap::new()),
            version: AtomicU64::new(0),
            failures: Mutex::new(HashMap::new()),
            calls: Mutex::new(HashMap::new()),
        }
    }
}

impl<K> InMemoryStore<K>
where
    K: Resource<DynamicType = ()> + Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an object, assigning it a fresh resource version
    pub fn insert(&self, mut obj: K) -> K {
        let key = ObjectKey::of(&obj).expect("seeded objects need a name and namespace");
        self.stamp(&mut obj);
        self.objects.lock().unwrap().insert(key, obj.clone());
        obj
    }

    pub fn object(&self, key: &ObjectKey) -> Option<K> {
        self.objects.lock().unwrap().get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.objects.lock().unwrap().len()
    }

    /// Make the next call of `op` fail with `err`
    pub fn fail_next(&self, op: Operation, err: StoreError) {
        self.failures.lock().unwrap().insert(op, err);
    }

    pub fn calls(&self, op: Operation) -> usize {
        self.calls.lock().unwrap().get(&op).copied().unwrap_or(0)
    }

    fn record(&self, op: Operation) -> Result<(), StoreError> {
        *self.calls.lock().unwrap().entry(op).or_insert(0) += 1;
        match self.failures.lock().unwrap().remove(&op) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn stamp(&self, obj: &mut K) {
        let version = self.version.fetch_add(1, Ordering::SeqCst) + 1;
        obj.meta_mut().resource_version = Some(version.to_string());
    }

    fn key(obj: &K) -> Result<ObjectKey, StoreError> {
        ObjectKey::of(obj).ok_or(StoreError::InvalidObject("metadata.name"))
    }

    fn replace(&self, obj: &K) -> Result<K, StoreError> {
        let key = Self::key(obj)?;
        let mut objects = self.objects.lock().unwrap();
        let stored = objects.get(&key).ok_or_else(|| StoreError::NotFound {
            kind: K::kind(&()).to_string(),
            key: key.to_string(),
        })?;
        let incoming = obj.meta().resource_version.as_deref();
        if incoming.is_some() && incoming != stored.meta().resource_version.as_deref() {
            return Err(StoreError::Conflict {
                kind: K::kind(&()).to_string(),
                key: key.to_string(),
                message: "the object has been modified".to_string(),
            });
        }
        let mut updated = obj.clone();
        self.stamp(&mut updated);
        objects.insert(key, updated.clone());
        Ok(updated)
    }
}

#[async_trait]
impl<K> ObjectStore<K> for InMemoryStore<K>
where
    K: Resource<DynamicType = ()> + Clone + Send + Sync + 'static,
{
    async fn get(&self, key: &ObjectKey) -> Result<K, StoreError> {
        self.record(Operation::Get)?;
        self.object(key).ok_or_else(|| StoreError::NotFound {
            kind: K::kind(&()).to_string(),
            key: key.to_string(),
        })
    }

    async fn create(&self, obj: &K) -> Result<K, StoreError> {
        self.record(Operation::Create)?;
        let key = Self::key(obj)?;
        let mut objects = self.objects.lock().unwrap();
        if objects.contains_key(&key) {
            return Err(StoreError::Conflict {
                kind: K::kind(&()).to_string(),
                key: key.to_string(),
                message: "already exists".to_string(),
            });
        }
        let mut created = obj.clone();
        self.stamp(&mut created);
        objects.insert(key, created.clone());
        Ok(created)
    }

    async fn update(&self, obj: &K) -> Result<K, StoreError> {
        self.record(Operation::Update)?;
        self.replace(obj)
    }

    async fn update_status(&self, obj: &K) -> Result<K, StoreError> {
        self.record(Operation::UpdateStatus)?;
        self.replace(obj)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::Service;

    fn service(name: &str) -> Service {
        let mut svc = Service::default();
        svc.metadata.name = Some(name.to_string());
        svc.metadata.namespace = Some("default".to_string());
        svc
    }

    #[tokio::test]
    async fn test_stale_update_conflicts() {
        let store = InMemoryStore::new();
        let first = store.insert(service("a"));
        let _second = store.update(&first).await.unwrap();
        let err = store.update(&first).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict { .. }));
    }

    #[tokio::test]
    async fn test_injected_failure_applies_once() {
        let store: InMemoryStore<Service> = InMemoryStore::new();
        store.fail_next(Operation::Get, StoreError::Transport("down".to_string()));
        let key = ObjectKey::new("default", "a");
        assert!(matches!(
            store.get(&key).await,
            Err(StoreError::Transport(_))
        ));
        assert!(store.get(&key).await.unwrap_err().is_not_found());
        assert_eq!(store.calls(Operation::Get), 2);
    }
}
