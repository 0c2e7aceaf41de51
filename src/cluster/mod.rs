//! # Cluster Store
//!
//! Read/write access to namespaced objects, abstracted behind [`ObjectStore`]
//! so the state machine and convergence logic can run against the API server
//! or an in-memory double.
//!
//! Absence is reported as [`StoreError::NotFound`] and is expected to be
//! branched on. Writes carry `metadata.resourceVersion`, so a stale write
//! fails with [`StoreError::Conflict`].

mod kube_store;
#[cfg(test)]
pub mod memory;

pub use kube_store::KubeStore;

use async_trait::async_trait;
use kube::Resource;
use std::fmt;
use thiserror::Error;

/// Namespace and name of an object
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectKey {
    pub namespace: String,
    pub name: String,
}

impl ObjectKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Key of an existing object, if it carries a name and namespace
    pub fn of<K: Resource>(obj: &K) -> Option<Self> {
        let meta = obj.meta();
        Some(Self::new(meta.namespace.clone()?, meta.name.clone()?))
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Errors returned by an [`ObjectStore`]
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("{kind} {key} not found")]
    NotFound { kind: String, key: String },

    #[error("conflict writing {kind} {key}: {message}")]
    Conflict {
        kind: String,
        key: String,
        message: String,
    },

    #[error("API error {code}: {message}")]
    Api { code: u16, message: String },

    #[error("object is missing {0}")]
    InvalidObject(&'static str),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("transport error: {0}")]
    Transport(String),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }

    /// Map a kube client error, keeping 404 and 409 distinguishable
    pub fn from_kube(err: kube::Error, kind: &str, key: &str) -> Self {
        match err {
            kube::Error::Api(api_err) if api_err.code == 404 => StoreError::NotFound {
                kind: kind.to_string(),
                key: key.to_string(),
            },
            kube::Error::Api(api_err) if api_err.code == 409 => StoreError::Conflict {
                kind: kind.to_string(),
                key: key.to_string(),
                message: api_err.message.clone(),
            },
            kube::Error::Api(api_err) => StoreError::Api {
                code: api_err.code,
                message: api_err.message.clone(),
            },
            other => StoreError::Transport(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

/// Access to one kind of namespaced object
///
/// Every write returns the object as stored, including its new
/// `resourceVersion`.
#[async_trait]
pub trait ObjectStore<K>: Send + Sync {
    async fn get(&self, key: &ObjectKey) -> Result<K, StoreError>;

    async fn create(&self, obj: &K) -> Result<K, StoreError>;

    /// Replace the whole object
    async fn update(&self, obj: &K) -> Result<K, StoreError>;

    /// Write only the status subresource
    async fn update_status(&self, obj: &K) -> Result<K, StoreError>;
}
