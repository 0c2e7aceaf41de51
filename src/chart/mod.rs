//! # Chart
//!
//! Installs, verifies and removes the module chart that a `Serverless`
//! resource asks for.
//!
//! The chart is a directory holding `Chart.yaml` and pre-rendered manifests
//! under `manifests/`. Manifests may reference release flags as `${flag}`.

pub mod cache;
pub mod installer;
pub mod render;

pub use cache::ManifestCache;
pub use installer::ManifestInstaller;

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::PathBuf;
use thiserror::Error;

/// Release name of the module chart
pub const RELEASE_NAME: &str = "serverless";

#[derive(Debug, Error)]
pub enum ChartError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid manifest {file}: {message}")]
    Manifest { file: String, message: String },

    #[error("manifest {file} references unknown flag {flag}")]
    MissingFlag { file: String, flag: String },

    #[error("failed to resolve kind {kind}: {message}")]
    Discovery { kind: String, message: String },

    #[error("failed to apply {kind} {name}: {message}")]
    Apply {
        kind: String,
        name: String,
        message: String,
    },

    #[error("failed to delete {kind} {name}: {message}")]
    Delete {
        kind: String,
        name: String,
        message: String,
    },
}

/// One installation of the chart
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartRelease {
    pub chart_path: PathBuf,
    pub name: String,
    pub namespace: String,
    pub flags: BTreeMap<String, String>,
}

impl ChartRelease {
    pub fn new(chart_path: impl Into<PathBuf>, namespace: impl Into<String>) -> Self {
        Self {
            chart_path: chart_path.into(),
            name: RELEASE_NAME.to_string(),
            namespace: namespace.into(),
            flags: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_flag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.flags.insert(key.into(), value.into());
        self
    }

    /// Cache key of the rendered manifests
    pub fn cache_key(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }
}

/// Outcome of checking installed resources
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verification {
    Ready,
    /// Still converging
    Pending,
    /// Serving, but degraded
    Warning(String),
    Failed(String),
}

/// Installs and removes a chart release
#[async_trait]
pub trait ChartInstaller: Send + Sync {
    async fn install(&self, release: &ChartRelease) -> Result<(), ChartError>;

    /// Check the installed workloads; never fails, problems become `Failed`
    async fn verify(&self, release: &ChartRelease) -> Verification;

    /// Remove every object of the release; objects already gone are fine
    async fn uninstall(&self, release: &ChartRelease) -> Result<(), ChartError>;
}
