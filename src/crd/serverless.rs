//! # Serverless
//!
//! Installer resource for the module chart that backs Functions.
//! One Serverless resource drives install, verification and removal of the
//! chart in its namespace.

use super::condition::{conditions_identical, Condition, ConditionedStatus, State};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Serverless Custom Resource Definition
///
/// # Example
///
/// ```yaml
/// apiVersion: operator.kyma-project.io/v1alpha1
/// kind: Serverless
/// metadata:
///   name: default
///   namespace: kyma-system
/// spec:
///   eventing:
///     endpoint: http://publisher.example.svc/publish
///   dockerRegistry:
///     enableInternal: true
/// ```
#[derive(CustomResource, Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
#[kube(
    kind = "Serverless",
    group = "operator.kyma-project.io",
    version = "v1alpha1",
    namespaced,
    status = "ServerlessStatus",
    printcolumn = r#"{"name":"State", "type":"string", "jsonPath":".status.state"}, {"name":"Installed", "type":"string", "jsonPath":".status.conditions[?(@.type==\"Installed\")].status"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ServerlessSpec {
    /// Publisher proxy used by functions to emit events
    #[serde(default)]
    pub eventing: Option<Endpoint>,
    /// Trace collector used by function runtimes
    #[serde(default)]
    pub tracing: Option<Endpoint>,
    #[serde(default)]
    pub docker_registry: Option<DockerRegistry>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
pub struct Endpoint {
    pub endpoint: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DockerRegistry {
    /// Use the in-cluster registry shipped with the chart
    #[serde(default)]
    pub enable_internal: Option<bool>,
    /// Secret holding credentials of an external registry
    #[serde(default)]
    pub secret_name: Option<String>,
}

/// Status of the Serverless resource
#[derive(Debug, Clone, Deserialize, Serialize, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ServerlessStatus {
    #[serde(default)]
    pub state: Option<State>,
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default)]
    pub eventing_endpoint: Option<String>,
    #[serde(default)]
    pub tracing_endpoint: Option<String>,
    /// `internal` or the name of the external registry secret
    #[serde(default)]
    pub docker_registry: Option<String>,
    #[serde(default)]
    pub observed_generation: Option<i64>,
}

impl ConditionedStatus for ServerlessStatus {
    fn state(&self) -> Option<State> {
        self.state
    }

    fn set_state(&mut self, state: State) {
        self.state = Some(state);
    }

    fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    fn conditions_mut(&mut self) -> &mut Vec<Condition> {
        &mut self.conditions
    }

    fn differs_from(&self, other: &Self) -> bool {
        self.state != other.state
            || !conditions_identical(&self.conditions, &other.conditions)
            || self.eventing_endpoint != other.eventing_endpoint
            || self.tracing_endpoint != other.tracing_endpoint
            || self.docker_registry != other.docker_registry
            || self.observed_generation != other.observed_generation
    }
}

/// Condition types reported on a Serverless resource
pub mod condition_types {
    pub const CONFIGURED: &str = "Configured";
    pub const INSTALLED: &str = "Installed";
    pub const DELETED: &str = "Deleted";
}

/// Condition reasons reported on a Serverless resource
pub mod reasons {
    pub const CONFIGURED: &str = "Configured";
    pub const INSTALLATION: &str = "Installation";
    pub const INSTALLED: &str = "Installed";
    pub const INSTALLATION_ERR: &str = "InstallationErr";
    pub const DELETION: &str = "Deletion";
    pub const DELETED: &str = "Deleted";
    pub const DELETION_ERR: &str = "DeletionErr";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_spec_deserializes() {
        let spec: ServerlessSpec = serde_json::from_value(serde_json::json!({})).unwrap();
        assert!(spec.eventing.is_none());
        assert!(spec.tracing.is_none());
        assert!(spec.docker_registry.is_none());
    }

    #[test]
    fn test_status_differs_on_endpoint() {
        let a = ServerlessStatus::default();
        let mut b = a.clone();
        b.tracing_endpoint = Some("http://collector".to_string());
        assert!(b.differs_from(&a));
        assert!(!a.differs_from(&a.clone()));
    }
}
