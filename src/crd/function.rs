//! # Function
//!
//! A serverless workload definition: inline source plus runtime selection.
//! The controller turns each Function into a Deployment and a Service.

use super::condition::{conditions_identical, Condition, ConditionedStatus, State};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Function Custom Resource Definition
///
/// # Example
///
/// ```yaml
/// apiVersion: serverless.kyma-project.io/v1alpha2
/// kind: Function
/// metadata:
///   name: hello
///   namespace: default
/// spec:
///   runtime: nodejs20
///   replicas: 2
///   source:
///     inline:
///       source: |
///         module.exports = { main: function(event, context) { return "hello" } }
/// ```
#[derive(CustomResource, Debug, Clone, Deserialize, Serialize, JsonSchema)]
#[kube(
    kind = "Function",
    group = "serverless.kyma-project.io",
    version = "v1alpha2",
    namespaced,
    status = "FunctionStatus",
    shortname = "fn",
    printcolumn = r#"{"name":"State", "type":"string", "jsonPath":".status.state"}, {"name":"Runtime", "type":"string", "jsonPath":".spec.runtime"}, {"name":"Running", "type":"string", "jsonPath":".status.conditions[?(@.type==\"Running\")].status"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct FunctionSpec {
    pub runtime: Runtime,
    /// Image used instead of the configured runtime image
    #[serde(default)]
    pub runtime_image_override: Option<String>,
    pub source: Source,
    /// Desired replica count (defaults to 1)
    #[serde(default)]
    pub replicas: Option<i32>,
    #[serde(default)]
    pub resource_configuration: Option<ResourceConfiguration>,
    /// Extra environment variables for the function container
    #[serde(default)]
    pub env: Vec<EnvVar>,
    /// Secrets mounted read-only into the function container
    #[serde(default)]
    pub secret_mounts: Vec<SecretMount>,
    /// Labels added to the function pods
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize, JsonSchema)]
pub enum Runtime {
    #[serde(rename = "nodejs20")]
    Nodejs20,
    #[serde(rename = "python312")]
    Python312,
}

impl fmt::Display for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Runtime::Nodejs20 => f.write_str("nodejs20"),
            Runtime::Python312 => f.write_str("python312"),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct Source {
    pub inline: InlineSource,
}

#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct InlineSource {
    pub source: String,
    /// package.json or requirements.txt content
    #[serde(default)]
    pub dependencies: Option<String>,
}

impl InlineSource {
    /// Dependencies, treating blank content as absent
    pub fn dependencies(&self) -> Option<&str> {
        self.dependencies
            .as_deref()
            .filter(|deps| !deps.trim().is_empty())
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
pub struct ResourceConfiguration {
    #[serde(default)]
    pub function: Option<FunctionResources>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
pub struct FunctionResources {
    #[serde(default)]
    pub resources: Option<ResourceRequirements>,
}

/// Compute resources as Kubernetes quantity strings
#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
pub struct ResourceRequirements {
    #[serde(default)]
    pub limits: BTreeMap<String, String>,
    #[serde(default)]
    pub requests: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct EnvVar {
    pub name: String,
    #[serde(default)]
    pub value: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SecretMount {
    pub secret_name: String,
    pub mount_path: String,
}

impl FunctionSpec {
    pub fn resources(&self) -> Option<&ResourceRequirements> {
        self.resource_configuration
            .as_ref()
            .and_then(|rc| rc.function.as_ref())
            .and_then(|f| f.resources.as_ref())
    }
}

/// Status of the Function resource
#[derive(Debug, Clone, Deserialize, Serialize, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FunctionStatus {
    #[serde(default)]
    pub state: Option<State>,
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default)]
    pub runtime: Option<Runtime>,
    /// Image the Deployment runs
    #[serde(default)]
    pub runtime_image: Option<String>,
    #[serde(default)]
    pub replicas: Option<i32>,
    /// Label selector of the function pods, as a string
    #[serde(default)]
    pub pod_selector: Option<String>,
    #[serde(default)]
    pub observed_generation: Option<i64>,
}

impl ConditionedStatus for FunctionStatus {
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
            || self.runtime != other.runtime
            || self.runtime_image != other.runtime_image
            || self.replicas != other.replicas
            || self.pod_selector != other.pod_selector
            || self.observed_generation != other.observed_generation
    }
}

/// Condition types reported on a Function
pub mod condition_types {
    pub const CONFIGURATION_READY: &str = "ConfigurationReady";
    pub const RUNNING: &str = "Running";
}

/// Condition reasons reported on a Function
pub mod reasons {
    pub const FUNCTION_SPEC_VALID: &str = "FunctionSpecValid";
    pub const INVALID_FUNCTION_SPEC: &str = "InvalidFunctionSpec";
    pub const DEPLOYMENT_CREATED: &str = "DeploymentCreated";
    pub const DEPLOYMENT_UPDATED: &str = "DeploymentUpdated";
    pub const DEPLOYMENT_FAILED: &str = "DeploymentFailed";
    pub const DEPLOYMENT_READY: &str = "DeploymentReady";
    pub const SERVICE_FAILED: &str = "ServiceFailed";
}
