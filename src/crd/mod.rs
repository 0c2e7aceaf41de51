//! # Custom Resource Definitions
//!
//! CRD types reconciled by the operator:
//!
//! - [`Function`] - a serverless workload, converged into a Deployment and a Service
//! - [`Serverless`] - installer resource for the module chart
//!
//! Both share the condition/state vocabulary in [`condition`].

pub mod condition;
pub mod function;
pub mod serverless;

pub use condition::{Condition, ConditionStatus, ConditionedStatus, State};
pub use function::{
    EnvVar, Function, FunctionResources, FunctionSpec, FunctionStatus, InlineSource,
    ResourceConfiguration, ResourceRequirements, Runtime, SecretMount, Source,
};
pub use serverless::{DockerRegistry, Endpoint, Serverless, ServerlessSpec, ServerlessStatus};
