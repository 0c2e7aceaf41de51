//! # Desired State
//!
//! Pure builders turning a [`Function`](crate::crd::Function) into the
//! Deployment and Service it should run as. The same spec and configuration
//! always produce the same objects, which is what makes drift detection in
//! [`crate::controller::convergence`] meaningful.

pub mod deployment;
pub mod quantity;
pub mod service;

pub use deployment::build_deployment;
pub use service::build_service;

use std::collections::BTreeMap;

pub const FUNCTION_NAME_LABEL: &str = "serverless.kyma-project.io/function-name";

/// Port the function runtime listens on
pub const FUNCTION_PORT: i32 = 80;

/// Labels identifying the pods of a function; also used as selector
pub fn function_labels(name: &str) -> BTreeMap<String, String> {
    BTreeMap::from([
        ("app".to_string(), name.to_string()),
        (FUNCTION_NAME_LABEL.to_string(), name.to_string()),
    ])
}

/// `key=value` selector string for a label set
pub fn selector_string(labels: &BTreeMap<String, String>) -> String {
    labels
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(",")
}
