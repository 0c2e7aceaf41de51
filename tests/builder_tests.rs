//! # Function Workload Tests
//!
//! Tests for turning a Function into its Deployment and Service, and for the
//! drift check that decides whether a live object is rewritten.
//!
//! These tests verify:
//! - Runtime specific container layout
//! - Pod labels and selectors
//! - Spec validation messages
//! - Drift detection on owned fields only

use serde_json::json;
use serverless_operator::config::FunctionConfig;
use serverless_operator::controller::convergence::deployment::deployment_changed;
use serverless_operator::controller::convergence::service::service_changed;
use serverless_operator::controller::function::validation::validate_function;
use serverless_operator::crd::Function;
use serverless_operator::resources::{build_deployment, build_service, selector_string};

fn function(spec: serde_json::Value) -> Function {
    serde_json::from_value(json!({
        "apiVersion": "serverless.kyma-project.io/v1alpha2",
        "kind": "Function",
        "metadata": { "name": "orders", "namespace": "shop", "uid": "uid-orders", "generation": 1 },
        "spec": spec
    }))
    .unwrap()
}

fn python_function() -> Function {
    function(json!({
        "runtime": "python312",
        "replicas": 3,
        "source": { "inline": { "source": "def main(event, context):\n    return 'ok'" } },
        "env": [{ "name": "LOG_LEVEL", "value": "debug" }],
        "labels": { "team": "checkout" }
    }))
}

fn config() -> FunctionConfig {
    FunctionConfig {
        nodejs20_image: "registry.local/nodejs20:1.0".to_string(),
        python312_image: "registry.local/python312:1.0".to_string(),
        ..FunctionConfig::default()
    }
}

#[test]
fn test_python_deployment_layout() {
    let deployment = build_deployment(&python_function(), &config());

    assert_eq!(deployment.metadata.name.as_deref(), Some("orders"));
    assert_eq!(deployment.metadata.namespace.as_deref(), Some("shop"));
    let spec = deployment.spec.unwrap();
    assert_eq!(spec.replicas, Some(3));

    let pod_labels = spec.template.metadata.unwrap().labels.unwrap();
    assert_eq!(pod_labels.get("team").map(String::as_str), Some("checkout"));
    assert_eq!(pod_labels.get("app").map(String::as_str), Some("orders"));

    let container = &spec.template.spec.unwrap().containers[0];
    assert_eq!(container.image.as_deref(), Some("registry.local/python312:1.0"));
    assert_eq!(container.working_dir.as_deref(), Some("/kubeless"));
    let env: Vec<&str> = container
        .env
        .as_ref()
        .unwrap()
        .iter()
        .map(|e| e.name.as_str())
        .collect();
    assert_eq!(
        env,
        vec![
            "FUNC_HANDLER_SOURCE",
            "FUNC_HANDLER_DEPENDENCIES",
            "MOD_NAME",
            "FUNC_HANDLER",
            "LOG_LEVEL"
        ]
    );
}

#[test]
fn test_service_selects_function_pods() {
    let f = python_function();
    let service = build_service(&f);
    let deployment = build_deployment(&f, &config());

    let selector = service.spec.unwrap().selector.unwrap();
    let match_labels = deployment.spec.unwrap().selector.match_labels.unwrap();
    assert_eq!(selector, match_labels);
    assert_eq!(
        selector_string(&selector),
        "app=orders,serverless.kyma-project.io/function-name=orders"
    );
}

#[test]
fn test_builders_are_deterministic() {
    let f = python_function();
    assert!(!deployment_changed(
        &build_deployment(&f, &config()),
        &build_deployment(&f, &config())
    ));
    assert!(!service_changed(&build_service(&f), &build_service(&f)));
}

#[test]
fn test_image_change_is_drift() {
    let f = python_function();
    let live = build_deployment(&f, &config());
    let mut newer = config();
    newer.python312_image = "registry.local/python312:1.1".to_string();

    assert!(deployment_changed(&live, &build_deployment(&f, &newer)));
}

#[test]
fn test_server_defaults_are_not_drift() {
    let f = python_function();
    let desired = build_deployment(&f, &config());
    let mut live = desired.clone();
    let spec = live.spec.as_mut().unwrap();
    spec.revision_history_limit = Some(10);
    spec.progress_deadline_seconds = Some(600);
    live.metadata.resource_version = Some("42".to_string());

    assert!(!deployment_changed(&live, &desired));
}

#[test]
fn test_valid_function_has_no_problems() {
    assert!(validate_function(&python_function(), &config()).is_empty());
}

#[test]
fn test_validation_reports_every_problem() {
    let f = function(json!({
        "runtime": "nodejs20",
        "replicas": -1,
        "source": { "inline": { "source": "  " } },
        "env": [{ "name": "FUNC_HANDLER", "value": "x" }],
        "secretMounts": [{ "secretName": "creds", "mountPath": "relative/path" }],
        "resourceConfiguration": { "function": { "resources": { "limits": { "memory": "lots" } } } }
    }));

    let problems = validate_function(&f, &config());

    assert_eq!(
        problems,
        vec![
            "source.inline.source must not be empty".to_string(),
            "replicas must not be negative, got -1".to_string(),
            "env name FUNC_HANDLER is reserved".to_string(),
            "secretMounts.mountPath \"relative/path\" must be an absolute path".to_string(),
            "resources.limits.memory has invalid quantity \"lots\"".to_string(),
        ]
    );
}
