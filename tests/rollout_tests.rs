//! # Rollout Classification Tests
//!
//! Tests for reading Deployment status, used by the Function controller
//! to report `Running` and by the chart installer to verify workloads.

use k8s_openapi::api::apps::v1::Deployment;
use serde_json::json;
use serverless_operator::chart::installer::classify_deployments;
use serverless_operator::chart::Verification;
use serverless_operator::controller::convergence::deployment::{rollout_status, Rollout};

fn deployment(name: &str, replicas: i32, status: serde_json::Value) -> Deployment {
    serde_json::from_value(json!({
        "apiVersion": "apps/v1",
        "kind": "Deployment",
        "metadata": { "name": name, "namespace": "kyma-system", "generation": 2 },
        "spec": {
            "replicas": replicas,
            "selector": { "matchLabels": { "app": name } },
            "template": { "metadata": { "labels": { "app": name } } }
        },
        "status": status
    }))
    .unwrap()
}

fn available(replicas: i32, ready: i32) -> serde_json::Value {
    json!({
        "observedGeneration": 2,
        "replicas": replicas,
        "updatedReplicas": replicas,
        "readyReplicas": ready,
        "conditions": [
            { "type": "Available", "status": "True" },
            { "type": "Progressing", "status": "True", "reason": "NewReplicaSetAvailable" }
        ]
    })
}

#[test]
fn test_ready_deployment() {
    let d = deployment("hello", 2, available(2, 2));
    assert_eq!(rollout_status(&d), Rollout::Ready);
}

#[test]
fn test_status_of_previous_generation_is_in_progress() {
    let mut status = available(2, 2);
    status["observedGeneration"] = json!(1);
    let d = deployment("hello", 2, status);
    assert_eq!(rollout_status(&d), Rollout::InProgress);
}

#[test]
fn test_progress_deadline_fails() {
    let d = deployment(
        "hello",
        1,
        json!({
            "observedGeneration": 2,
            "replicas": 1,
            "updatedReplicas": 1,
            "conditions": [{
                "type": "Progressing",
                "status": "False",
                "reason": "ProgressDeadlineExceeded",
                "message": "ReplicaSet \"hello-5d4\" has timed out progressing."
            }]
        }),
    );
    assert_eq!(
        rollout_status(&d),
        Rollout::Failed("ReplicaSet \"hello-5d4\" has timed out progressing.".to_string())
    );
}

#[test]
fn test_all_chart_deployments_ready() {
    let deployments = vec![
        deployment("controller", 1, available(1, 1)),
        deployment("webhook", 2, available(2, 2)),
    ];
    assert_eq!(classify_deployments(&deployments), Verification::Ready);
}

#[test]
fn test_partially_ready_chart_is_warning() {
    let deployments = vec![
        deployment("controller", 1, available(1, 1)),
        deployment("webhook", 2, available(2, 1)),
    ];
    assert_eq!(
        classify_deployments(&deployments),
        Verification::Warning("deployment webhook has 1/2 replicas ready".to_string())
    );
}

#[test]
fn test_unobserved_chart_deployment_is_pending() {
    let deployments = vec![
        deployment("controller", 1, available(1, 1)),
        deployment("webhook", 1, json!({})),
    ];
    assert_eq!(classify_deployments(&deployments), Verification::Pending);
}

#[test]
fn test_failed_chart_deployment_wins() {
    let failed = json!({
        "observedGeneration": 2,
        "conditions": [{
            "type": "Progressing",
            "status": "False",
            "reason": "ProgressDeadlineExceeded",
            "message": "timed out"
        }]
    });
    let deployments = vec![
        deployment("controller", 2, available(2, 1)),
        deployment("webhook", 1, failed),
    ];
    assert_eq!(
        classify_deployments(&deployments),
        Verification::Failed("deployment webhook failed: timed out".to_string())
    );
}
