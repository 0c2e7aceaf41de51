//! Shared fixtures for unit tests.

use crate::crd::{Function, FunctionSpec, InlineSource, Runtime, Serverless, ServerlessSpec, Source};
use k8s_openapi::api::apps::v1::{Deployment, DeploymentStrategy};

pub const NAMESPACE: &str = "default";

pub fn function_spec(runtime: Runtime) -> FunctionSpec {
    FunctionSpec {
        runtime,
        runtime_image_override: None,
        source: Source {
            inline: InlineSource {
                source: "module.exports = { main: function(event, context) { return 'hi' } }"
                    .to_string(),
                dependencies: None,
            },
        },
        replicas: None,
        resource_configuration: None,
        env: Vec::new(),
        secret_mounts: Vec::new(),
        labels: Default::default(),
    }
}

/// A nodejs20 Function with identity metadata filled in
pub fn function(name: &str) -> Function {
    let mut f = Function::new(name, function_spec(Runtime::Nodejs20));
    f.metadata.namespace = Some(NAMESPACE.to_string());
    f.metadata.uid = Some(format!("uid-{name}"));
    f.metadata.generation = Some(1);
    f
}

pub fn serverless(name: &str) -> Serverless {
    let mut s = Serverless::new(name, ServerlessSpec::default());
    s.metadata.namespace = Some("kyma-system".to_string());
    s.metadata.uid = Some(format!("uid-{name}"));
    s.metadata.generation = Some(1);
    s
}

/// `d` the way the API server hands it back after a write
///
/// Empty env values are omitted and pod, container and deployment defaults
/// are filled in. Quantities are left alone; callers set canonical forms.
pub fn server_shaped(mut d: Deployment) -> Deployment {
    d.metadata.resource_version = Some("7".to_string());
    d.metadata.generation = Some(1);

    let Some(spec) = d.spec.as_mut() else {
        return d;
    };
    spec.revision_history_limit = Some(10);
    spec.progress_deadline_seconds = Some(600);
    spec.strategy = Some(DeploymentStrategy {
        type_: Some("RollingUpdate".to_string()),
        ..Default::default()
    });

    let Some(pod) = spec.template.spec.as_mut() else {
        return d;
    };
    pod.dns_policy = Some("ClusterFirst".to_string());
    pod.restart_policy = Some("Always".to_string());
    pod.scheduler_name = Some("default-scheduler".to_string());
    pod.termination_grace_period_seconds = Some(30);
    pod.security_context = Some(Default::default());

    for container in &mut pod.containers {
        container.termination_message_path = Some("/dev/termination-log".to_string());
        container.termination_message_policy = Some("File".to_string());
        container.image_pull_policy = Some("IfNotPresent".to_string());
        for port in container.ports.iter_mut().flatten() {
            port.protocol.get_or_insert_with(|| "TCP".to_string());
        }
        for env in container.env.iter_mut().flatten() {
            if env.value.as_deref() == Some("") {
                env.value = None;
            }
        }
    }
    d
}
