//! Deployment for a Function.

use super::{function_labels, FUNCTION_PORT};
use crate::config::FunctionConfig;
use crate::crd::{Function, Runtime};
use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
    Container, ContainerPort, EmptyDirVolumeSource, EnvVar, PodSpec, PodTemplateSpec,
    ResourceRequirements, SecretVolumeSource, Volume, VolumeMount,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use std::collections::BTreeMap;

const SOURCES_VOLUME: &str = "sources";
const LOCAL_VOLUME: &str = "local";
const LOCAL_MOUNT_PATH: &str = "/.local";
const SECRET_VOLUME_MODE: i32 = 0o666;

/// Environment variables the runtime reserves for itself
pub const RESERVED_ENV_NAMES: [&str; 4] = [
    "FUNC_HANDLER_SOURCE",
    "FUNC_HANDLER_DEPENDENCIES",
    "MOD_NAME",
    "FUNC_HANDLER",
];

/// Image the function runs, honouring the override
pub fn runtime_image(function: &Function, config: &FunctionConfig) -> String {
    function
        .spec
        .runtime_image_override
        .clone()
        .filter(|image| !image.is_empty())
        .unwrap_or_else(|| config.runtime_image(function.spec.runtime).to_string())
}

pub fn working_dir(runtime: Runtime) -> &'static str {
    match runtime {
        Runtime::Nodejs20 => "/usr/src/app/function",
        Runtime::Python312 => "/kubeless",
    }
}

/// Shell script that writes the sources and starts the runtime
pub fn runtime_command(runtime: Runtime, has_dependencies: bool) -> String {
    match (runtime, has_dependencies) {
        (Runtime::Nodejs20, true) => r#"printf "${FUNC_HANDLER_SOURCE}" > handler.js;
printf "${FUNC_HANDLER_DEPENDENCIES}" > package.json;
npm install --prefer-offline --no-audit --progress=false;
cd ..;
npm start;"#
            .to_string(),
        (Runtime::Nodejs20, false) => r#"printf "${FUNC_HANDLER_SOURCE}" > handler.js;
cd ..;
npm start;"#
            .to_string(),
        (Runtime::Python312, true) => r#"printf "${FUNC_HANDLER_SOURCE}" > handler.py;
printf "${FUNC_HANDLER_DEPENDENCIES}" > requirements.txt;
pip install --user --no-cache-dir -r /kubeless/requirements.txt;
cd ..;
python /kubeless.py;"#
            .to_string(),
        (Runtime::Python312, false) => r#"printf "${FUNC_HANDLER_SOURCE}" > handler.py;
cd ..;
python /kubeless.py;"#
            .to_string(),
    }
}

fn env_var(name: &str, value: &str) -> EnvVar {
    EnvVar {
        name: name.to_string(),
        value: Some(value.to_string()),
        ..EnvVar::default()
    }
}

fn build_env(function: &Function) -> Vec<EnvVar> {
    let inline = &function.spec.source.inline;
    let mut env = vec![
        env_var("FUNC_HANDLER_SOURCE", &inline.source),
        env_var(
            "FUNC_HANDLER_DEPENDENCIES",
            inline.dependencies().unwrap_or_default(),
        ),
    ];
    if function.spec.runtime == Runtime::Python312 {
        env.push(env_var("MOD_NAME", "handler"));
        env.push(env_var("FUNC_HANDLER", "main"));
    }
    env.extend(function.spec.env.iter().map(|e| EnvVar {
        name: e.name.clone(),
        value: e.value.clone(),
        ..EnvVar::default()
    }));
    env
}

fn build_resources(function: &Function) -> Option<ResourceRequirements> {
    let resources = function.spec.resources()?;
    let quantities = |m: &BTreeMap<String, String>| {
        (!m.is_empty()).then(|| {
            m.iter()
                .map(|(k, v)| (k.clone(), Quantity(v.clone())))
                .collect::<BTreeMap<_, _>>()
        })
    };
    Some(ResourceRequirements {
        limits: quantities(&resources.limits),
        requests: quantities(&resources.requests),
        ..ResourceRequirements::default()
    })
}

fn secret_volume_name(index: usize) -> String {
    format!("secret-{index}")
}

fn build_volumes(function: &Function) -> Vec<Volume> {
    let empty_dir = |name: &str| Volume {
        name: name.to_string(),
        empty_dir: Some(EmptyDirVolumeSource::default()),
        ..Volume::default()
    };
    let mut volumes = vec![empty_dir(SOURCES_VOLUME), empty_dir(LOCAL_VOLUME)];
    volumes.extend(
        function
            .spec
            .secret_mounts
            .iter()
            .enumerate()
            .map(|(i, mount)| Volume {
                name: secret_volume_name(i),
                secret: Some(SecretVolumeSource {
                    secret_name: Some(mount.secret_name.clone()),
                    default_mode: Some(SECRET_VOLUME_MODE),
                    optional: Some(false),
                    ..SecretVolumeSource::default()
                }),
                ..Volume::default()
            }),
    );
    volumes
}

fn build_volume_mounts(function: &Function) -> Vec<VolumeMount> {
    let mut mounts = vec![
        VolumeMount {
            name: SOURCES_VOLUME.to_string(),
            mount_path: working_dir(function.spec.runtime).to_string(),
            ..VolumeMount::default()
        },
        VolumeMount {
            name: LOCAL_VOLUME.to_string(),
            mount_path: LOCAL_MOUNT_PATH.to_string(),
            ..VolumeMount::default()
        },
    ];
    mounts.extend(
        function
            .spec
            .secret_mounts
            .iter()
            .enumerate()
            .map(|(i, mount)| VolumeMount {
                name: secret_volume_name(i),
                mount_path: mount.mount_path.clone(),
                read_only: Some(true),
                ..VolumeMount::default()
            }),
    );
    mounts
}

/// Desired Deployment for a Function
///
/// Named after the function, in its namespace, with one container running
/// the runtime image. The owner reference is added at creation time.
pub fn build_deployment(function: &Function, config: &FunctionConfig) -> Deployment {
    let name = function.metadata.name.clone().unwrap_or_default();
    let runtime = function.spec.runtime;
    let selector_labels = function_labels(&name);

    let mut pod_labels = function.spec.labels.clone();
    pod_labels.extend(selector_labels.clone());

    let container = Container {
        name: name.clone(),
        image: Some(runtime_image(function, config)),
        working_dir: Some(working_dir(runtime).to_string()),
        command: Some(vec![
            "sh".to_string(),
            "-c".to_string(),
            runtime_command(runtime, function.spec.source.inline.dependencies().is_some()),
        ]),
        env: Some(build_env(function)),
        resources: build_resources(function),
        volume_mounts: Some(build_volume_mounts(function)),
        ports: Some(vec![ContainerPort {
            container_port: FUNCTION_PORT,
            ..ContainerPort::default()
        }]),
        ..Container::default()
    };

    Deployment {
        metadata: ObjectMeta {
            name: Some(name),
            namespace: function.metadata.namespace.clone(),
            labels: Some(selector_labels.clone()),
            ..ObjectMeta::default()
        },
        spec: Some(DeploymentSpec {
            replicas: Some(function.spec.replicas.unwrap_or(1)),
            selector: LabelSelector {
                match_labels: Some(selector_labels),
                ..LabelSelector::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(pod_labels),
                    ..ObjectMeta::default()
                }),
                spec: Some(PodSpec {
                    containers: vec![container],
                    volumes: Some(build_volumes(function)),
                    ..PodSpec::default()
                }),
            },
            ..DeploymentSpec::default()
        }),
        status: None,
    }
}
