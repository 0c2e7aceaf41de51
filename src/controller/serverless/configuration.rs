//! Effective configuration of a Serverless resource and the chart release it
//! maps to.

use crate::chart::ChartRelease;
use crate::config::ControllerConfig;
use crate::constants::{DEFAULT_PUBLISHER_PROXY_URL, DEFAULT_TRACE_COLLECTOR_URL};
use crate::crd::{Endpoint, Serverless};
use kube::ResourceExt;

const INTERNAL_REGISTRY: &str = "internal";

/// Spec with defaults applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Configuration {
    pub eventing_endpoint: String,
    pub custom_eventing: bool,
    pub tracing_endpoint: String,
    pub custom_tracing: bool,
    pub internal_registry: bool,
    pub registry_secret: Option<String>,
}

fn endpoint(value: Option<&Endpoint>, default: &str) -> (String, bool) {
    match value.map(|e| e.endpoint.trim()).filter(|e| !e.is_empty()) {
        Some(custom) => (custom.to_string(), true),
        None => (default.to_string(), false),
    }
}

fn describe(custom: bool) -> &'static str {
    if custom {
        "custom"
    } else {
        "default"
    }
}

impl Configuration {
    pub fn resolve(serverless: &Serverless) -> Self {
        let spec = &serverless.spec;
        let (eventing_endpoint, custom_eventing) =
            endpoint(spec.eventing.as_ref(), DEFAULT_PUBLISHER_PROXY_URL);
        let (tracing_endpoint, custom_tracing) =
            endpoint(spec.tracing.as_ref(), DEFAULT_TRACE_COLLECTOR_URL);
        let registry = spec.docker_registry.as_ref();
        Self {
            eventing_endpoint,
            custom_eventing,
            tracing_endpoint,
            custom_tracing,
            internal_registry: registry.and_then(|r| r.enable_internal).unwrap_or(true),
            registry_secret: registry
                .and_then(|r| r.secret_name.clone())
                .filter(|s| !s.trim().is_empty()),
        }
    }

    /// Value reported in `status.dockerRegistry`
    pub fn registry_status(&self) -> String {
        if self.internal_registry {
            return INTERNAL_REGISTRY.to_string();
        }
        self.registry_secret
            .clone()
            .unwrap_or_else(|| "external".to_string())
    }

    /// Message of the `Configured` condition
    pub fn message(&self) -> String {
        format!(
            "Configured with {} Publisher Proxy URL and {} Trace Collector URL.",
            describe(self.custom_eventing),
            describe(self.custom_tracing)
        )
    }
}

/// Chart release for `serverless`, flags included
///
/// Install and uninstall both go through here so that removal renders the
/// manifests with the same flags they were installed with.
pub fn desired_release(serverless: &Serverless, config: &ControllerConfig) -> ChartRelease {
    let configuration = Configuration::resolve(serverless);
    let namespace = serverless
        .namespace()
        .unwrap_or_else(|| config.operator_namespace.clone());
    ChartRelease::new(&config.chart_path, namespace)
        .with_flag("eventing.endpoint", configuration.eventing_endpoint.clone())
        .with_flag("tracing.endpoint", configuration.tracing_endpoint.clone())
        .with_flag(
            "dockerRegistry.enableInternal",
            configuration.internal_registry.to_string(),
        )
        .with_flag(
            "dockerRegistry.secretName",
            configuration.registry_secret.unwrap_or_default(),
        )
}
