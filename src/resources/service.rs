//! ClusterIP Service in front of a Function.

use super::{function_labels, FUNCTION_PORT};
use crate::crd::Function;
use k8s_openapi::api::core::v1::{Service, ServicePort, ServiceSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;

pub fn build_service(function: &Function) -> Service {
    let name = function.metadata.name.clone().unwrap_or_default();
    let labels = function_labels(&name);
    Service {
        metadata: ObjectMeta {
            name: Some(name),
            namespace: function.metadata.namespace.clone(),
            labels: Some(labels.clone()),
            ..ObjectMeta::default()
        },
        spec: Some(ServiceSpec {
            type_: Some("ClusterIP".to_string()),
            selector: Some(labels),
            ports: Some(vec![ServicePort {
                name: Some("http".to_string()),
                port: FUNCTION_PORT,
                protocol: Some("TCP".to_string()),
                target_port: Some(IntOrString::Int(FUNCTION_PORT)),
                ..ServicePort::default()
            }]),
            ..ServiceSpec::default()
        }),
        status: None,
    }
}
