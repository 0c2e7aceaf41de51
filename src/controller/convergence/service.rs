//! Service convergence.
//!
//! Only the selector and ports are owned. `clusterIP` and other fields the
//! API server assigns stay untouched.

use super::{converge, Convergent};
use crate::cluster::ObjectStore;
use crate::controller::fsm::{Reconciled, StateMachine};
use crate::crd::condition::ConditionStatus;
use crate::crd::function::{condition_types, reasons};
use crate::error::ReconcilerError;
use k8s_openapi::api::core::v1::{Service, ServicePort};

fn ports(s: &Service) -> &[ServicePort] {
    s.spec
        .as_ref()
        .and_then(|spec| spec.ports.as_deref())
        .unwrap_or_default()
}

/// Whether the selector or ports of `live` differ from `desired`
///
/// Ports are compared on name, port, target port and protocol; a missing
/// protocol counts as TCP.
pub fn service_changed(live: &Service, desired: &Service) -> bool {
    let selector = |s: &Service| s.spec.as_ref().and_then(|spec| spec.selector.clone()).unwrap_or_default();
    let port_key = |p: &ServicePort| {
        (
            p.name.clone().unwrap_or_default(),
            p.port,
            p.target_port.clone(),
            p.protocol.clone().unwrap_or_else(|| "TCP".to_string()),
        )
    };
    let live_ports: Vec<_> = ports(live).iter().map(port_key).collect();
    let desired_ports: Vec<_> = ports(desired).iter().map(port_key).collect();

    selector(live) != selector(desired) || live_ports != desired_ports
}

impl Convergent for Service {
    fn has_drifted(live: &Self, desired: &Self) -> bool {
        service_changed(live, desired)
    }

    fn adopt_owned_fields(live: &mut Self, desired: &Self) {
        let Some(desired_spec) = desired.spec.as_ref() else {
            return;
        };
        let live_spec = live.spec.get_or_insert_with(Default::default);
        live_spec.selector = desired_spec.selector.clone();
        live_spec.ports = desired_spec.ports.clone();
    }
}

/// Converge the Service; only a failure touches the `Running` condition
pub async fn converge_service<K: Reconciled, D: Sync>(
    machine: &mut StateMachine<'_, K, D>,
    store: &dyn ObjectStore<Service>,
    desired: Service,
) -> Result<(), ReconcilerError> {
    let owner = machine.owner_reference()?;
    match converge(store, desired, owner).await {
        Ok(_) => Ok(()),
        Err(err) => {
            machine.set_condition(
                condition_types::RUNNING,
                ConditionStatus::False,
                reasons::SERVICE_FAILED,
                format!("Service {} {} failed: {}", err.key, err.action, err.source),
            );
            Err(err.into())
        }
    }
}
