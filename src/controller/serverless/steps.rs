//! Reconciliation steps of the Serverless controller.
//!
//! The chart release travels inside the step values, so later steps act on
//! exactly what Configure resolved.

use super::configuration::{desired_release, Configuration};
use super::ServerlessContext;
use crate::chart::{ChartRelease, Verification};
use crate::controller::fsm::{Reconciled, Step, StateMachine, StepResult, Transition};
use crate::crd::condition::{ConditionStatus, ConditionedStatus, State};
use crate::crd::serverless::{condition_types, reasons};
use crate::crd::Serverless;
use async_trait::async_trait;
use kube::ResourceExt;
use std::fmt;
use tracing::{info, warn};

type Machine<'a> = StateMachine<'a, Serverless, ServerlessContext>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerlessStep {
    Initialize,
    Configure,
    ApplyResources(ChartRelease),
    VerifyResources(ChartRelease),
    DeleteResources,
    RemoveFinalizer,
}

impl fmt::Display for ServerlessStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ServerlessStep::Initialize => "Initialize",
            ServerlessStep::Configure => "Configure",
            ServerlessStep::ApplyResources(_) => "ApplyResources",
            ServerlessStep::VerifyResources(_) => "VerifyResources",
            ServerlessStep::DeleteResources => "DeleteResources",
            ServerlessStep::RemoveFinalizer => "RemoveFinalizer",
        };
        f.write_str(name)
    }
}

#[async_trait]
impl Step<Serverless, ServerlessContext> for ServerlessStep {
    async fn run(self, machine: &mut Machine<'_>) -> StepResult<Self> {
        match self {
            ServerlessStep::Initialize => initialize(machine).await,
            ServerlessStep::Configure => Ok(configure(machine)),
            ServerlessStep::ApplyResources(release) => apply_resources(machine, release).await,
            ServerlessStep::VerifyResources(release) => verify_resources(machine, release).await,
            ServerlessStep::DeleteResources => delete_resources(machine).await,
            ServerlessStep::RemoveFinalizer => remove_finalizer(machine).await,
        }
    }
}

fn has_finalizer(machine: &Machine<'_>) -> bool {
    let finalizer = &machine.deps().controller_config.finalizer;
    machine.resource().finalizers().iter().any(|f| f == finalizer)
}

/// The resource carrying the working status, for full-object writes
fn working_copy(machine: &Machine<'_>) -> Serverless {
    let mut obj = machine.resource().clone();
    obj.replace_status(machine.status().clone());
    obj
}

async fn initialize(machine: &mut Machine<'_>) -> StepResult<ServerlessStep> {
    if machine.is_deleting() {
        if !has_finalizer(machine) {
            return Ok(Transition::stop());
        }
        return Ok(Transition::next(ServerlessStep::DeleteResources));
    }

    machine.mark_observed();
    if !has_finalizer(machine) {
        let mut updated = working_copy(machine);
        updated
            .finalizers_mut()
            .push(machine.deps().controller_config.finalizer.clone());
        let stored = machine.store().update(&updated).await?;
        machine.replace_resource(stored);
        info!(serverless = %machine.resource().name_any(), "added finalizer");
        return Ok(Transition::stop().requeue_now());
    }
    Ok(Transition::next(ServerlessStep::Configure))
}

fn configure(machine: &mut Machine<'_>) -> Transition<ServerlessStep> {
    let configuration = Configuration::resolve(machine.resource());
    let release = desired_release(machine.resource(), &machine.deps().controller_config);
    let generation = machine.generation();

    let status = machine.status_mut();
    status.eventing_endpoint = Some(configuration.eventing_endpoint.clone());
    status.tracing_endpoint = Some(configuration.tracing_endpoint.clone());
    status.docker_registry = Some(configuration.registry_status());
    status.observed_generation = generation;

    machine.set_condition(
        condition_types::CONFIGURED,
        ConditionStatus::True,
        reasons::CONFIGURED,
        configuration.message(),
    );
    Transition::next(ServerlessStep::ApplyResources(release))
}

async fn apply_resources(
    machine: &mut Machine<'_>,
    release: ChartRelease,
) -> StepResult<ServerlessStep> {
    // Make the installation visible before the chart is applied.
    if machine.status().condition(condition_types::INSTALLED).is_none() {
        machine.set_state(State::Processing);
        machine.set_condition(
            condition_types::INSTALLED,
            ConditionStatus::Unknown,
            reasons::INSTALLATION,
            "Installing for configuration",
        );
        return Ok(Transition::next(ServerlessStep::ApplyResources(release)));
    }

    if let Err(err) = machine.deps().installer.install(&release).await {
        warn!(release = %release.cache_key(), error = %err, "chart installation failed");
        machine.set_state(State::Error);
        machine.set_condition(
            condition_types::INSTALLED,
            ConditionStatus::False,
            reasons::INSTALLATION_ERR,
            err.to_string(),
        );
        return Err(err.into());
    }
    Ok(Transition::next(ServerlessStep::VerifyResources(release)))
}

async fn verify_resources(
    machine: &mut Machine<'_>,
    release: ChartRelease,
) -> StepResult<ServerlessStep> {
    let poll = machine.deps().controller_config.verify_requeue;
    match machine.deps().installer.verify(&release).await {
        Verification::Ready => {
            machine.set_state(State::Ready);
            machine.set_condition(
                condition_types::INSTALLED,
                ConditionStatus::True,
                reasons::INSTALLED,
                "Serverless installed",
            );
            Ok(Transition::stop().announced())
        }
        Verification::Pending => {
            machine.set_condition(
                condition_types::INSTALLED,
                ConditionStatus::Unknown,
                reasons::INSTALLATION,
                "Waiting for serverless resources to become ready",
            );
            Ok(Transition::stop().requeue_after(poll).announced())
        }
        Verification::Warning(message) => {
            machine.set_state(State::Warning);
            machine.set_condition(
                condition_types::INSTALLED,
                ConditionStatus::True,
                reasons::INSTALLED,
                message,
            );
            Ok(Transition::stop().requeue_after(poll).announced())
        }
        Verification::Failed(message) => {
            machine.set_state(State::Error);
            machine.set_condition(
                condition_types::INSTALLED,
                ConditionStatus::False,
                reasons::INSTALLATION_ERR,
                message,
            );
            Ok(Transition::stop().requeue_after(poll).announced())
        }
    }
}

async fn delete_resources(machine: &mut Machine<'_>) -> StepResult<ServerlessStep> {
    if machine.status().state() != Some(State::Deleting) {
        machine.set_state(State::Deleting);
        machine.set_condition(
            condition_types::DELETED,
            ConditionStatus::Unknown,
            reasons::DELETION,
            "Uninstalling",
        );
        return Ok(Transition::next(ServerlessStep::DeleteResources));
    }

    let release = desired_release(machine.resource(), &machine.deps().controller_config);
    if let Err(err) = machine.deps().installer.uninstall(&release).await {
        warn!(release = %release.cache_key(), error = %err, "chart removal failed");
        machine.set_state(State::Error);
        machine.set_condition(
            condition_types::DELETED,
            ConditionStatus::False,
            reasons::DELETION_ERR,
            err.to_string(),
        );
        return Err(err.into());
    }

    machine.set_condition(
        condition_types::DELETED,
        ConditionStatus::True,
        reasons::DELETED,
        "Serverless module deleted",
    );
    Ok(Transition::next(ServerlessStep::RemoveFinalizer).announced())
}

async fn remove_finalizer(machine: &mut Machine<'_>) -> StepResult<ServerlessStep> {
    let finalizer = machine.deps().controller_config.finalizer.clone();
    let mut updated = working_copy(machine);
    updated.finalizers_mut().retain(|f| *f != finalizer);
    match machine.store().update(&updated).await {
        Ok(stored) => machine.replace_resource(stored),
        Err(err) if err.is_not_found() => {}
        Err(err) => return Err(err.into()),
    }
    info!(serverless = %machine.resource().name_any(), "removed finalizer");
    Ok(Transition::stop())
}

#[cfg(test)]
mod tests {
    use super::super::testing::Harness;
    use super::*;
    use crate::chart::testing::ChartCall;
    use crate::cluster::memory::Operation;
    use crate::cluster::{ObjectKey, StoreError};
    use crate::controller::fsm::events::EventSeverity;
    use crate::crd::{Endpoint, ServerlessStatus};
    use crate::testing::serverless;
    use kube::runtime::controller::Action;
    use std::time::Duration;

    const FINALIZER: &str = crate::constants::DEFAULT_SERVERLESS_FINALIZER;

    fn seed(h: &Harness, s: Serverless) -> ObjectKey {
        ObjectKey::of(&h.serverless.insert(s)).unwrap()
    }

    fn with_finalizer(mut s: Serverless) -> Serverless {
        s.metadata.finalizers = Some(vec![FINALIZER.to_string()]);
        s
    }

    fn deleting(s: Serverless) -> Serverless {
        let mut s = with_finalizer(s);
        s.metadata.deletion_timestamp =
            serde_json::from_value(serde_json::json!("2026-01-01T00:00:00Z")).unwrap();
        s
    }

    fn status(h: &Harness, key: &ObjectKey) -> ServerlessStatus {
        h.serverless.object(key).unwrap().status.unwrap_or_default()
    }

    #[test]
    fn test_step_names() {
        let release = ChartRelease::new("/module-chart", "kyma-system");
        assert_eq!(ServerlessStep::ApplyResources(release).to_string(), "ApplyResources");
        assert_eq!(ServerlessStep::RemoveFinalizer.to_string(), "RemoveFinalizer");
    }

    #[tokio::test]
    async fn test_first_pass_adds_finalizer_and_requeues() {
        let h = Harness::new();
        let key = seed(&h, serverless("default"));

        let action = h.reconcile(&key).await.unwrap();

        assert_eq!(action, Action::requeue(Duration::ZERO));
        let stored = h.serverless.object(&key).unwrap();
        assert_eq!(stored.finalizers(), &[FINALIZER.to_string()]);
        assert_eq!(stored.status.unwrap().state, Some(State::Processing));
        assert!(h.installer.calls().is_empty());
    }

    #[tokio::test]
    async fn test_install_and_verify_ready() {
        let h = Harness::new();
        let mut s = with_finalizer(serverless("default"));
        s.spec.eventing = Some(Endpoint {
            endpoint: "http://eventing.local".to_string(),
        });
        let key = seed(&h, s);

        let action = h.reconcile(&key).await.unwrap();

        assert_eq!(action, Action::await_change());
        let st = status(&h, &key);
        assert_eq!(st.state, Some(State::Ready));
        assert_eq!(st.eventing_endpoint.as_deref(), Some("http://eventing.local"));
        assert_eq!(st.docker_registry.as_deref(), Some("internal"));
        assert_eq!(
            st.condition("Installed").unwrap().status,
            ConditionStatus::True
        );
        assert_eq!(
            st.condition("Configured").unwrap().message.as_deref(),
            Some("Configured with custom Publisher Proxy URL and default Trace Collector URL.")
        );

        let calls = h.installer.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].0, ChartCall::Install);
        assert_eq!(
            calls[0].1.flags.get("eventing.endpoint").map(String::as_str),
            Some("http://eventing.local")
        );
        assert_eq!(calls[1].0, ChartCall::Verify);
        // observed, configured, installing, installed
        assert_eq!(h.serverless.calls(Operation::UpdateStatus), 4);
        // Configured + Installed
        assert_eq!(h.recorder.events().len(), 2);
    }

    #[tokio::test]
    async fn test_pending_verification_requeues() {
        let h = Harness::new();
        let key = seed(&h, with_finalizer(serverless("default")));
        h.installer.push_verify(Verification::Pending);

        let action = h.reconcile(&key).await.unwrap();

        assert_eq!(action, Action::requeue(Duration::from_secs(10)));
        let st = status(&h, &key);
        assert_eq!(st.state, Some(State::Processing));
        assert_eq!(
            st.condition("Installed").unwrap().status,
            ConditionStatus::Unknown
        );
    }

    #[tokio::test]
    async fn test_warning_and_failed_verification() {
        let h = Harness::new();
        let key = seed(&h, with_finalizer(serverless("default")));
        h.installer
            .push_verify(Verification::Warning("webhook has 1/2 replicas ready".to_string()));
        h.reconcile(&key).await.unwrap();
        assert_eq!(status(&h, &key).state, Some(State::Warning));

        h.installer
            .push_verify(Verification::Failed("deployment webhook failed".to_string()));
        let action = h.reconcile(&key).await.unwrap();

        assert_eq!(action, Action::requeue(Duration::from_secs(10)));
        let st = status(&h, &key);
        assert_eq!(st.state, Some(State::Error));
        let installed = st.condition("Installed").unwrap();
        assert_eq!(installed.status, ConditionStatus::False);
        assert_eq!(installed.reason.as_deref(), Some("InstallationErr"));
    }

    #[tokio::test]
    async fn test_install_failure_sets_error() {
        let h = Harness::new();
        let key = seed(&h, with_finalizer(serverless("default")));
        h.installer.push_install(Err("webhook rejected"));

        let result = h.reconcile(&key).await;

        assert!(result.is_err());
        let st = status(&h, &key);
        assert_eq!(st.state, Some(State::Error));
        let installed = st.condition("Installed").unwrap();
        assert_eq!(installed.reason.as_deref(), Some("InstallationErr"));
        assert!(installed.message.as_deref().unwrap().contains("webhook rejected"));
        assert!(h
            .recorder
            .events()
            .iter()
            .any(|e| e.severity == EventSeverity::Warning && e.reason == "InstallationErr"));
        assert_eq!(h.installer.count(ChartCall::Verify), 0);
    }

    #[tokio::test]
    async fn test_steady_state_reinstalls_without_status_writes() {
        let h = Harness::new();
        let key = seed(&h, with_finalizer(serverless("default")));
        h.reconcile(&key).await.unwrap();
        let writes = h.serverless.calls(Operation::UpdateStatus);
        let events = h.recorder.events().len();

        h.reconcile(&key).await.unwrap();

        assert_eq!(h.serverless.calls(Operation::UpdateStatus), writes);
        assert_eq!(h.recorder.events().len(), events);
        assert_eq!(h.installer.count(ChartCall::Install), 2);
    }

    #[tokio::test]
    async fn test_deletion_uninstalls_and_removes_finalizer() {
        let h = Harness::new();
        let key = seed(&h, deleting(serverless("default")));

        let action = h.reconcile(&key).await.unwrap();

        assert_eq!(action, Action::await_change());
        assert_eq!(h.installer.count(ChartCall::Uninstall), 1);
        let stored = h.serverless.object(&key).unwrap();
        assert!(stored.finalizers().is_empty());
        let st = stored.status.unwrap();
        assert_eq!(st.state, Some(State::Deleting));
        assert_eq!(st.condition("Deleted").unwrap().status, ConditionStatus::True);
    }

    #[tokio::test]
    async fn test_uninstall_failure_keeps_finalizer() {
        let h = Harness::new();
        let key = seed(&h, deleting(serverless("default")));
        h.installer.push_uninstall(Err("namespace terminating"));

        assert!(h.reconcile(&key).await.is_err());

        let stored = h.serverless.object(&key).unwrap();
        assert_eq!(stored.finalizers(), &[FINALIZER.to_string()]);
        let st = stored.status.unwrap();
        assert_eq!(st.state, Some(State::Error));
        assert_eq!(
            st.condition("Deleted").unwrap().reason.as_deref(),
            Some("DeletionErr")
        );
    }

    #[tokio::test]
    async fn test_deleting_without_finalizer_is_ignored() {
        let h = Harness::new();
        let mut s = deleting(serverless("default"));
        s.metadata.finalizers = Some(vec!["someone-else".to_string()]);
        let key = seed(&h, s);

        h.reconcile(&key).await.unwrap();

        assert!(h.installer.calls().is_empty());
        assert_eq!(h.serverless.calls(Operation::UpdateStatus), 0);
    }

    #[tokio::test]
    async fn test_vanished_object_during_finalizer_removal() {
        let h = Harness::new();
        let key = seed(&h, deleting(serverless("default")));
        h.serverless.fail_next(
            Operation::Update,
            StoreError::NotFound {
                kind: "Serverless".to_string(),
                key: key.to_string(),
            },
        );

        assert!(h.reconcile(&key).await.is_ok());
    }
}
