//! Reconciliation steps of the Function controller.

use super::validation::validate_function;
use super::FunctionContext;
use crate::controller::convergence::deployment::{converge_deployment, rollout_status, Rollout};
use crate::controller::convergence::service::converge_service;
use crate::controller::fsm::{Step, StateMachine, StepResult, Transition};
use crate::crd::condition::{ConditionStatus, ConditionedStatus, State};
use crate::crd::function::{condition_types, reasons};
use crate::crd::Function;
use crate::resources::deployment::runtime_image;
use crate::resources::{build_deployment, build_service, function_labels, selector_string};
use async_trait::async_trait;
use kube::ResourceExt;
use std::fmt;
use tracing::{debug, warn};

type Machine<'a> = StateMachine<'a, Function, FunctionContext>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionStep {
    ValidateFunction,
    HandleDeployment,
    HandleService,
    ObserveRollout,
}

impl fmt::Display for FunctionStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[async_trait]
impl Step<Function, FunctionContext> for FunctionStep {
    async fn run(self, machine: &mut Machine<'_>) -> StepResult<Self> {
        match self {
            FunctionStep::ValidateFunction => validate(machine),
            FunctionStep::HandleDeployment => handle_deployment(machine).await,
            FunctionStep::HandleService => handle_service(machine).await,
            FunctionStep::ObserveRollout => observe_rollout(machine).await,
        }
    }
}

fn validate(machine: &mut Machine<'_>) -> StepResult<FunctionStep> {
    if machine.is_deleting() {
        debug!(function = %machine.resource().name_any(), "function is being deleted");
        return Ok(Transition::stop());
    }
    machine.mark_observed();

    let problems = validate_function(machine.resource(), &machine.deps().function_config);
    if !problems.is_empty() {
        machine.set_condition(
            condition_types::CONFIGURATION_READY,
            ConditionStatus::False,
            reasons::INVALID_FUNCTION_SPEC,
            problems.join(". "),
        );
        machine.set_state(State::Error);
        return Ok(Transition::stop().announced());
    }

    let was_invalid = machine
        .status()
        .condition(condition_types::CONFIGURATION_READY)
        .is_some_and(|c| c.status == ConditionStatus::False);
    if was_invalid && machine.status().state() == Some(State::Error) {
        machine.set_state(State::Processing);
    }
    machine.set_condition(
        condition_types::CONFIGURATION_READY,
        ConditionStatus::True,
        reasons::FUNCTION_SPEC_VALID,
        "Function spec is valid",
    );
    Ok(Transition::next(FunctionStep::HandleDeployment))
}

async fn handle_deployment(machine: &mut Machine<'_>) -> StepResult<FunctionStep> {
    let deps = machine.deps();
    let function = machine.resource().clone();
    let desired = build_deployment(&function, &deps.function_config);

    let status = machine.status_mut();
    status.runtime = Some(function.spec.runtime);
    status.runtime_image = Some(runtime_image(&function, &deps.function_config));
    status.replicas = Some(function.spec.replicas.unwrap_or(1));
    status.pod_selector = Some(selector_string(&function_labels(&function.name_any())));
    status.observed_generation = function.metadata.generation;

    match converge_deployment(
        machine,
        deps.deployments.as_ref(),
        desired,
        deps.function_config.created_requeue,
    )
    .await
    {
        Ok(requeue) => {
            if requeue.is_some() {
                machine.set_state(State::Processing);
            }
            Ok(Transition::next(FunctionStep::HandleService)
                .with_requeue(requeue)
                .announced())
        }
        Err(err) => {
            machine.set_state(State::Error);
            Err(err)
        }
    }
}

async fn handle_service(machine: &mut Machine<'_>) -> StepResult<FunctionStep> {
    let deps = machine.deps();
    let desired = build_service(machine.resource());
    if let Err(err) = converge_service(machine, deps.services.as_ref(), desired).await {
        machine.set_state(State::Error);
        return Err(err);
    }
    Ok(Transition::next(FunctionStep::ObserveRollout))
}

/// Report the rollout only when the live Deployment says something definite
///
/// A read failure is not an observation: status stays as it is and the error
/// goes to the error policy.
async fn observe_rollout(machine: &mut Machine<'_>) -> StepResult<FunctionStep> {
    let key = machine.key()?;
    let live = match machine.deps().deployments.get(&key).await {
        Ok(live) => live,
        Err(err) if err.is_not_found() => {
            warn!(deployment = %key, "deployment vanished before rollout could be observed");
            return Ok(Transition::stop());
        }
        Err(err) => return Err(err.into()),
    };

    match rollout_status(&live) {
        Rollout::Ready => {
            machine.set_condition(
                condition_types::RUNNING,
                ConditionStatus::True,
                reasons::DEPLOYMENT_READY,
                format!("Deployment {key} is ready"),
            );
            machine.set_state(State::Ready);
        }
        Rollout::Failed(message) => {
            machine.set_condition(
                condition_types::RUNNING,
                ConditionStatus::False,
                reasons::DEPLOYMENT_FAILED,
                format!("Deployment {key} failed: {message}"),
            );
            machine.set_state(State::Error);
        }
        Rollout::InProgress => {
            debug!(deployment = %key, "rollout in progress");
        }
    }
    Ok(Transition::stop().announced())
}
