//! # Function Controller
//!
//! Converges each `Function` into a Deployment and a ClusterIP Service and
//! reports rollout progress through the `ConfigurationReady` and `Running`
//! conditions.
//!
//! One reconciliation walks:
//!
//! ```text
//! ValidateFunction -> HandleDeployment -> HandleService -> ObserveRollout
//! ```
//!
//! Child objects carry a controller owner reference, so deletion is left to
//! the garbage collector.

mod steps;
pub mod validation;

pub use steps::FunctionStep;

use crate::cluster::{KubeStore, ObjectKey, ObjectStore};
use crate::config::{ControllerConfig, FunctionConfig};
use crate::controller::backoff::BackoffRegistry;
use crate::controller::fsm::events::{EventRecorder, KubeEventRecorder};
use crate::controller::fsm::{into_action, Cancellation, Reconciled, StateMachine};
use crate::crd::{Function, FunctionStatus};
use crate::error::ReconcilerError;
use crate::observability::metrics;
use crate::runtime::error_policy::backoff_action;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Service;
use kube::runtime::controller::Action;
use kube::Client;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

pub(crate) const CONTROLLER: &str = "function";

impl Reconciled for Function {
    type Status = FunctionStatus;

    fn current_status(&self) -> Option<&FunctionStatus> {
        self.status.as_ref()
    }

    fn replace_status(&mut self, status: FunctionStatus) {
        self.status = Some(status);
    }
}

/// Shared, read-only collaborators of every Function reconciliation
pub struct FunctionContext {
    pub functions: Arc<dyn ObjectStore<Function>>,
    pub deployments: Arc<dyn ObjectStore<Deployment>>,
    pub services: Arc<dyn ObjectStore<Service>>,
    pub recorder: Arc<dyn EventRecorder>,
    pub function_config: FunctionConfig,
    pub controller_config: ControllerConfig,
    pub shutdown: CancellationToken,
    pub backoff: BackoffRegistry,
}

impl std::fmt::Debug for FunctionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionContext")
            .field("function_config", &self.function_config)
            .field("controller_config", &self.controller_config)
            .finish_non_exhaustive()
    }
}

impl FunctionContext {
    /// Context backed by the API server
    pub fn new(
        client: Client,
        function_config: FunctionConfig,
        controller_config: ControllerConfig,
        shutdown: CancellationToken,
    ) -> Self {
        let backoff = BackoffRegistry::new(
            controller_config.error_backoff_min_secs,
            controller_config.error_backoff_max_secs,
        );
        Self {
            functions: Arc::new(KubeStore::<Function>::new(client.clone())),
            deployments: Arc::new(KubeStore::<Deployment>::new(client.clone())),
            services: Arc::new(KubeStore::<Service>::new(client.clone())),
            recorder: Arc::new(KubeEventRecorder::new(
                client,
                crate::constants::CONTROLLER_NAME,
            )),
            function_config,
            controller_config,
            shutdown,
            backoff,
        }
    }
}

/// Reconcile one Function
pub async fn reconcile(
    function: Arc<Function>,
    ctx: Arc<FunctionContext>,
) -> Result<Action, ReconcilerError> {
    let started = Instant::now();
    metrics::increment_reconciliations(CONTROLLER);

    let cancel = Cancellation::new(ctx.shutdown.clone())
        .with_timeout(ctx.controller_config.reconcile_timeout);
    let machine = StateMachine::new(
        function.as_ref().clone(),
        ctx.functions.as_ref(),
        ctx.recorder.as_ref(),
        ctx.as_ref(),
    );
    let result = machine.run(FunctionStep::ValidateFunction, &cancel).await;
    metrics::observe_reconciliation_duration(CONTROLLER, started.elapsed().as_secs_f64());

    let requeue = result?;
    if let Some(key) = ObjectKey::of(function.as_ref()) {
        ctx.backoff.reset(&key.to_string());
    }
    Ok(into_action(requeue))
}

pub fn error_policy(
    function: Arc<Function>,
    error: &ReconcilerError,
    ctx: Arc<FunctionContext>,
) -> Action {
    backoff_action(CONTROLLER, function.as_ref(), error, &ctx.backoff)
}
