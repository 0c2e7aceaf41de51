//! # Serverless Controller
//!
//! Installs the module chart for a `Serverless` resource and removes it again
//! when the resource is deleted. A finalizer keeps the resource around until
//! the chart is gone.
//!
//! ```text
//! Initialize -> Configure -> ApplyResources -> VerifyResources
//!     \-> DeleteResources -> RemoveFinalizer
//! ```

mod configuration;
mod steps;

pub use configuration::{desired_release, Configuration};
pub use steps::ServerlessStep;

use crate::chart::{ChartInstaller, ManifestCache, ManifestInstaller};
use crate::cluster::{KubeStore, ObjectKey, ObjectStore};
use crate::config::ControllerConfig;
use crate::controller::backoff::BackoffRegistry;
use crate::controller::fsm::events::{EventRecorder, KubeEventRecorder};
use crate::controller::fsm::{into_action, Cancellation, Reconciled, StateMachine};
use crate::crd::{Serverless, ServerlessStatus};
use crate::error::ReconcilerError;
use crate::observability::metrics;
use crate::runtime::error_policy::backoff_action;
use kube::runtime::controller::Action;
use kube::Client;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

pub(crate) const CONTROLLER: &str = "serverless";

impl Reconciled for Serverless {
    type Status = ServerlessStatus;

    fn current_status(&self) -> Option<&ServerlessStatus> {
        self.status.as_ref()
    }

    fn replace_status(&mut self, status: ServerlessStatus) {
        self.status = Some(status);
    }
}

/// Shared collaborators of every Serverless reconciliation
pub struct ServerlessContext {
    pub serverless: Arc<dyn ObjectStore<Serverless>>,
    pub recorder: Arc<dyn EventRecorder>,
    pub installer: Arc<dyn ChartInstaller>,
    pub controller_config: ControllerConfig,
    pub shutdown: CancellationToken,
    pub backoff: BackoffRegistry,
}

impl std::fmt::Debug for ServerlessContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerlessContext")
            .field("controller_config", &self.controller_config)
            .finish_non_exhaustive()
    }
}

impl ServerlessContext {
    pub fn new(
        client: Client,
        controller_config: ControllerConfig,
        cache: ManifestCache,
        shutdown: CancellationToken,
    ) -> Self {
        let backoff = BackoffRegistry::new(
            controller_config.error_backoff_min_secs,
            controller_config.error_backoff_max_secs,
        );
        Self {
            serverless: Arc::new(KubeStore::<Serverless>::new(client.clone())),
            recorder: Arc::new(KubeEventRecorder::new(
                client.clone(),
                crate::constants::CONTROLLER_NAME,
            )),
            installer: Arc::new(ManifestInstaller::new(client, cache)),
            controller_config,
            shutdown,
            backoff,
        }
    }
}

/// Reconcile one Serverless resource
pub async fn reconcile(
    serverless: Arc<Serverless>,
    ctx: Arc<ServerlessContext>,
) -> Result<Action, ReconcilerError> {
    let started = Instant::now();
    metrics::increment_reconciliations(CONTROLLER);

    let cancel = Cancellation::new(ctx.shutdown.clone())
        .with_timeout(ctx.controller_config.reconcile_timeout);
    let machine = StateMachine::new(
        serverless.as_ref().clone(),
        ctx.serverless.as_ref(),
        ctx.recorder.as_ref(),
        ctx.as_ref(),
    );
    let result = machine.run(ServerlessStep::Initialize, &cancel).await;
    metrics::observe_reconciliation_duration(CONTROLLER, started.elapsed().as_secs_f64());

    let requeue = result?;
    if let Some(key) = ObjectKey::of(serverless.as_ref()) {
        ctx.backoff.reset(&key.to_string());
    }
    Ok(into_action(requeue))
}

pub fn error_policy(
    serverless: Arc<Serverless>,
    error: &ReconcilerError,
    ctx: Arc<ServerlessContext>,
) -> Action {
    backoff_action(CONTROLLER, serverless.as_ref(), error, &ctx.backoff)
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::chart::testing::ScriptedInstaller;
    use crate::cluster::memory::InMemoryStore;
    use crate::controller::fsm::events::testing::RecordingEventRecorder;

    pub struct Harness {
        pub serverless: Arc<InMemoryStore<Serverless>>,
        pub installer: Arc<ScriptedInstaller>,
        pub recorder: Arc<RecordingEventRecorder>,
        pub ctx: Arc<ServerlessContext>,
    }

    impl Harness {
        pub fn new() -> Self {
            let serverless = Arc::new(InMemoryStore::new());
            let installer = Arc::new(ScriptedInstaller::default());
            let recorder = Arc::new(RecordingEventRecorder::default());
            let ctx = Arc::new(ServerlessContext {
                serverless: Arc::clone(&serverless) as Arc<dyn ObjectStore<Serverless>>,
                recorder: Arc::clone(&recorder) as Arc<dyn EventRecorder>,
                installer: Arc::clone(&installer) as Arc<dyn ChartInstaller>,
                controller_config: ControllerConfig::default(),
                shutdown: CancellationToken::new(),
                backoff: BackoffRegistry::new(1, 300),
            });
            Self {
                serverless,
                installer,
                recorder,
                ctx,
            }
        }

        pub async fn reconcile(&self, key: &ObjectKey) -> Result<Action, ReconcilerError> {
            let current = self
                .serverless
                .object(key)
                .expect("serverless is seeded before reconciling");
            reconcile(Arc::new(current), Arc::clone(&self.ctx)).await
        }
    }
}
