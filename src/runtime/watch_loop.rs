//! # Watch Loop
//!
//! Runs the Function and Serverless controllers until a shutdown signal.
//!
//! Functions are watched in every namespace together with the Deployments
//! and Services they own, so drift on a child triggers its owner. Serverless
//! resources are only watched in the operator namespace.

use super::error_policy::log_stream_error;
use super::initialization::InitializationResult;
use crate::controller::{function, serverless};
use crate::crd::{Function, Serverless};
use anyhow::Result;
use futures::StreamExt;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Service;
use kube::runtime::controller::{Action, Controller};
use kube::runtime::reflector::ObjectRef;
use kube::runtime::watcher;
use kube::Api;
use std::fmt::Display;
use std::sync::atomic::Ordering;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

fn log_reconcile_result<K, E>(
    controller: &'static str,
) -> impl Fn(Result<(ObjectRef<K>, Action), E>) -> std::future::Ready<()>
where
    K: kube::Resource,
    E: Display,
{
    move |result| {
        match result {
            Ok((obj, action)) => debug!(
                resource.name = %obj.name,
                ?action,
                "{} reconciliation completed",
                controller
            ),
            Err(e) => log_stream_error(controller, &e.to_string()),
        }
        std::future::ready(())
    }
}

/// Resolve on SIGTERM or Ctrl-C, then cancel `shutdown`
async fn wait_for_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    info!("Shutdown signal received, stopping controllers...");
    shutdown.cancel();
}

/// Run both controllers until shutdown
pub async fn run_watch_loop(init: InitializationResult) -> Result<()> {
    let InitializationResult {
        client,
        controller_config,
        function_ctx,
        serverless_ctx,
        server_state,
        shutdown,
    } = init;

    tokio::spawn(wait_for_signal(shutdown.clone()));

    let functions: Api<Function> = Api::all(client.clone());
    let deployments: Api<Deployment> = Api::all(client.clone());
    let services: Api<Service> = Api::all(client.clone());
    let function_controller = Controller::new(functions, watcher::Config::default())
        .owns(deployments, watcher::Config::default())
        .owns(services, watcher::Config::default())
        .graceful_shutdown_on(shutdown.clone().cancelled_owned())
        .run(function::reconcile, function::error_policy, function_ctx)
        .for_each(log_reconcile_result("Function"));

    let serverless_api: Api<Serverless> =
        Api::namespaced(client, &controller_config.operator_namespace);
    let serverless_controller = Controller::new(serverless_api, watcher::Config::default())
        .graceful_shutdown_on(shutdown.clone().cancelled_owned())
        .run(serverless::reconcile, serverless::error_policy, serverless_ctx)
        .for_each(log_reconcile_result("Serverless"));

    info!("Controllers started:");
    info!("- Function controller (all namespaces)");
    info!(
        "- Serverless controller (namespace {})",
        controller_config.operator_namespace
    );

    tokio::join!(function_controller, serverless_controller);

    server_state.is_ready.store(false, Ordering::Relaxed);
    info!("Controllers stopped");
    Ok(())
}
