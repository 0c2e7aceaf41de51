//! # Error Policy
//!
//! Error handling and backoff logic shared by both controllers.
//! Reconciliation errors are retried with per-resource Fibonacci backoff;
//! errors surfaced by the controller stream are classified for logging.

use crate::constants;
use crate::controller::backoff::BackoffRegistry;
use crate::error::ReconcilerError;
use crate::observability::metrics;
use kube::runtime::controller::Action;
use kube::Resource;
use std::time::Duration;
use tracing::{error, info, warn};

/// Requeue action for a failed reconciliation
///
/// Backoff state is tracked per resource so one failing resource never
/// slows down the others. A successful pass resets it.
pub fn backoff_action<K: Resource<DynamicType = ()>>(
    controller: &str,
    obj: &K,
    error: &ReconcilerError,
    backoff: &BackoffRegistry,
) -> Action {
    let name = obj.meta().name.as_deref().unwrap_or("unknown");
    let namespace = obj.meta().namespace.as_deref().unwrap_or("default");

    let error_span = tracing::span!(
        tracing::Level::ERROR,
        "controller.reconciliation_error",
        controller,
        resource.name = name,
        resource.namespace = namespace,
        error = %error
    );
    let _error_guard = error_span.enter();

    error!("Reconciliation error for {}/{}: {}", namespace, name, error);
    metrics::increment_reconciliation_errors(controller, error.kind());

    let resource_key = format!("{namespace}/{name}");
    let (delay, error_count) = backoff.record_error(&resource_key).unwrap_or_else(|| {
        warn!("Failed to lock backoff state, using default backoff");
        (
            Duration::from_secs(constants::DEFAULT_RECONCILIATION_ERROR_REQUEUE_SECS),
            0,
        )
    });

    info!(
        "Retrying with Fibonacci backoff: {}s (error count: {}, trigger source: error-backoff)",
        delay.as_secs(),
        error_count
    );

    metrics::increment_requeues_total("error-backoff");
    Action::requeue(delay)
}

/// Class of an error reported by the controller stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamErrorKind {
    /// RBAC revoked or token expired
    Unauthorized,
    /// Resource version too old; the watcher relists
    Expired,
    /// API server storage is reinitializing
    Throttled,
    /// Object deleted between event and reconcile
    NotFound,
    /// Reconciler already reported it through the error policy
    Reconciler,
    Other,
}

/// Classify a controller stream error by its rendered message
pub fn classify_stream_error(error_string: &str) -> StreamErrorKind {
    if error_string.contains("ReconcilerFailed") || error_string.contains("reconciler failed") {
        StreamErrorKind::Reconciler
    } else if error_string.contains("401") || error_string.contains("Unauthorized") {
        StreamErrorKind::Unauthorized
    } else if error_string.contains("410")
        || error_string.contains("too old resource version")
        || error_string.contains("Expired")
        || error_string.contains("Gone")
    {
        StreamErrorKind::Expired
    } else if error_string.contains("429")
        || error_string.contains("storage is (re)initializing")
        || error_string.contains("TooManyRequests")
    {
        StreamErrorKind::Throttled
    } else if error_string.contains("ObjectNotFound")
        || (error_string.contains("404") && error_string.contains("not found"))
    {
        StreamErrorKind::NotFound
    } else {
        StreamErrorKind::Other
    }
}

/// Log a controller stream error at the level its class deserves
pub fn log_stream_error(controller: &str, error_string: &str) {
    match classify_stream_error(error_string) {
        StreamErrorKind::Reconciler => {}
        StreamErrorKind::Unauthorized => {
            error!(
                controller,
                "Watch authentication failed (401 Unauthorized) - RBAC may have been revoked or token expired: {}",
                error_string
            );
        }
        StreamErrorKind::Expired => {
            warn!(controller, "Watch resource version expired (410), watch will restart");
        }
        StreamErrorKind::Throttled => {
            warn!(controller, "API server storage reinitializing (429): {}", error_string);
        }
        StreamErrorKind::NotFound => {
            warn!(controller, "Resource not found (likely deleted), continuing watch");
        }
        StreamErrorKind::Other => {
            error!(controller, "Controller stream error: {}", error_string);
        }
    }
}
