//! # Controller Configuration

use super::env_var_or_default;
use crate::constants;
use std::time::Duration;

/// Settings shared by both controllers
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Finalizer placed on Serverless resources
    pub finalizer: String,
    /// Directory holding the module chart manifests
    pub chart_path: String,
    /// Namespace the chart is installed into
    pub operator_namespace: String,
    /// Deadline for one reconciliation pass
    pub reconcile_timeout: Duration,
    /// Poll interval while chart workloads are not ready yet
    pub verify_requeue: Duration,
    /// Error backoff lower bound in seconds
    pub error_backoff_min_secs: u64,
    /// Error backoff upper bound in seconds
    pub error_backoff_max_secs: u64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            finalizer: constants::DEFAULT_SERVERLESS_FINALIZER.to_string(),
            chart_path: constants::DEFAULT_CHART_PATH.to_string(),
            operator_namespace: constants::DEFAULT_OPERATOR_NAMESPACE.to_string(),
            reconcile_timeout: Duration::from_secs(constants::DEFAULT_RECONCILE_TIMEOUT_SECS),
            verify_requeue: Duration::from_secs(constants::DEFAULT_VERIFY_REQUEUE_SECS),
            error_backoff_min_secs: constants::DEFAULT_ERROR_BACKOFF_MIN_SECS,
            error_backoff_max_secs: constants::DEFAULT_ERROR_BACKOFF_MAX_SECS,
        }
    }
}

impl ControllerConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            finalizer: env_var_or_default("SERVERLESS_FINALIZER", defaults.finalizer),
            chart_path: env_var_or_default("SERVERLESS_CHART_PATH", defaults.chart_path),
            operator_namespace: env_var_or_default(
                "OPERATOR_NAMESPACE",
                defaults.operator_namespace,
            ),
            reconcile_timeout: Duration::from_secs(env_var_or_default(
                "RECONCILE_TIMEOUT_SECS",
                constants::DEFAULT_RECONCILE_TIMEOUT_SECS,
            )),
            verify_requeue: Duration::from_secs(env_var_or_default(
                "VERIFY_REQUEUE_SECS",
                constants::DEFAULT_VERIFY_REQUEUE_SECS,
            )),
            error_backoff_min_secs: env_var_or_default(
                "ERROR_BACKOFF_MIN_SECS",
                defaults.error_backoff_min_secs,
            ),
            error_backoff_max_secs: env_var_or_default(
                "ERROR_BACKOFF_MAX_SECS",
                defaults.error_backoff_max_secs,
            ),
        }
    }
}
