//! # Resource Metrics
//!
//! Metrics for child objects and chart operations.

use crate::observability::metrics::registry::REGISTRY;
use anyhow::Result;
use prometheus::{HistogramVec, IntCounterVec};
use std::sync::LazyLock;

static CONVERGENCE_ACTIONS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "serverless_operator_convergence_actions_total",
            "Total number of child object writes by kind and action",
        ),
        &["kind", "action"],
    )
    .expect("Failed to create CONVERGENCE_ACTIONS_TOTAL metric - this should never happen")
});

static CONVERGENCE_ERRORS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "serverless_operator_convergence_errors_total",
            "Total number of failed child object operations by kind and action",
        ),
        &["kind", "action"],
    )
    .expect("Failed to create CONVERGENCE_ERRORS_TOTAL metric - this should never happen")
});

static CHART_OPERATIONS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "serverless_operator_chart_operations_total",
            "Total number of chart operations by operation and result",
        ),
        &["operation", "result"],
    )
    .expect("Failed to create CHART_OPERATIONS_TOTAL metric - this should never happen")
});

static CHART_OPERATION_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    HistogramVec::new(
        prometheus::HistogramOpts::new(
            "serverless_operator_chart_operation_duration_seconds",
            "Duration of chart operations in seconds",
        )
        .buckets(vec![0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0]),
        &["operation"],
    )
    .expect("Failed to create CHART_OPERATION_DURATION metric - this should never happen")
});

/// Register resource metrics with the registry
pub(crate) fn register_resource_metrics() -> Result<()> {
    REGISTRY.register(Box::new(CONVERGENCE_ACTIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(CONVERGENCE_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(CHART_OPERATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(CHART_OPERATION_DURATION.clone()))?;
    Ok(())
}

pub fn increment_convergence_actions(kind: &str, action: &str) {
    CONVERGENCE_ACTIONS_TOTAL
        .with_label_values(&[kind, action])
        .inc();
}

pub fn increment_convergence_errors(kind: &str, action: &str) {
    CONVERGENCE_ERRORS_TOTAL
        .with_label_values(&[kind, action])
        .inc();
}

pub fn record_chart_operation(operation: &str, success: bool, duration: f64) {
    let result = if success { "success" } else { "error" };
    CHART_OPERATIONS_TOTAL
        .with_label_values(&[operation, result])
        .inc();
    CHART_OPERATION_DURATION
        .with_label_values(&[operation])
        .observe(duration);
}
