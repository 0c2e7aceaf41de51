//! # Metrics Module
//!
//! Prometheus metrics for monitoring the operator, organized by responsibility.
//!
//! ## Sub-modules
//!
//! - `registry` - Metrics registry setup and registration
//! - `controller_metrics` - Reconciliations, requeues, status writes and events
//! - `resource_metrics` - Child object convergence and chart operations

pub mod controller_metrics;
pub mod registry;
pub mod resource_metrics;

pub use controller_metrics::*;
pub use registry::*;
pub use resource_metrics::*;
