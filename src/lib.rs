//! # Serverless Operator
//!
//! Kubernetes operator for serverless Functions.
//!
//! Two controllers run side by side:
//!
//! - the **Function** controller turns every `Function` resource into a
//!   Deployment running the runtime image plus a Service in front of it, and
//!   reports the rollout through conditions and events
//! - the **Serverless** controller installs the module chart for a
//!   `Serverless` resource, verifies its workloads and removes it again on
//!   deletion
//!
//! Both are written as continuation-driven state machines (see
//! [`controller::fsm`]) that persist status only when it changed and
//! announce each condition transition once.

pub mod chart;
pub mod cluster;
pub mod config;
pub mod constants;
pub mod controller;
pub mod crd;
pub mod error;
pub mod observability;
pub mod resources;
pub mod runtime;

#[cfg(test)]
mod testing;
