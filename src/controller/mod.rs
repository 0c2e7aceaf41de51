//! # Controllers
//!
//! The state-machine engine, child-object convergence and the two
//! controllers built on top of them.

pub mod backoff;
pub mod convergence;
pub mod fsm;
pub mod function;
pub mod server;
pub mod serverless;
