//! # Runtime Module
//!
//! Start-up, the controller watch loop and error handling.

pub mod error_policy;
pub mod initialization;
pub mod watch_loop;
