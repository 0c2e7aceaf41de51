//! # Server Configuration

use super::env_var_or_default;
use crate::constants;
use std::time::Duration;

/// Metrics and probe server settings
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub metrics_port: u16,
    pub startup_timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            metrics_port: constants::DEFAULT_METRICS_PORT,
            startup_timeout: Duration::from_secs(constants::DEFAULT_SERVER_STARTUP_TIMEOUT_SECS),
            poll_interval: Duration::from_millis(constants::DEFAULT_SERVER_POLL_INTERVAL_MS),
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self {
            metrics_port: env_var_or_default("METRICS_PORT", constants::DEFAULT_METRICS_PORT),
            startup_timeout: Duration::from_secs(env_var_or_default(
                "SERVER_STARTUP_TIMEOUT_SECS",
                constants::DEFAULT_SERVER_STARTUP_TIMEOUT_SECS,
            )),
            poll_interval: Duration::from_millis(env_var_or_default(
                "SERVER_POLL_INTERVAL_MS",
                constants::DEFAULT_SERVER_POLL_INTERVAL_MS,
            )),
        }
    }
}
