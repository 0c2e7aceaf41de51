//! # Function Configuration
//!
//! Runtime images and polling intervals used when building Function workloads.

use super::env_var_or_default;
use crate::constants;
use crate::crd::Runtime;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct FunctionConfig {
    pub nodejs20_image: String,
    pub python312_image: String,
    /// Requeue interval after a Deployment was created, to observe rollout
    pub created_requeue: Duration,
}

impl Default for FunctionConfig {
    fn default() -> Self {
        Self {
            nodejs20_image: constants::DEFAULT_NODEJS20_IMAGE.to_string(),
            python312_image: constants::DEFAULT_PYTHON312_IMAGE.to_string(),
            created_requeue: Duration::from_secs(constants::DEFAULT_CREATED_REQUEUE_SECS),
        }
    }
}

impl FunctionConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            nodejs20_image: env_var_or_default("FUNCTION_IMAGE_NODEJS20", defaults.nodejs20_image),
            python312_image: env_var_or_default(
                "FUNCTION_IMAGE_PYTHON312",
                defaults.python312_image,
            ),
            created_requeue: Duration::from_secs(env_var_or_default(
                "FUNCTION_CREATED_REQUEUE_SECS",
                constants::DEFAULT_CREATED_REQUEUE_SECS,
            )),
        }
    }

    /// Configured image for a runtime
    pub fn runtime_image(&self, runtime: Runtime) -> &str {
        match runtime {
            Runtime::Nodejs20 => &self.nodejs20_image,
            Runtime::Python312 => &self.python312_image,
        }
    }
}
