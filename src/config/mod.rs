//! # Configuration
//!
//! Read-only configuration loaded from environment variables at start-up.
//!
//! Every struct has a `Default` built from [`crate::constants`] and a
//! `from_env()` constructor that overrides individual values.

pub mod controller;
pub mod function;
pub mod server;

pub use controller::ControllerConfig;
pub use function::FunctionConfig;
pub use server::ServerConfig;

use std::str::FromStr;
use tracing::warn;

/// Read an environment variable, falling back to `default` when it is unset
/// or does not parse
pub(crate) fn env_var_or_default<T: FromStr>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => match raw.parse::<T>() {
            Ok(value) => value,
            Err(_) => {
                warn!("Invalid value '{}' for {}, using default", raw, key);
                default
            }
        },
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_var_or_default_unset() {
        let value: u64 = env_var_or_default("SERVERLESS_OPERATOR_TEST_UNSET_VAR", 42);
        assert_eq!(value, 42);
    }

    #[test]
    fn test_env_var_or_default_unparsable() {
        std::env::set_var("SERVERLESS_OPERATOR_TEST_BAD_U64", "not-a-number");
        let value: u64 = env_var_or_default("SERVERLESS_OPERATOR_TEST_BAD_U64", 7);
        assert_eq!(value, 7);
    }

    #[test]
    fn test_env_var_or_default_parsed() {
        std::env::set_var("SERVERLESS_OPERATOR_TEST_GOOD_U64", "15");
        let value: u64 = env_var_or_default("SERVERLESS_OPERATOR_TEST_GOOD_U64", 7);
        assert_eq!(value, 15);
    }
}
