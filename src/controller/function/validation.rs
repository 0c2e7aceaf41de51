//! # Function Validation
//!
//! Checks a Function spec before any child object is built. Every problem is
//! reported; the caller joins the messages into one condition message.

use crate::config::FunctionConfig;
use crate::crd::Function;
use crate::resources::deployment::{runtime_image, RESERVED_ENV_NAMES};
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

/// Label key prefix owned by the controller
const RESERVED_LABEL_PREFIX: &str = "serverless.kyma-project.io/";

static ENV_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("env name regex is valid")
});

static LABEL_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9]([-A-Za-z0-9_.]{0,61}[A-Za-z0-9])?$").expect("label name regex is valid")
});

static DNS_SUBDOMAIN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?(\.[a-z0-9]([-a-z0-9]*[a-z0-9])?)*$")
        .expect("dns subdomain regex is valid")
});

static QUANTITY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[+-]?([0-9]+(\.[0-9]*)?|\.[0-9]+)([eE][+-]?[0-9]+|Ki|Mi|Gi|Ti|Pi|Ei|n|u|m|k|M|G|T|P|E)?$")
        .expect("quantity regex is valid")
});

/// Validate `function`; an empty result means the spec is usable
pub fn validate_function(function: &Function, config: &FunctionConfig) -> Vec<String> {
    let spec = &function.spec;
    let mut problems = Vec::new();

    if spec.source.inline.source.trim().is_empty() {
        problems.push("source.inline.source must not be empty".to_string());
    }

    if runtime_image(function, config).trim().is_empty() {
        problems.push(format!("no runtime image configured for runtime {}", spec.runtime));
    }

    if let Some(replicas) = spec.replicas {
        if replicas < 0 {
            problems.push(format!("replicas must not be negative, got {replicas}"));
        }
    }

    problems.extend(validate_env(function));
    problems.extend(validate_secret_mounts(function));
    problems.extend(validate_labels(function));
    problems.extend(validate_resources(function));
    problems
}

fn validate_env(function: &Function) -> Vec<String> {
    let mut problems = Vec::new();
    let mut seen = HashSet::new();
    for env in &function.spec.env {
        if !ENV_NAME.is_match(&env.name) {
            problems.push(format!("env name {:?} is not a valid variable name", env.name));
        } else if RESERVED_ENV_NAMES.contains(&env.name.as_str()) {
            problems.push(format!("env name {} is reserved", env.name));
        }
        if !seen.insert(env.name.as_str()) {
            problems.push(format!("env name {} is duplicated", env.name));
        }
    }
    problems
}

fn validate_secret_mounts(function: &Function) -> Vec<String> {
    let mut problems = Vec::new();
    let mut paths = HashSet::new();
    for mount in &function.spec.secret_mounts {
        if mount.secret_name.trim().is_empty() {
            problems.push("secretMounts.secretName must not be empty".to_string());
        } else if !DNS_SUBDOMAIN.is_match(&mount.secret_name) {
            problems.push(format!(
                "secretMounts.secretName {:?} is not a valid secret name",
                mount.secret_name
            ));
        }
        if !mount.mount_path.starts_with('/') {
            problems.push(format!(
                "secretMounts.mountPath {:?} must be an absolute path",
                mount.mount_path
            ));
        }
        if !paths.insert(mount.mount_path.trim_end_matches('/')) {
            problems.push(format!(
                "secretMounts.mountPath {} is used more than once",
                mount.mount_path
            ));
        }
    }
    problems
}

fn valid_label_key(key: &str) -> bool {
    match key.split_once('/') {
        Some((prefix, name)) => {
            !prefix.is_empty()
                && prefix.len() <= 253
                && DNS_SUBDOMAIN.is_match(prefix)
                && LABEL_NAME.is_match(name)
        }
        None => LABEL_NAME.is_match(key),
    }
}

fn validate_labels(function: &Function) -> Vec<String> {
    let mut problems = Vec::new();
    for (key, value) in &function.spec.labels {
        if !valid_label_key(key) {
            problems.push(format!("label key {key:?} is invalid"));
        } else if key.starts_with(RESERVED_LABEL_PREFIX) {
            problems.push(format!("label key {key} uses the reserved prefix {RESERVED_LABEL_PREFIX}"));
        }
        if !value.is_empty() && !LABEL_NAME.is_match(value) {
            problems.push(format!("label value {value:?} for key {key} is invalid"));
        }
    }
    problems
}

fn validate_resources(function: &Function) -> Vec<String> {
    let Some(resources) = function.spec.resources() else {
        return Vec::new();
    };
    resources
        .limits
        .iter()
        .map(|q| ("limits", q))
        .chain(resources.requests.iter().map(|q| ("requests", q)))
        .filter(|(_, (_, quantity))| !QUANTITY.is_match(quantity))
        .map(|(section, (name, quantity))| {
            format!("resources.{section}.{name} has invalid quantity {quantity:?}")
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::{
        EnvVar, FunctionResources, ResourceConfiguration, ResourceRequirements, SecretMount,
    };
    use crate::testing::function;
    use std::collections::BTreeMap;

    fn env(name: &str) -> EnvVar {
        EnvVar {
            name: name.to_string(),
            value: Some("v".to_string()),
        }
    }

    fn mount(secret: &str, path: &str) -> SecretMount {
        SecretMount {
            secret_name: secret.to_string(),
            mount_path: path.to_string(),
        }
    }

    #[test]
    fn test_valid_function() {
        let mut f = function("hello");
        f.spec.env = vec![env("LOG_LEVEL")];
        f.spec.secret_mounts = vec![mount("db-creds", "/etc/db")];
        f.spec.labels = BTreeMap::from([("team".to_string(), "payments".to_string())]);
        assert!(validate_function(&f, &FunctionConfig::default()).is_empty());
    }

    #[test]
    fn test_empty_source() {
        let mut f = function("hello");
        f.spec.source.inline.source = "  ".to_string();
        let problems = validate_function(&f, &FunctionConfig::default());
        assert_eq!(problems, vec!["source.inline.source must not be empty"]);
    }

    #[test]
    fn test_missing_runtime_image() {
        let f = function("hello");
        let config = FunctionConfig {
            nodejs20_image: String::new(),
            ..FunctionConfig::default()
        };
        let problems = validate_function(&f, &config);
        assert_eq!(problems.len(), 1);
        assert!(problems[0].contains("nodejs20"));
    }

    #[test]
    fn test_negative_replicas() {
        let mut f = function("hello");
        f.spec.replicas = Some(-1);
        assert_eq!(validate_function(&f, &FunctionConfig::default()).len(), 1);
    }

    #[test]
    fn test_env_rules() {
        let mut f = function("hello");
        f.spec.env = vec![env("1BAD"), env("FUNC_HANDLER"), env("A"), env("A")];
        let problems = validate_function(&f, &FunctionConfig::default());
        assert_eq!(problems.len(), 3);
        assert!(problems[0].contains("1BAD"));
        assert!(problems[1].contains("reserved"));
        assert!(problems[2].contains("duplicated"));
    }

    #[test]
    fn test_secret_mount_rules() {
        let mut f = function("hello");
        f.spec.secret_mounts = vec![
            mount("", "relative/path"),
            mount("a", "/etc/a"),
            mount("b", "/etc/a/"),
        ];
        let problems = validate_function(&f, &FunctionConfig::default());
        assert_eq!(problems.len(), 3);
        assert!(problems[0].contains("secretName"));
        assert!(problems[1].contains("absolute"));
        assert!(problems[2].contains("more than once"));
    }

    #[test]
    fn test_label_rules() {
        let mut f = function("hello");
        f.spec.labels = BTreeMap::from([
            ("serverless.kyma-project.io/function-name".to_string(), "x".to_string()),
            ("bad key".to_string(), "x".to_string()),
            ("example.com/ok".to_string(), "bad value!".to_string()),
        ]);
        let problems = validate_function(&f, &FunctionConfig::default());
        assert_eq!(problems.len(), 3);
    }

    #[test]
    fn test_invalid_quantity() {
        let mut f = function("hello");
        f.spec.resource_configuration = Some(ResourceConfiguration {
            function: Some(FunctionResources {
                resources: Some(ResourceRequirements {
                    limits: BTreeMap::from([("memory".to_string(), "128Mi".to_string())]),
                    requests: BTreeMap::from([("cpu".to_string(), "lots".to_string())]),
                }),
            }),
        });
        let problems = validate_function(&f, &FunctionConfig::default());
        assert_eq!(problems, vec![r#"resources.requests.cpu has invalid quantity "lots""#]);
    }
}
