//! # Constants
//!
//! Default values shared by configuration, controllers and the HTTP server.

/// Name reported as the event source and field manager
pub const CONTROLLER_NAME: &str = "serverless-operator";

/// Finalizer guarding chart removal for Serverless resources
pub const DEFAULT_SERVERLESS_FINALIZER: &str = "serverless-manager.kyma-project.io/deletion-hook";

/// Directory holding the pre-rendered module chart
pub const DEFAULT_CHART_PATH: &str = "/module-chart";

/// Namespace the module chart is installed into
pub const DEFAULT_OPERATOR_NAMESPACE: &str = "kyma-system";

/// Upper bound for a single reconciliation pass
pub const DEFAULT_RECONCILE_TIMEOUT_SECS: u64 = 60;

/// Poll interval while chart workloads roll out
pub const DEFAULT_VERIFY_REQUEUE_SECS: u64 = 10;

/// Poll interval after a Function's Deployment was created
pub const DEFAULT_CREATED_REQUEUE_SECS: u64 = 60;

/// Error backoff bounds (seconds)
pub const DEFAULT_ERROR_BACKOFF_MIN_SECS: u64 = 1;
pub const DEFAULT_ERROR_BACKOFF_MAX_SECS: u64 = 300;

/// Fallback requeue when backoff state cannot be read
pub const DEFAULT_RECONCILIATION_ERROR_REQUEUE_SECS: u64 = 60;

/// Default port for metrics and probes
pub const DEFAULT_METRICS_PORT: u16 = 8080;

/// Server startup timeout (seconds)
pub const DEFAULT_SERVER_STARTUP_TIMEOUT_SECS: u64 = 10;

/// Server readiness poll interval (milliseconds)
pub const DEFAULT_SERVER_POLL_INTERVAL_MS: u64 = 50;

/// Default runtime images
pub const DEFAULT_NODEJS20_IMAGE: &str =
    "europe-docker.pkg.dev/kyma-project/prod/function-runtime-nodejs20:main";
pub const DEFAULT_PYTHON312_IMAGE: &str =
    "europe-docker.pkg.dev/kyma-project/prod/function-runtime-python312:main";

/// Endpoints used when a Serverless resource leaves them unset
pub const DEFAULT_PUBLISHER_PROXY_URL: &str =
    "http://eventing-publisher-proxy.kyma-system.svc.cluster.local/publish";
pub const DEFAULT_TRACE_COLLECTOR_URL: &str =
    "http://telemetry-otlp-traces.kyma-system.svc.cluster.local:4318/v1/traces";
