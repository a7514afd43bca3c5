use clap::Parser;

/// Command-line/env configuration surface (§6).
#[derive(Parser, Debug, Clone)]
#[command(name = "autocrane", about = "Rolling data-version upgrade and watchdog eviction controller")]
pub struct Args {
    /// Comma-separated namespaces to control. Non-empty required.
    #[arg(long, env = "NAMESPACES")]
    pub namespaces: String,

    /// Control-loop iteration period, in seconds.
    #[arg(long, env = "ITERATION_SECONDS", default_value_t = 60)]
    pub iteration_seconds: u64,

    /// Consecutive-iteration error budget before the loop exits.
    #[arg(long, env = "CONSECUTIVE_ERROR_LIMIT", default_value_t = 5)]
    pub consecutive_error_limit: u32,

    /// Consecutive failing iterations before a pod is evicted.
    #[arg(long, env = "WATCHDOG_FAILURES_BEFORE_EVICTION", default_value_t = 3)]
    pub watchdog_failures_before_eviction: usize,

    /// Namespace the leader-election lease itself lives in.
    #[arg(long, env = "LEASE_NAMESPACE", default_value = "default")]
    pub lease_namespace: String,

    /// Namespace and name of the manifest ConfigMap.
    #[arg(long, env = "MANIFEST_NAMESPACE", default_value = "default")]
    pub manifest_namespace: String,

    #[arg(long, env = "MANIFEST_CONFIGMAP", default_value = "autocrane-manifest")]
    pub manifest_configmap: String,

    /// Leader lease renewal period, in seconds. Defaults to the spec-mandated
    /// `30s` (§4.1: "renewal period `30s`"), not the teacher's own `5s`.
    #[arg(long, env = "LEASE_RENEW_SECONDS", default_value_t = 30)]
    pub lease_renew_seconds: u64,

    /// Leader lease TTL, in seconds. Kept at the teacher's 3x-renewal ratio
    /// (`clusters/reconcile.rs`'s `lease_ttl = 15s` over `renew_every = 5s`)
    /// scaled to the spec's 30s renewal period.
    #[arg(long, env = "LEASE_TTL_SECONDS", default_value_t = 90)]
    pub lease_ttl_seconds: u64,
}
