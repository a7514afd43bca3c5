use std::time::Duration;

use crate::args::Args;
use crate::error::Error;

/// Fixed lease name for the control-loop leader election (§4.1, §6).
pub const LEADER_LEASE: &str = "acleaderorchestrate";

/// Validated, loop-ready configuration derived from [`Args`].
#[derive(Debug, Clone)]
pub struct Config {
    pub namespaces: Vec<String>,
    pub iteration_period: Duration,
    pub consecutive_error_limit: u32,
    pub watchdog_failures_before_eviction: usize,
    pub lease_namespace: String,
    pub manifest_namespace: String,
    pub manifest_configmap: String,
    pub lease_renew: Duration,
    pub lease_ttl: Duration,
}

impl Config {
    /// Fails with [`Error::Config`] if no namespaces are configured — the
    /// caller maps this to exit code `3` at startup (§4.1, §6).
    pub fn from_args(args: Args) -> Result<Self, Error> {
        let namespaces: Vec<String> = args
            .namespaces
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        if namespaces.is_empty() {
            return Err(Error::Config("NAMESPACES must list at least one namespace".to_string()));
        }
        Ok(Self {
            namespaces,
            iteration_period: Duration::from_secs(args.iteration_seconds),
            consecutive_error_limit: args.consecutive_error_limit,
            watchdog_failures_before_eviction: args.watchdog_failures_before_eviction,
            lease_namespace: args.lease_namespace,
            manifest_namespace: args.manifest_namespace,
            manifest_configmap: args.manifest_configmap,
            lease_renew: Duration::from_secs(args.lease_renew_seconds),
            lease_ttl: Duration::from_secs(args.lease_ttl_seconds),
        })
    }
}
