use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use autocrane_types::{DataRepositoryManifest, PodDataRequestInfo, PodIdentifier, RepoVersionMap};

use crate::error::Error;

/// Loads the global version manifest (§4.3, §6).
#[async_trait]
pub trait ManifestFetcher: Send + Sync {
    async fn fetch(&self, cancel: &CancellationToken) -> Result<DataRepositoryManifest, Error>;
}

/// Reads every pod's data-request state for one namespace (§3, §6).
#[async_trait]
pub trait PodDataRequestGetter: Send + Sync {
    async fn get(&self, namespace: &str) -> Result<Vec<PodDataRequestInfo>, Error>;
}

/// Computes and persists the per-namespace known-good version set (§4.3).
#[async_trait]
pub trait KnownGoodAccessor: Send + Sync {
    async fn get_or_update(
        &self,
        namespace: &str,
        manifest: &DataRepositoryManifest,
        requests: &[PodDataRequestInfo],
        cancel: &CancellationToken,
    ) -> Result<RepoVersionMap, Error>;
}

/// Computes and persists the per-namespace latest (rollout target) version
/// set (§4.3).
#[async_trait]
pub trait LatestVersionAccessor: Send + Sync {
    async fn get_or_update(
        &self,
        namespace: &str,
        manifest: &DataRepositoryManifest,
        cancel: &CancellationToken,
    ) -> Result<RepoVersionMap, Error>;
}

/// Returns pods currently failing at least one watchdog probe in a namespace.
#[async_trait]
pub trait FailingPodGetter: Send + Sync {
    async fn get(&self, namespace: &str) -> Result<Vec<PodIdentifier>, Error>;
}

/// Writes a batch of annotations to a single pod, patch semantics (§5:
/// at most one call per pod per iteration, carrying every staged key).
#[async_trait]
pub trait PodAnnotationPutter: Send + Sync {
    async fn put(&self, pod: &PodIdentifier, annotations: &[(String, String)]) -> Result<(), Error>;
}

/// Requests eviction of a single pod.
#[async_trait]
pub trait PodEvicter: Send + Sync {
    async fn evict(&self, pod: &PodIdentifier) -> Result<(), Error>;
}

/// Garbage-collects workload-scoped objects past their TTL in a namespace.
#[async_trait]
pub trait ExpiredObjectDeleter: Send + Sync {
    async fn delete(&self, namespace: &str, now: DateTime<Utc>, cancel: &CancellationToken) -> Result<(), Error>;
}

/// Background lease-based leader election (§6). `start` spawns the renewal
/// task; `is_leader`/`is_completed` are polled once per iteration.
#[async_trait]
pub trait LeaderElection: Send + Sync {
    async fn start(&self, lease_name: &str, renew: std::time::Duration, cancel: CancellationToken) -> Result<(), Error>;

    fn is_leader(&self) -> bool;

    fn is_completed(&self) -> bool;
}
