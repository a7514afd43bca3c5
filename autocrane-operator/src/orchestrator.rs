use std::collections::HashSet;
use std::sync::Arc;

use owo_colors::OwoColorize;
use tokio_util::sync::CancellationToken;

use autocrane_types::{PodIdentifier, encode_request, request_annotation_key};

use crate::clock::Clock;
use crate::collaborators::{
    ExpiredObjectDeleter, FailingPodGetter, KnownGoodAccessor, LatestVersionAccessor, LeaderElection,
    ManifestFetcher, PodAnnotationPutter, PodDataRequestGetter, PodEvicter,
};
use crate::config::{Config, LEADER_LEASE};
use crate::error::Error;
use crate::oracle::UpgradeOracle;
use crate::util::colors::{FG1, FG2};
use crate::window::FailureWindow;

/// Composes every collaborator on the fixed-period control loop (§4.1, §5).
pub struct Orchestrator {
    config: Config,
    clock: Arc<dyn Clock>,
    manifest_fetcher: Arc<dyn ManifestFetcher>,
    pod_data_request_getter: Arc<dyn PodDataRequestGetter>,
    known_good: Arc<dyn KnownGoodAccessor>,
    latest: Arc<dyn LatestVersionAccessor>,
    failing_pod_getter: Arc<dyn FailingPodGetter>,
    annotation_putter: Arc<dyn PodAnnotationPutter>,
    evicter: Arc<dyn PodEvicter>,
    expired_deleter: Arc<dyn ExpiredObjectDeleter>,
    leader_election: Arc<dyn LeaderElection>,
}

impl Orchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: Config,
        clock: Arc<dyn Clock>,
        manifest_fetcher: Arc<dyn ManifestFetcher>,
        pod_data_request_getter: Arc<dyn PodDataRequestGetter>,
        known_good: Arc<dyn KnownGoodAccessor>,
        latest: Arc<dyn LatestVersionAccessor>,
        failing_pod_getter: Arc<dyn FailingPodGetter>,
        annotation_putter: Arc<dyn PodAnnotationPutter>,
        evicter: Arc<dyn PodEvicter>,
        expired_deleter: Arc<dyn ExpiredObjectDeleter>,
        leader_election: Arc<dyn LeaderElection>,
    ) -> Self {
        Self {
            config,
            clock,
            manifest_fetcher,
            pod_data_request_getter,
            known_good,
            latest,
            failing_pod_getter,
            annotation_putter,
            evicter,
            expired_deleter,
            leader_election,
        }
    }

    /// Runs until cancelled or a terminal condition is reached (§4.1). The
    /// returned value is the process exit code (§6).
    pub async fn run(&self, cancel: CancellationToken) -> i32 {
        if let Err(e) = self
            .leader_election
            .start(LEADER_LEASE, self.config.lease_renew, cancel.clone())
            .await
        {
            eprintln!("{}", format!("failed to start leader election: {e}").color(FG1));
            return 3;
        }

        let mut window = FailureWindow::new(self.config.watchdog_failures_before_eviction);
        let mut consecutive_errors: u32 = 0;

        loop {
            if self.leader_election.is_completed() {
                eprintln!("{}", "leader election task completed unexpectedly".color(FG1));
                return 3;
            }
            if consecutive_errors > self.config.consecutive_error_limit {
                eprintln!("{}", "consecutive error limit exceeded".color(FG1));
                return 2;
            }
            if cancel.is_cancelled() {
                return 0;
            }

            if self.leader_election.is_leader() {
                match self.process_iteration(&cancel, &mut window).await {
                    Ok(()) => consecutive_errors = 0,
                    Err(e) => {
                        eprintln!("{}", format!("iteration failed: {e}").color(FG1));
                        consecutive_errors += 1;
                    }
                }
                self.cleanup_expired(&cancel).await;
            } else {
                println!("{}", "not leader".color(FG2));
            }

            tokio::select! {
                _ = cancel.cancelled() => return 0,
                _ = tokio::time::sleep(self.config.iteration_period) => {}
            }
        }
    }

    /// One full pass over every configured namespace (§4.1). Errors from any
    /// namespace propagate immediately — the next iteration retries from
    /// scratch rather than resuming mid-pass.
    pub(crate) async fn process_iteration(
        &self,
        cancel: &CancellationToken,
        window: &mut FailureWindow,
    ) -> Result<(), Error> {
        let manifest = self.manifest_fetcher.fetch(cancel).await?;
        let mut iteration_failing: HashSet<PodIdentifier> = HashSet::new();

        for namespace in &self.config.namespaces {
            let requests = self.pod_data_request_getter.get(namespace).await?;
            let known_good = self
                .known_good
                .get_or_update(namespace, &manifest, &requests, cancel)
                .await?;
            let latest = self.latest.get_or_update(namespace, &manifest, cancel).await?;
            let oracle = UpgradeOracle::new(known_good, latest, &requests);

            for info in &requests {
                let mut batch = Vec::new();
                for repo in &info.data_sources {
                    let current_raw = info.requests.get(repo).map(String::as_str);
                    if let Some(mut details) = oracle.get_data_request(&info.id, repo, current_raw) {
                        details.unix_timestamp_seconds = self.clock.now_unix_seconds();
                        batch.push((request_annotation_key(repo), encode_request(&details)));
                    }
                }
                if !batch.is_empty() {
                    self.annotation_putter.put(&info.id, &batch).await?;
                }
            }

            let failing = self.failing_pod_getter.get(namespace).await?;
            iteration_failing.extend(failing);
        }

        window.push(iteration_failing);
        if window.is_full() {
            let to_evict = window.intersection();
            let evictions = to_evict.into_iter().map(|pod| {
                let evicter = self.evicter.clone();
                async move {
                    if let Err(e) = evicter.evict(&pod).await {
                        eprintln!("{}", format!("eviction failed for {pod}: {e}").color(FG1));
                    }
                }
            });
            futures::future::join_all(evictions).await;
        }

        Ok(())
    }

    /// GCs expired objects in every namespace. Logged, never counted toward
    /// the consecutive-error budget (§4.1, §7).
    async fn cleanup_expired(&self, cancel: &CancellationToken) {
        let now = self.clock.now();
        for namespace in &self.config.namespaces {
            if let Err(e) = self.expired_deleter.delete(namespace, now, cancel).await {
                eprintln!("{}", format!("expired-object cleanup failed in {namespace}: {e}").color(FG1));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use std::collections::HashMap;
    use std::sync::Mutex;

    use autocrane_types::{DataDownloadRequestDetails, DataRepositoryManifest, ManifestEntry, PodDataRequestInfo, RepoVersionMap};

    use crate::clock::FixedClock;

    struct FakeManifest(DataRepositoryManifest);
    #[async_trait]
    impl ManifestFetcher for FakeManifest {
        async fn fetch(&self, _cancel: &CancellationToken) -> Result<DataRepositoryManifest, Error> {
            Ok(self.0.clone())
        }
    }

    struct FakeRequests(HashMap<String, Vec<PodDataRequestInfo>>);
    #[async_trait]
    impl PodDataRequestGetter for FakeRequests {
        async fn get(&self, namespace: &str) -> Result<Vec<PodDataRequestInfo>, Error> {
            Ok(self.0.get(namespace).cloned().unwrap_or_default())
        }
    }

    struct FakeKnownGood(RepoVersionMap);
    #[async_trait]
    impl KnownGoodAccessor for FakeKnownGood {
        async fn get_or_update(
            &self,
            _namespace: &str,
            _manifest: &DataRepositoryManifest,
            _requests: &[PodDataRequestInfo],
            _cancel: &CancellationToken,
        ) -> Result<RepoVersionMap, Error> {
            Ok(self.0.clone())
        }
    }

    struct FakeLatest(RepoVersionMap);
    #[async_trait]
    impl LatestVersionAccessor for FakeLatest {
        async fn get_or_update(
            &self,
            _namespace: &str,
            _manifest: &DataRepositoryManifest,
            _cancel: &CancellationToken,
        ) -> Result<RepoVersionMap, Error> {
            Ok(self.0.clone())
        }
    }

    struct FakeFailing(Mutex<Vec<PodIdentifier>>);
    #[async_trait]
    impl FailingPodGetter for FakeFailing {
        async fn get(&self, _namespace: &str) -> Result<Vec<PodIdentifier>, Error> {
            Ok(self.0.lock().unwrap().clone())
        }
    }

    #[derive(Default)]
    struct FakeAnnotationPutter {
        calls: Mutex<HashMap<PodIdentifier, Vec<Vec<(String, String)>>>>,
    }
    #[async_trait]
    impl PodAnnotationPutter for FakeAnnotationPutter {
        async fn put(&self, pod: &PodIdentifier, annotations: &[(String, String)]) -> Result<(), Error> {
            self.calls
                .lock()
                .unwrap()
                .entry(pod.clone())
                .or_default()
                .push(annotations.to_vec());
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeEvicter {
        evicted: Mutex<Vec<PodIdentifier>>,
    }
    #[async_trait]
    impl PodEvicter for FakeEvicter {
        async fn evict(&self, pod: &PodIdentifier) -> Result<(), Error> {
            self.evicted.lock().unwrap().push(pod.clone());
            Ok(())
        }
    }

    struct NoopExpiredDeleter;
    #[async_trait]
    impl ExpiredObjectDeleter for NoopExpiredDeleter {
        async fn delete(&self, _namespace: &str, _now: DateTime<Utc>, _cancel: &CancellationToken) -> Result<(), Error> {
            Ok(())
        }
    }

    fn manifest() -> DataRepositoryManifest {
        DataRepositoryManifest::from([(
            "repo-a".to_string(),
            vec![
                ManifestEntry { version: "v1".to_string(), timestamp: 1 },
                ManifestEntry { version: "v2".to_string(), timestamp: 2 },
            ],
        )])
    }

    fn pod(name: &str, current: Option<&str>) -> PodDataRequestInfo {
        let mut requests = HashMap::new();
        if let Some(v) = current {
            requests.insert(
                "repo-a".to_string(),
                encode_request(&DataDownloadRequestDetails {
                    hash: v.to_string(),
                    path: "repo-a".to_string(),
                    unix_timestamp_seconds: 0,
                }),
            );
        }
        PodDataRequestInfo {
            id: PodIdentifier::new("ns1", name),
            drop_folder: "/drop".to_string(),
            data_sources: vec!["repo-a".to_string()],
            requests,
        }
    }

    #[tokio::test]
    async fn single_patch_per_pod_carries_every_staged_annotation() {
        let requests = vec![pod("p1", Some("v1"))];
        let putter = Arc::new(FakeAnnotationPutter::default());
        let orchestrator = Orchestrator::new(
            Config {
                namespaces: vec!["ns1".to_string()],
                iteration_period: std::time::Duration::from_secs(60),
                consecutive_error_limit: 5,
                watchdog_failures_before_eviction: 3,
                lease_namespace: "default".to_string(),
                manifest_namespace: "default".to_string(),
                manifest_configmap: "autocrane-manifest".to_string(),
                lease_renew: std::time::Duration::from_secs(5),
                lease_ttl: std::time::Duration::from_secs(15),
            },
            Arc::new(FixedClock(DateTime::from_timestamp(1_700_000_000, 0).unwrap())),
            Arc::new(FakeManifest(manifest())),
            Arc::new(FakeRequests(HashMap::from([("ns1".to_string(), requests)]))),
            Arc::new(FakeKnownGood(RepoVersionMap::from([("repo-a".to_string(), "v1".to_string())]))),
            Arc::new(FakeLatest(RepoVersionMap::from([("repo-a".to_string(), "v2".to_string())]))),
            Arc::new(FakeFailing(Mutex::new(Vec::new()))),
            putter.clone(),
            Arc::new(FakeEvicter::default()),
            Arc::new(NoopExpiredDeleter),
            Arc::new(AlwaysLeader),
        );

        let mut window = FailureWindow::new(3);
        let cancel = CancellationToken::new();
        orchestrator.process_iteration(&cancel, &mut window).await.unwrap();

        let calls = putter.calls.lock().unwrap();
        let pod_calls = calls.get(&PodIdentifier::new("ns1", "p1")).unwrap();
        assert_eq!(pod_calls.len(), 1);
        assert_eq!(pod_calls[0].len(), 1);
        assert_eq!(pod_calls[0][0].0, request_annotation_key("repo-a"));
    }

    #[tokio::test]
    async fn eviction_fires_on_third_consecutive_failing_iteration() {
        let failing = Arc::new(FakeFailing(Mutex::new(vec![PodIdentifier::new("ns1", "p1")])));
        let evicter = Arc::new(FakeEvicter::default());
        let orchestrator = Orchestrator::new(
            Config {
                namespaces: vec!["ns1".to_string()],
                iteration_period: std::time::Duration::from_secs(60),
                consecutive_error_limit: 5,
                watchdog_failures_before_eviction: 3,
                lease_namespace: "default".to_string(),
                manifest_namespace: "default".to_string(),
                manifest_configmap: "autocrane-manifest".to_string(),
                lease_renew: std::time::Duration::from_secs(5),
                lease_ttl: std::time::Duration::from_secs(15),
            },
            Arc::new(FixedClock(DateTime::from_timestamp(1_700_000_000, 0).unwrap())),
            Arc::new(FakeManifest(manifest())),
            Arc::new(FakeRequests(HashMap::from([("ns1".to_string(), Vec::new())]))),
            Arc::new(FakeKnownGood(RepoVersionMap::new())),
            Arc::new(FakeLatest(RepoVersionMap::new())),
            failing,
            Arc::new(FakeAnnotationPutter::default()),
            evicter.clone(),
            Arc::new(NoopExpiredDeleter),
            Arc::new(AlwaysLeader),
        );

        let mut window = FailureWindow::new(3);
        let cancel = CancellationToken::new();
        for _ in 0..2 {
            orchestrator.process_iteration(&cancel, &mut window).await.unwrap();
            assert!(evicter.evicted.lock().unwrap().is_empty());
        }
        orchestrator.process_iteration(&cancel, &mut window).await.unwrap();
        assert_eq!(evicter.evicted.lock().unwrap().as_slice(), &[PodIdentifier::new("ns1", "p1")]);
    }

    #[tokio::test]
    async fn non_leader_never_invokes_mutating_collaborators() {
        // Property 7: when IsLeader=false, no mutating collaborator runs.
        // The manifest fetcher panics if called at all, which would blow up
        // `process_iteration` before any mutation could happen; `run` must
        // never reach that call while `is_leader()` is false.
        struct PanicIfCalled;
        #[async_trait]
        impl ManifestFetcher for PanicIfCalled {
            async fn fetch(&self, _cancel: &CancellationToken) -> Result<DataRepositoryManifest, Error> {
                panic!("manifest fetcher must not be called while not leader");
            }
        }

        let orchestrator = Orchestrator::new(
            Config {
                namespaces: vec!["ns1".to_string()],
                iteration_period: std::time::Duration::from_millis(10),
                consecutive_error_limit: 5,
                watchdog_failures_before_eviction: 3,
                lease_namespace: "default".to_string(),
                manifest_namespace: "default".to_string(),
                manifest_configmap: "autocrane-manifest".to_string(),
                lease_renew: std::time::Duration::from_secs(5),
                lease_ttl: std::time::Duration::from_secs(15),
            },
            Arc::new(FixedClock(DateTime::from_timestamp(1_700_000_000, 0).unwrap())),
            Arc::new(PanicIfCalled),
            Arc::new(FakeRequests(HashMap::new())),
            Arc::new(FakeKnownGood(RepoVersionMap::new())),
            Arc::new(FakeLatest(RepoVersionMap::new())),
            Arc::new(FakeFailing(Mutex::new(Vec::new()))),
            Arc::new(FakeAnnotationPutter::default()),
            Arc::new(FakeEvicter::default()),
            Arc::new(NoopExpiredDeleter),
            Arc::new(NeverLeader),
        );

        let cancel = CancellationToken::new();
        let cancel_after = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(30)).await;
            cancel_after.cancel();
        });
        let exit_code = orchestrator.run(cancel).await;
        assert_eq!(exit_code, 0);
    }

    struct AlwaysLeader;
    #[async_trait]
    impl LeaderElection for AlwaysLeader {
        async fn start(&self, _lease_name: &str, _renew: std::time::Duration, _cancel: CancellationToken) -> Result<(), Error> {
            Ok(())
        }
        fn is_leader(&self) -> bool {
            true
        }
        fn is_completed(&self) -> bool {
            false
        }
    }

    struct NeverLeader;
    #[async_trait]
    impl LeaderElection for NeverLeader {
        async fn start(&self, _lease_name: &str, _renew: std::time::Duration, _cancel: CancellationToken) -> Result<(), Error> {
            Ok(())
        }
        fn is_leader(&self) -> bool {
            false
        }
        fn is_completed(&self) -> bool {
            false
        }
    }
}
