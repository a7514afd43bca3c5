use std::collections::HashMap;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::ConfigMap;
use kube::{
    Api, Client,
    api::{Patch, PatchParams},
};
use serde_json::json;
use tokio_util::sync::CancellationToken;

use autocrane_types::{DataRepositoryManifest, PodDataRequestInfo, RepoVersionMap};

use crate::collaborators::KnownGoodAccessor;
use crate::error::Error;
use crate::util::MANAGER_NAME;

/// Annotation on the per-namespace sentinel object holding the persisted
/// known-good map, JSON-encoded.
const KNOWN_GOOD_ANNOTATION: &str = "data.autocrane/known-good";

/// Name of the per-namespace sentinel ConfigMap known-good and latest are
/// persisted on.
pub const SENTINEL_CONFIGMAP_NAME: &str = "autocrane-versions";

/// Promotes a repo's known-good version once a strict majority of pods
/// that want it are already reporting it as their current request. This is
/// a conservative stand-in for "observed healthy" — `GetOrUpdate` is not
/// handed the failing-pod set, only `requests`, so the only signal
/// available here is what version pods have already converged on.
///
/// Falls back to the oldest manifest entry the first time a repo is seen
/// with no persisted known-good and no pod converged on anything yet.
pub struct KubeKnownGoodAccessor {
    client: Client,
}

impl KubeKnownGoodAccessor {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    async fn sentinel(&self, namespace: &str) -> Result<ConfigMap, Error> {
        get_or_create_sentinel(&self.client, namespace).await
    }
}

#[async_trait]
impl KnownGoodAccessor for KubeKnownGoodAccessor {
    async fn get_or_update(
        &self,
        namespace: &str,
        manifest: &DataRepositoryManifest,
        requests: &[PodDataRequestInfo],
        _cancel: &CancellationToken,
    ) -> Result<RepoVersionMap, Error> {
        let sentinel = self.sentinel(namespace).await?;
        let mut known_good = read_version_map(&sentinel, KNOWN_GOOD_ANNOTATION);

        let mut counts: HashMap<String, HashMap<String, usize>> = HashMap::new();
        for info in requests {
            for repo in &info.data_sources {
                if let Some(cur) = info.current_request(repo) {
                    *counts
                        .entry(repo.clone())
                        .or_default()
                        .entry(cur.hash)
                        .or_insert(0) += 1;
                }
            }
        }

        for (repo, entries) in manifest {
            if !known_good.contains_key(repo)
                && let Some(oldest) = entries.first()
            {
                known_good.insert(repo.clone(), oldest.version.clone());
            }
            let Some(per_version) = counts.get(repo) else {
                continue;
            };
            let total: usize = per_version.values().sum();
            if total == 0 {
                continue;
            }
            if let Some((version, count)) = per_version.iter().max_by_key(|(_, c)| *c)
                && *count * 2 > total
                && entries.iter().any(|e| &e.version == version)
            {
                known_good.insert(repo.clone(), version.clone());
            }
        }

        write_version_map(&self.client, namespace, KNOWN_GOOD_ANNOTATION, &known_good).await?;
        Ok(known_good)
    }
}

pub(crate) async fn get_or_create_sentinel(client: &Client, namespace: &str) -> Result<ConfigMap, Error> {
    let api: Api<ConfigMap> = Api::namespaced(client.clone(), namespace);
    match api.get_opt(SENTINEL_CONFIGMAP_NAME).await? {
        Some(cm) => Ok(cm),
        None => {
            let cm = ConfigMap {
                metadata: kube::api::ObjectMeta {
                    name: Some(SENTINEL_CONFIGMAP_NAME.to_string()),
                    namespace: Some(namespace.to_string()),
                    ..Default::default()
                },
                ..Default::default()
            };
            Ok(api.create(&kube::api::PostParams::default(), &cm).await?)
        }
    }
}

pub(crate) fn read_version_map(cm: &ConfigMap, key: &str) -> RepoVersionMap {
    cm.metadata
        .annotations
        .as_ref()
        .and_then(|a| a.get(key))
        .and_then(|raw| serde_json::from_str(raw).ok())
        .unwrap_or_default()
}

pub(crate) async fn write_version_map(
    client: &Client,
    namespace: &str,
    key: &str,
    map: &RepoVersionMap,
) -> Result<(), Error> {
    let api: Api<ConfigMap> = Api::namespaced(client.clone(), namespace);
    let encoded = serde_json::to_string(map)?;
    let patch = Patch::Merge(json!({
        "metadata": { "annotations": { key: encoded } }
    }));
    api.patch(
        SENTINEL_CONFIGMAP_NAME,
        &PatchParams::apply(MANAGER_NAME),
        &patch,
    )
    .await?;
    Ok(())
}
