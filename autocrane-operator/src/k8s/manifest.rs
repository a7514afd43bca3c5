use async_trait::async_trait;
use k8s_openapi::api::core::v1::ConfigMap;
use kube::{Api, Client};
use tokio_util::sync::CancellationToken;

use autocrane_types::{DataRepositoryManifest, ManifestEntry};

use crate::collaborators::ManifestFetcher;
use crate::error::Error;

/// The manifest is authored cluster-wide (not per-namespace) as a single
/// ConfigMap; each data key holds a repo name, each value a JSON array of
/// `{version, timestamp}` entries newest-last.
pub struct ConfigMapManifestFetcher {
    client: Client,
    namespace: String,
    name: String,
}

impl ConfigMapManifestFetcher {
    pub fn new(client: Client, namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            client,
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

#[async_trait]
impl ManifestFetcher for ConfigMapManifestFetcher {
    async fn fetch(&self, _cancel: &CancellationToken) -> Result<DataRepositoryManifest, Error> {
        let api: Api<ConfigMap> = Api::namespaced(self.client.clone(), &self.namespace);
        let cm = api.get(&self.name).await?;
        let data = cm.data.unwrap_or_default();
        let mut manifest = DataRepositoryManifest::new();
        for (repo, raw) in data {
            let entries: Vec<ManifestEntry> = serde_json::from_str(&raw)?;
            manifest.insert(repo, entries);
        }
        Ok(manifest)
    }
}
