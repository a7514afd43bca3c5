use async_trait::async_trait;
use kube::Client;
use tokio_util::sync::CancellationToken;

use autocrane_types::{DataRepositoryManifest, RepoVersionMap};

use crate::collaborators::LatestVersionAccessor;
use crate::error::Error;

use super::known_good::{get_or_create_sentinel, read_version_map, write_version_map};

const LATEST_ANNOTATION: &str = "data.autocrane/latest";

/// Advances `latest[repo]` to the newest manifest entry for every repo seen
/// in the manifest; repos absent from the manifest keep whatever was
/// persisted previously.
pub struct KubeLatestVersionAccessor {
    client: Client,
}

impl KubeLatestVersionAccessor {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl LatestVersionAccessor for KubeLatestVersionAccessor {
    async fn get_or_update(
        &self,
        namespace: &str,
        manifest: &DataRepositoryManifest,
        _cancel: &CancellationToken,
    ) -> Result<RepoVersionMap, Error> {
        let sentinel = get_or_create_sentinel(&self.client, namespace).await?;
        let mut latest = read_version_map(&sentinel, LATEST_ANNOTATION);

        for (repo, entries) in manifest {
            if let Some(newest) = entries.last() {
                latest.insert(repo.clone(), newest.version.clone());
            }
        }

        write_version_map(&self.client, namespace, LATEST_ANNOTATION, &latest).await?;
        Ok(latest)
    }
}
