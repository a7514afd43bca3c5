use async_trait::async_trait;
use chrono::{DateTime, Utc};
use k8s_openapi::api::core::v1::ConfigMap;
use kube::{
    Api, Client, ResourceExt,
    api::{DeleteParams, ListParams},
};
use tokio_util::sync::CancellationToken;

use crate::collaborators::ExpiredObjectDeleter;
use crate::error::Error;

/// Annotation a workload-scoped object carries its own TTL under, as a unix
/// timestamp in seconds.
const EXPIRES_AT_ANNOTATION: &str = "data.autocrane/expires-at";

/// Deletes workload-scoped ConfigMaps past their `expires-at` annotation.
/// The sentinel version-tracking ConfigMap (§4.3) never carries this
/// annotation and is therefore never a GC candidate.
pub struct KubeExpiredObjectDeleter {
    client: Client,
}

impl KubeExpiredObjectDeleter {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ExpiredObjectDeleter for KubeExpiredObjectDeleter {
    async fn delete(&self, namespace: &str, now: DateTime<Utc>, _cancel: &CancellationToken) -> Result<(), Error> {
        let api: Api<ConfigMap> = Api::namespaced(self.client.clone(), namespace);
        let list = api.list(&ListParams::default()).await?;
        for cm in list.items {
            let Some(expires_at) = cm
                .annotations()
                .get(EXPIRES_AT_ANNOTATION)
                .and_then(|v| v.parse::<i64>().ok())
            else {
                continue;
            };
            if expires_at <= now.timestamp() {
                api.delete(&cm.name_any(), &DeleteParams::default()).await?;
            }
        }
        Ok(())
    }
}
