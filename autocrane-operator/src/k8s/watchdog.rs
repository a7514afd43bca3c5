use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;
use kube::{Api, Client, ResourceExt, api::ListParams};

use autocrane_types::PodIdentifier;

use crate::collaborators::FailingPodGetter;
use crate::error::Error;

/// Annotation a watchdog sidecar writes when a pod is unhealthy. Absence of
/// the annotation means healthy; the watchdog probe itself is out of scope
/// here (§1) — this collaborator only observes its output.
const WATCHDOG_FAILING_ANNOTATION: &str = "data.autocrane/watchdog-failing";

pub struct KubeFailingPodGetter {
    client: Client,
}

impl KubeFailingPodGetter {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl FailingPodGetter for KubeFailingPodGetter {
    async fn get(&self, namespace: &str) -> Result<Vec<PodIdentifier>, Error> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let pods = api.list(&ListParams::default()).await?;
        Ok(pods
            .items
            .into_iter()
            .filter(|pod| {
                pod.annotations()
                    .get(WATCHDOG_FAILING_ANNOTATION)
                    .is_some_and(|v| v == "true")
            })
            .map(|pod| PodIdentifier::new(namespace, pod.name_any()))
            .collect())
    }
}
