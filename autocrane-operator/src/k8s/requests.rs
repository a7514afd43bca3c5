use std::collections::HashMap;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;
use kube::{Api, Client, ResourceExt, api::ListParams};

use autocrane_types::{PodDataRequestInfo, PodIdentifier, request_annotation_key};

use crate::collaborators::PodDataRequestGetter;
use crate::error::Error;

/// Annotation carrying a pod's comma-separated repo wantlist. Not part of
/// the bit-exact request-key contract (§6); the orchestrator only reads it.
const DATA_SOURCES_ANNOTATION: &str = "data.autocrane/data-sources";

/// Annotation carrying the pod's drop folder path.
const DROP_FOLDER_ANNOTATION: &str = "data.autocrane/drop-folder";

pub struct KubePodDataRequestGetter {
    client: Client,
}

impl KubePodDataRequestGetter {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PodDataRequestGetter for KubePodDataRequestGetter {
    async fn get(&self, namespace: &str) -> Result<Vec<PodDataRequestInfo>, Error> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let pods = api.list(&ListParams::default()).await?;
        let mut out = Vec::with_capacity(pods.items.len());
        for pod in pods.items {
            let name = pod.name_any();
            let annotations = pod.annotations();
            let data_sources: Vec<String> = annotations
                .get(DATA_SOURCES_ANNOTATION)
                .map(|v| v.split(',').map(str::trim).filter(|s| !s.is_empty()).map(str::to_string).collect())
                .unwrap_or_default();
            let drop_folder = annotations.get(DROP_FOLDER_ANNOTATION).cloned().unwrap_or_default();
            let mut requests = HashMap::new();
            for repo in &data_sources {
                if let Some(raw) = annotations.get(&request_annotation_key(repo)) {
                    requests.insert(repo.clone(), raw.clone());
                }
            }
            out.push(PodDataRequestInfo {
                id: PodIdentifier::new(namespace, name),
                drop_folder,
                data_sources,
                requests,
            });
        }
        Ok(out)
    }
}
