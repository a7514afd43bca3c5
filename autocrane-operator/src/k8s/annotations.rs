use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;
use kube::{
    Api, Client,
    api::{Patch, PatchParams},
};
use serde_json::json;

use autocrane_types::PodIdentifier;

use crate::collaborators::PodAnnotationPutter;
use crate::error::Error;
use crate::util::MANAGER_NAME;

/// Writes a pod's staged annotation batch with a JSON merge patch, per §5's
/// "at most one annotation patch per pod per iteration" ordering guarantee.
pub struct KubePodAnnotationPutter {
    client: Client,
}

impl KubePodAnnotationPutter {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PodAnnotationPutter for KubePodAnnotationPutter {
    async fn put(&self, pod: &PodIdentifier, annotations: &[(String, String)]) -> Result<(), Error> {
        if annotations.is_empty() {
            return Ok(());
        }
        let api: Api<Pod> = Api::namespaced(self.client.clone(), &pod.namespace);
        let map: serde_json::Map<String, serde_json::Value> = annotations
            .iter()
            .map(|(k, v)| (k.clone(), json!(v)))
            .collect();
        let patch = Patch::Merge(json!({
            "metadata": { "annotations": serde_json::Value::Object(map) }
        }));
        api.patch(&pod.name, &PatchParams::apply(MANAGER_NAME), &patch)
            .await?;
        Ok(())
    }
}
