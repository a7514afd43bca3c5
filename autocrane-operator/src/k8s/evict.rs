use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;
use kube::{Api, Client, api::DeleteParams};

use autocrane_types::PodIdentifier;

use crate::collaborators::PodEvicter;
use crate::error::Error;

/// Requests a pod's removal by deleting it directly rather than going
/// through the `policy/v1` Eviction subresource — PodDisruptionBudgets are
/// not consulted. Acceptable here because the only caller is the
/// watchdog-failure eviction path (§4.4), which already requires `W=3`
/// consecutive failing iterations before firing.
pub struct KubePodEvicter {
    client: Client,
}

impl KubePodEvicter {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PodEvicter for KubePodEvicter {
    async fn evict(&self, pod: &PodIdentifier) -> Result<(), Error> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), &pod.namespace);
        api.delete(&pod.name, &DeleteParams::default()).await?;
        Ok(())
    }
}
