//! The one probe that queries the Kubernetes API directly rather than
//! Helm's release storage: the `local-path-provisioner` Deployment lookup
//! used when a distribution/provider pair doesn't ship CSI by default.
//!
//! Grounded on `examples/other_examples/6b948214_suremarc-computercraft__k8s-crates-controller-src-reconciler.rs.rs`'s
//! `Api::<Deployment>::namespaced` usage.

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use kube::{Api, Client};

use crate::error::DetectorError;

#[async_trait]
pub trait DeploymentProbe: Send + Sync {
    /// Whether Deployment `name` exists in `namespace`.
    async fn deployment_exists(&self, namespace: &str, name: &str) -> Result<bool, DetectorError>;
}

/// Production probe backed by a live `kube::Client`.
#[derive(Clone)]
pub struct KubeDeploymentProbe {
    client: Client,
}

impl KubeDeploymentProbe {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl DeploymentProbe for KubeDeploymentProbe {
    async fn deployment_exists(&self, namespace: &str, name: &str) -> Result<bool, DetectorError> {
        let api: Api<Deployment> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get_opt(name).await?.is_some())
    }
}
