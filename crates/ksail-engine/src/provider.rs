//! The `Provider` capability seam (spec §2: "Provider (ext.) — create
//! nodes"). Node/cluster provisioning is explicitly out of this crate's
//! scope — the spec treats it as an external collaborator the engine calls
//! into, the same way [`ksail_installer::HelmClient`] is injected rather
//! than implemented by the installer crate.

use async_trait::async_trait;
use ksail_spec::ClusterSpec;

use crate::error::EngineError;

/// A provisioned cluster node, as handed back by [`NodeProvisioner::create_nodes`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub name: String,
    pub address: String,
}

#[async_trait]
pub trait NodeProvisioner: Send + Sync {
    /// Create (or reuse) the nodes `spec` describes, then wait for the
    /// Kubernetes API server to become stable before returning.
    async fn create_nodes(&self, spec: &ClusterSpec) -> Result<Vec<Node>, EngineError>;

    /// Tear down every node `spec` describes.
    async fn delete_nodes(&self, spec: &ClusterSpec) -> Result<(), EngineError>;
}

/// A `NodeProvisioner` for clusters whose nodes already exist and are
/// addressed purely through `spec.connection` (kubeconfig/context) — `up`
/// and `down` become no-ops on the node-lifecycle step.
#[derive(Debug, Clone, Default)]
pub struct NoopNodeProvisioner;

#[async_trait]
impl NodeProvisioner for NoopNodeProvisioner {
    async fn create_nodes(&self, _spec: &ClusterSpec) -> Result<Vec<Node>, EngineError> {
        Ok(Vec::new())
    }

    async fn delete_nodes(&self, _spec: &ClusterSpec) -> Result<(), EngineError> {
        Ok(())
    }
}
