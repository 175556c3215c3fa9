//! The Docker-container-presence seam the load balancer probe reads
//! through, for the one detection case (C4's `ksail-cloud-provider-kind`
//! check) that has no Kubernetes-native representation.

use async_trait::async_trait;
use tokio::process::Command;

use crate::error::DetectorError;

#[async_trait]
pub trait DockerContainerProbe: Send + Sync {
    /// Whether a container named `name` exists (running or stopped).
    async fn container_exists(&self, name: &str) -> Result<bool, DetectorError>;
}

/// Production probe shelling out to the `docker` binary on `PATH`.
#[derive(Debug, Clone, Default)]
pub struct ShellDockerProbe;

#[async_trait]
impl DockerContainerProbe for ShellDockerProbe {
    async fn container_exists(&self, name: &str) -> Result<bool, DetectorError> {
        let output = Command::new("docker")
            .args(["container", "inspect", name])
            .output()
            .await
            .map_err(|err| DetectorError::Docker(err.to_string()))?;

        Ok(output.status.success())
    }
}
