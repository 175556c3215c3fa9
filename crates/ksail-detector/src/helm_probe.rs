//! The Helm-release-presence seam detection probes read through.
//!
//! Grounded on `examples/5dlabs-cto/crates/installer` (re-targeted here as a
//! read-only `helm status` query rather than an install/upgrade capability —
//! detection never mutates a release, it only asks whether one exists).

use async_trait::async_trait;
use tokio::process::Command;

use crate::error::DetectorError;

#[async_trait]
pub trait HelmReleaseProbe: Send + Sync {
    /// Whether a release named `name` exists in `namespace`.
    async fn release_exists(&self, namespace: &str, name: &str) -> Result<bool, DetectorError>;
}

/// Production probe shelling out to the `helm` binary on `PATH`.
#[derive(Debug, Clone, Default)]
pub struct ShellHelmProbe;

#[async_trait]
impl HelmReleaseProbe for ShellHelmProbe {
    async fn release_exists(&self, namespace: &str, name: &str) -> Result<bool, DetectorError> {
        let output = Command::new("helm")
            .args(["status", name, "-n", namespace])
            .output()
            .await
            .map_err(|err| DetectorError::Helm {
                namespace: namespace.to_string(),
                name: name.to_string(),
                source: err.to_string(),
            })?;

        Ok(output.status.success())
    }
}
