//! The `HelmClient` capability seam.
//!
//! Grounded on `examples/5dlabs-cto/crates/installer/src/installer/components.rs`'s
//! `Command::new("helm")` calls, lifted from synchronous `std::process::Command`
//! to `tokio::process::Command` so release queries, installs, and readiness
//! polling all run on the same async executor. Both the detector (C4) and
//! the installers (C5) query Helm release presence through this single
//! trait, so there is one source of truth for "is this release installed".

use async_trait::async_trait;
use tokio::process::Command;

use crate::error::InstallerError;

/// A Helm release value install/upgrade requires beyond name and chart.
#[derive(Debug, Clone, Default)]
pub struct ReleaseOptions {
    pub namespace: String,
    pub create_namespace: bool,
    pub values: Vec<(String, String)>,
    pub wait: bool,
}

#[async_trait]
pub trait HelmClient: Send + Sync {
    /// Whether a release named `name` exists in `namespace`, queried against
    /// Helm's own storage (Secrets by default) — not re-derived from scratch
    /// by the caller.
    async fn release_exists(&self, namespace: &str, name: &str) -> Result<bool, InstallerError>;

    async fn install_or_upgrade(
        &self,
        name: &str,
        chart: &str,
        opts: &ReleaseOptions,
    ) -> Result<(), InstallerError>;

    async fn uninstall_release(&self, namespace: &str, name: &str) -> Result<(), InstallerError>;

    async fn add_repository(&self, name: &str, url: &str) -> Result<(), InstallerError>;
}

/// Production `HelmClient` shelling out to the `helm` binary on `PATH`.
#[derive(Debug, Clone, Default)]
pub struct ShellHelmClient;

#[async_trait]
impl HelmClient for ShellHelmClient {
    async fn release_exists(&self, namespace: &str, name: &str) -> Result<bool, InstallerError> {
        let output = Command::new("helm")
            .args(["status", name, "-n", namespace])
            .output()
            .await
            .map_err(|err| InstallerError::Helm(err.to_string()))?;

        Ok(output.status.success())
    }

    async fn install_or_upgrade(
        &self,
        name: &str,
        chart: &str,
        opts: &ReleaseOptions,
    ) -> Result<(), InstallerError> {
        let mut args = vec![
            "upgrade".to_string(),
            "--install".to_string(),
            name.to_string(),
            chart.to_string(),
            "-n".to_string(),
            opts.namespace.clone(),
        ];
        if opts.create_namespace {
            args.push("--create-namespace".to_string());
        }
        if opts.wait {
            args.push("--wait".to_string());
        }
        for (key, value) in &opts.values {
            args.push("--set".to_string());
            args.push(format!("{key}={value}"));
        }

        let output = Command::new("helm")
            .args(&args)
            .output()
            .await
            .map_err(|err| InstallerError::Helm(err.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(InstallerError::Helm(format!(
                "install/upgrade {name}: {stderr}"
            )));
        }
        Ok(())
    }

    async fn uninstall_release(&self, namespace: &str, name: &str) -> Result<(), InstallerError> {
        let output = Command::new("helm")
            .args(["uninstall", name, "-n", namespace])
            .output()
            .await
            .map_err(|err| InstallerError::Helm(err.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if stderr.contains("not found") || stderr.contains("release: not found") {
                return Ok(());
            }
            return Err(InstallerError::Helm(format!(
                "uninstall {name}: {stderr}"
            )));
        }
        Ok(())
    }

    async fn add_repository(&self, name: &str, url: &str) -> Result<(), InstallerError> {
        let output = Command::new("helm")
            .args(["repo", "add", name, url])
            .output()
            .await
            .map_err(|err| InstallerError::Helm(err.to_string()))?;

        if output.status.success() {
            return Ok(());
        }

        let update = Command::new("helm")
            .args(["repo", "update"])
            .output()
            .await
            .map_err(|err| InstallerError::Helm(err.to_string()))?;

        if !update.status.success() {
            let stderr = String::from_utf8_lossy(&update.stderr);
            return Err(InstallerError::Helm(format!(
                "add repository {name}: {stderr}"
            )));
        }
        Ok(())
    }
}
