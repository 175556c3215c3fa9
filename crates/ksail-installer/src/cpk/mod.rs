//! `CpkCoordinator` — the explicit replacement for the hidden
//! cloud-provider-kind lock-file singleton (§9 design note; Open Question
//! resolution recorded in `DESIGN.md`: Docker-container manager variant,
//! matching the `ksail-cloud-provider-kind` container name).

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::process::Command;

use crate::error::InstallerError;
use crate::installer::Installer;

const CONTAINER_NAME: &str = "ksail-cloud-provider-kind";
const IMAGE: &str = "registry.k8s.io/cloud-provider-kind/cloud-provider-kind:latest";

/// Manages the lifecycle of the `cloud-provider-kind` Docker container and
/// its lock file, injected into installers that need it rather than hidden
/// behind a process-wide global.
pub struct CpkCoordinator {
    lock_path: PathBuf,
}

impl CpkCoordinator {
    #[must_use]
    pub fn new() -> Self {
        Self {
            lock_path: std::env::temp_dir().join("cloud-provider-kind.lock"),
        }
    }

    #[must_use]
    pub fn with_lock_path(lock_path: PathBuf) -> Self {
        Self { lock_path }
    }

    /// Start the `cloud-provider-kind` container if it isn't already
    /// running, and write the lock file (`"<PID>\n"`, mode `0600`).
    pub async fn ensure_running(&self) -> Result<(), InstallerError> {
        if self.is_running().await? {
            return Ok(());
        }

        let output = Command::new("docker")
            .args([
                "run",
                "-d",
                "--name",
                CONTAINER_NAME,
                "--network",
                "host",
                "-v",
                "/var/run/docker.sock:/var/run/docker.sock",
                IMAGE,
            ])
            .output()
            .await
            .map_err(|err| InstallerError::CloudProviderKind(err.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(InstallerError::CloudProviderKind(format!(
                "starting {CONTAINER_NAME}: {stderr}"
            )));
        }

        self.write_lock_file()?;
        Ok(())
    }

    /// Stop and remove the `cloud-provider-kind` container, and clear the
    /// lock file.
    pub async fn ensure_stopped(&self) -> Result<(), InstallerError> {
        let _ = Command::new("docker")
            .args(["rm", "-f", CONTAINER_NAME])
            .output()
            .await
            .map_err(|err| InstallerError::CloudProviderKind(err.to_string()))?;

        if self.lock_path.exists() {
            std::fs::remove_file(&self.lock_path)
                .map_err(|err| InstallerError::CloudProviderKind(err.to_string()))?;
        }

        Ok(())
    }

    async fn is_running(&self) -> Result<bool, InstallerError> {
        let output = Command::new("docker")
            .args(["inspect", "-f", "{{.State.Running}}", CONTAINER_NAME])
            .output()
            .await
            .map_err(|err| InstallerError::CloudProviderKind(err.to_string()))?;

        if !output.status.success() {
            return Ok(false);
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim() == "true")
    }

    #[cfg(unix)]
    fn write_lock_file(&self) -> Result<(), InstallerError> {
        use std::os::unix::fs::PermissionsExt;

        let pid = std::process::id();
        std::fs::write(&self.lock_path, format!("{pid}\n"))
            .map_err(|err| InstallerError::CloudProviderKind(err.to_string()))?;
        std::fs::set_permissions(&self.lock_path, std::fs::Permissions::from_mode(0o600))
            .map_err(|err| InstallerError::CloudProviderKind(err.to_string()))?;
        Ok(())
    }

    #[cfg(not(unix))]
    fn write_lock_file(&self) -> Result<(), InstallerError> {
        let pid = std::process::id();
        std::fs::write(&self.lock_path, format!("{pid}\n"))
            .map_err(|err| InstallerError::CloudProviderKind(err.to_string()))
    }
}

impl Default for CpkCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

/// `Installer` for the cloud-provider-kind Docker container — the spec §9
/// Open Question resolution (DESIGN.md: Docker-container manager variant),
/// not a Helm chart, so it drives [`CpkCoordinator`] directly instead of
/// going through [`crate::helm_installer::HelmInstaller`].
pub struct CloudProviderKindInstaller {
    coordinator: CpkCoordinator,
}

impl CloudProviderKindInstaller {
    #[must_use]
    pub fn new(coordinator: CpkCoordinator) -> Self {
        Self { coordinator }
    }
}

impl Default for CloudProviderKindInstaller {
    fn default() -> Self {
        Self::new(CpkCoordinator::new())
    }
}

#[async_trait]
impl Installer for CloudProviderKindInstaller {
    async fn install(&self) -> Result<(), InstallerError> {
        self.coordinator.ensure_running().await
    }

    async fn uninstall(&self) -> Result<(), InstallerError> {
        self.coordinator.ensure_stopped().await
    }

    fn images(&self) -> Vec<String> {
        vec![IMAGE.to_string()]
    }

    async fn is_ready(&self) -> Result<bool, InstallerError> {
        self.coordinator.is_running().await
    }
}
