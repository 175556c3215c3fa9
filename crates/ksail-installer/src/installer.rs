//! The `Installer` capability set and the phase it belongs to.
//!
//! Modeled as §9's "capability set `{Install, Uninstall, Images}`", with
//! each concrete installer carrying whatever construction parameters its
//! own lifecycle needs (a `HelmClient` for [`crate::helm_installer::HelmInstaller`],
//! a [`crate::cpk::CpkCoordinator`] for [`crate::cpk::CloudProviderKindInstaller`])
//! rather than a shared context struct. Phase mapping is a table keyed by
//! installer key; do not embed phase in the installer itself.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::InstallerError;

/// Installation phases, executed strictly in order; teardown runs the
/// reverse order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    Cni,
    LoadBalancer,
    Csi,
    ObservabilityAndPolicy,
    GitOps,
}

impl Phase {
    #[must_use]
    pub fn all_in_order() -> [Self; 5] {
        [
            Self::Cni,
            Self::LoadBalancer,
            Self::Csi,
            Self::ObservabilityAndPolicy,
            Self::GitOps,
        ]
    }
}

/// Maps an installer key to its fixed phase. Intrinsic to the component
/// role, never carried by the installer value itself.
#[must_use]
pub fn phase_for(key: &str) -> Option<Phase> {
    match key {
        "cilium" | "calico" => Some(Phase::Cni),
        "cloud-provider-kind" | "metallb" | "hcloud-ccm" => Some(Phase::LoadBalancer),
        "local-path-storage" | "hetzner-csi" | "kubelet-csr-approver" => Some(Phase::Csi),
        "metrics-server" | "kyverno" | "gatekeeper" | "cert-manager" => {
            Some(Phase::ObservabilityAndPolicy)
        }
        "flux" | "argocd" => Some(Phase::GitOps),
        _ => None,
    }
}

#[async_trait]
pub trait Installer: Send + Sync {
    async fn install(&self) -> Result<(), InstallerError>;
    async fn uninstall(&self) -> Result<(), InstallerError>;
    /// Container images this installer will pull, for pre-pulling / airgap
    /// planning. Order is not significant; callers deduplicate and sort.
    fn images(&self) -> Vec<String>;
    /// Readiness predicate polled by the orchestrator after `install`
    /// succeeds, before the next phase starts.
    async fn is_ready(&self) -> Result<bool, InstallerError>;
    /// Poll interval for [`Installer::is_ready`]; 2s unless overridden.
    fn poll_interval(&self) -> Duration {
        Duration::from_secs(2)
    }
}

/// Deduplicated, sorted union of every installer's [`Installer::images`].
#[must_use]
pub fn get_images_from_installers(installers: &[(String, Arc<dyn Installer>)]) -> Vec<String> {
    let mut images: Vec<String> = installers
        .iter()
        .flat_map(|(_, installer)| installer.images())
        .collect();
    images.sort();
    images.dedup();
    images
}
