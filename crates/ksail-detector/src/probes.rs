//! One probe function per `ClusterSpec` field (spec §9 design note: "avoid
//! reflection-based inspect and guess — encode as one probe function per
//! field"). Release/namespace/container names are the same ones
//! `ksail_installer::factory::build` installs under, so detection and
//! installation agree on what "cilium is installed" means.

use ksail_spec::{Cni, Distribution, GitOpsEngine, PolicyEngine, Provider, Tristate};

use crate::docker_probe::DockerContainerProbe;
use crate::error::DetectorError;
use crate::helm_probe::HelmReleaseProbe;
use crate::kube_probe::DeploymentProbe;

const CLOUD_PROVIDER_KIND_CONTAINER: &str = "ksail-cloud-provider-kind";

/// Cilium (`cilium/kube-system`) or Calico (`calico/tigera-operator`) Helm
/// release presence; `Cni::Default` if neither is installed.
pub async fn detect_cni(helm: &dyn HelmReleaseProbe) -> Result<Cni, DetectorError> {
    if helm.release_exists("kube-system", "cilium").await? {
        return Ok(Cni::Cilium);
    }
    if helm.release_exists("tigera-operator", "calico").await? {
        return Ok(Cni::Calico);
    }
    Ok(Cni::Default)
}

/// `Tristate::Default` when the distribution/provider pair provides CSI out
/// of the box; otherwise probes `hcloud-csi` for talos+hetzner or the
/// `local-path-provisioner` Deployment everywhere else.
pub async fn detect_csi(
    distribution: Distribution,
    provider: Provider,
    helm: &dyn HelmReleaseProbe,
    deployments: &dyn DeploymentProbe,
) -> Result<Tristate, DetectorError> {
    if ksail_spec::provides_csi_by_default(distribution, provider) {
        return Ok(Tristate::Default);
    }

    let present = if distribution == Distribution::Talos && provider == Provider::Hetzner {
        helm.release_exists("kube-system", "hcloud-csi").await?
    } else {
        deployments
            .deployment_exists("local-path-storage", "local-path-provisioner")
            .await?
    };

    Ok(if present {
        Tristate::Enabled
    } else {
        Tristate::Disabled
    })
}

/// `metrics-server/kube-system` Helm release presence; `Default` if absent
/// but the distribution provides one out of the box.
pub async fn detect_metrics_server(
    distribution: Distribution,
    provider: Provider,
    helm: &dyn HelmReleaseProbe,
) -> Result<Tristate, DetectorError> {
    if helm.release_exists("kube-system", "metrics-server").await? {
        return Ok(Tristate::Enabled);
    }
    if ksail_spec::provides_metrics_server_by_default(distribution, provider) {
        return Ok(Tristate::Default);
    }
    Ok(Tristate::Disabled)
}

/// `ksail-cloud-provider-kind` Docker container (vanilla+docker only), then
/// `metallb/metallb-system` Helm release; `Default` otherwise.
pub async fn detect_load_balancer(
    distribution: Distribution,
    provider: Provider,
    helm: &dyn HelmReleaseProbe,
    docker: &dyn DockerContainerProbe,
) -> Result<Tristate, DetectorError> {
    if distribution == Distribution::Vanilla
        && provider == Provider::Docker
        && docker.container_exists(CLOUD_PROVIDER_KIND_CONTAINER).await?
    {
        return Ok(Tristate::Enabled);
    }

    if helm.release_exists("metallb-system", "metallb").await? {
        return Ok(Tristate::Enabled);
    }

    Ok(Tristate::Default)
}

/// `cert-manager/cert-manager` Helm release presence.
pub async fn detect_cert_manager(helm: &dyn HelmReleaseProbe) -> Result<Tristate, DetectorError> {
    Ok(if helm.release_exists("cert-manager", "cert-manager").await? {
        Tristate::Enabled
    } else {
        Tristate::Disabled
    })
}

/// `kyverno/kyverno` or `gatekeeper/gatekeeper-system` Helm release presence.
pub async fn detect_policy_engine(helm: &dyn HelmReleaseProbe) -> Result<PolicyEngine, DetectorError> {
    if helm.release_exists("kyverno", "kyverno").await? {
        return Ok(PolicyEngine::Kyverno);
    }
    if helm.release_exists("gatekeeper-system", "gatekeeper").await? {
        return Ok(PolicyEngine::Gatekeeper);
    }
    Ok(PolicyEngine::None)
}

/// `flux-operator/flux-system` or `argocd/argocd` Helm release presence.
pub async fn detect_git_ops_engine(helm: &dyn HelmReleaseProbe) -> Result<GitOpsEngine, DetectorError> {
    if helm.release_exists("flux-system", "flux-operator").await? {
        return Ok(GitOpsEngine::Flux);
    }
    if helm.release_exists("argocd", "argocd").await? {
        return Ok(GitOpsEngine::ArgoCd);
    }
    Ok(GitOpsEngine::None)
}
