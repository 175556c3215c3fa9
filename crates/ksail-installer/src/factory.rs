//! Pure factory: `effective(spec) -> { key -> Installer }`.
//!
//! The mapping itself carries no side effects — testable property 3
//! (factory determinism) depends on this staying a pure function of the
//! spec plus the injected `HelmClient`.

use std::collections::HashMap;
use std::sync::Arc;

use ksail_spec::{ClusterSpec, Cni, Distribution, GitOpsEngine, PolicyEngine, Provider, Tristate};

use crate::cpk::CloudProviderKindInstaller;
use crate::helm::HelmClient;
use crate::helm_installer::HelmInstaller;
use crate::installer::Installer;

/// Build the full `key -> Installer` map for `spec` (already passed through
/// `ClusterSpec::effective`).
#[must_use]
pub fn build(spec: &ClusterSpec, helm: Arc<dyn HelmClient>) -> HashMap<String, Arc<dyn Installer>> {
    let mut installers: HashMap<String, Arc<dyn Installer>> = HashMap::new();

    match spec.git_ops_engine {
        GitOpsEngine::Flux => {
            insert(&mut installers, "flux", flux_installer(helm.clone()));
        }
        GitOpsEngine::ArgoCd => {
            insert(&mut installers, "argocd", argocd_installer(helm.clone()));
        }
        GitOpsEngine::None => {}
    }

    match spec.cni {
        Cni::Cilium => insert(&mut installers, "cilium", cilium_installer(helm.clone())),
        Cni::Calico => insert(&mut installers, "calico", calico_installer(helm.clone())),
        Cni::Default => {}
    }

    match spec.policy_engine {
        PolicyEngine::Kyverno => insert(&mut installers, "kyverno", kyverno_installer(helm.clone())),
        PolicyEngine::Gatekeeper => {
            insert(&mut installers, "gatekeeper", gatekeeper_installer(helm.clone()));
        }
        PolicyEngine::None => {}
    }

    if spec.cert_manager.is_enabled() {
        insert(
            &mut installers,
            "cert-manager",
            cert_manager_installer(helm.clone()),
        );
    }

    let metrics_server_needed = spec.metrics_server.is_enabled()
        || (spec.metrics_server == Tristate::Default && !spec.provides_metrics_server_by_default());
    if metrics_server_needed {
        insert(
            &mut installers,
            "metrics-server",
            metrics_server_installer(helm.clone()),
        );
    }

    let csi_enabled = spec.csi.is_enabled()
        || (spec.csi == Tristate::Default && !spec.provides_csi_by_default());
    if csi_enabled {
        if spec.is_talos_hetzner() {
            insert(
                &mut installers,
                "hetzner-csi",
                hetzner_csi_installer(helm.clone()),
            );
            insert(
                &mut installers,
                "kubelet-csr-approver",
                kubelet_csr_approver_installer(helm.clone()),
            );
        } else if !spec.provides_csi_by_default() {
            insert(
                &mut installers,
                "local-path-storage",
                local_path_storage_installer(helm.clone()),
            );
        }
    }

    let load_balancer_enabled = spec.load_balancer.is_enabled()
        || (spec.load_balancer == Tristate::Default && !spec.provides_load_balancer_by_default());
    if load_balancer_enabled {
        if spec.distribution == Distribution::Vanilla && spec.provider == Provider::Docker {
            insert(
                &mut installers,
                "cloud-provider-kind",
                CloudProviderKindInstaller::default(),
            );
        } else if spec.distribution == Distribution::Talos && spec.provider == Provider::Docker {
            insert(&mut installers, "metallb", metallb_installer(helm.clone()));
        } else if spec.distribution == Distribution::Talos && spec.provider == Provider::Hetzner {
            insert(
                &mut installers,
                "hcloud-ccm",
                hcloud_ccm_installer(helm.clone()),
            );
        }
    }

    installers
}

fn insert<I>(map: &mut HashMap<String, Arc<dyn Installer>>, key: &str, installer: I)
where
    I: Installer + 'static,
{
    map.insert(key.to_string(), Arc::new(installer));
}

fn flux_installer(helm: Arc<dyn HelmClient>) -> HelmInstaller {
    HelmInstaller::new(helm, "flux-operator", "flux-operator/flux-operator", "flux-system")
        .with_repo("flux-operator", "https://fluxcd-community.github.io/helm-charts")
        .with_images(vec!["ghcr.io/controlplaneio-fluxcd/flux-operator".to_string()])
}

fn argocd_installer(helm: Arc<dyn HelmClient>) -> HelmInstaller {
    HelmInstaller::new(helm, "argocd", "argo/argo-cd", "argocd")
        .with_repo("argo", "https://argoproj.github.io/argo-helm")
        .with_images(vec!["quay.io/argoproj/argocd".to_string()])
}

fn cilium_installer(helm: Arc<dyn HelmClient>) -> HelmInstaller {
    HelmInstaller::new(helm, "cilium", "cilium/cilium", "kube-system")
        .with_repo("cilium", "https://helm.cilium.io")
        .with_images(vec!["quay.io/cilium/cilium".to_string()])
}

fn calico_installer(helm: Arc<dyn HelmClient>) -> HelmInstaller {
    HelmInstaller::new(helm, "calico", "tigera/tigera-operator", "tigera-operator")
        .with_repo("tigera", "https://docs.tigera.io/calico/charts")
        .with_images(vec!["quay.io/tigera/operator".to_string()])
}

fn kyverno_installer(helm: Arc<dyn HelmClient>) -> HelmInstaller {
    HelmInstaller::new(helm, "kyverno", "kyverno/kyverno", "kyverno")
        .with_repo("kyverno", "https://kyverno.github.io/kyverno")
        .with_images(vec!["ghcr.io/kyverno/kyverno".to_string()])
}

fn gatekeeper_installer(helm: Arc<dyn HelmClient>) -> HelmInstaller {
    HelmInstaller::new(helm, "gatekeeper", "gatekeeper/gatekeeper", "gatekeeper-system")
        .with_repo("gatekeeper", "https://open-policy-agent.github.io/gatekeeper/charts")
        .with_images(vec!["openpolicyagent/gatekeeper".to_string()])
}

fn cert_manager_installer(helm: Arc<dyn HelmClient>) -> HelmInstaller {
    HelmInstaller::new(helm, "cert-manager", "jetstack/cert-manager", "cert-manager")
        .with_repo("jetstack", "https://charts.jetstack.io")
        .with_values(vec![("crds.enabled".to_string(), "true".to_string())])
        .with_images(vec!["quay.io/jetstack/cert-manager-controller".to_string()])
}

fn metrics_server_installer(helm: Arc<dyn HelmClient>) -> HelmInstaller {
    HelmInstaller::new(helm, "metrics-server", "metrics-server/metrics-server", "kube-system")
        .with_repo("metrics-server", "https://kubernetes-sigs.github.io/metrics-server")
        .with_images(vec!["registry.k8s.io/metrics-server/metrics-server".to_string()])
}

fn local_path_storage_installer(helm: Arc<dyn HelmClient>) -> HelmInstaller {
    HelmInstaller::new(
        helm,
        "local-path-provisioner",
        "local-path-provisioner/local-path-provisioner",
        "local-path-storage",
    )
    .with_repo(
        "local-path-provisioner",
        "https://charts.containeroo.ch",
    )
    .with_images(vec!["rancher/local-path-provisioner".to_string()])
}

fn hetzner_csi_installer(helm: Arc<dyn HelmClient>) -> HelmInstaller {
    HelmInstaller::new(helm, "hcloud-csi", "hcloud/hcloud-csi", "kube-system")
        .with_repo("hcloud", "https://charts.hetzner.cloud")
        .with_images(vec!["docker.io/hetznercloud/hcloud-csi-driver".to_string()])
}

fn kubelet_csr_approver_installer(helm: Arc<dyn HelmClient>) -> HelmInstaller {
    HelmInstaller::new(
        helm,
        "kubelet-csr-approver",
        "postfinance/kubelet-csr-approver",
        "kube-system",
    )
    .with_repo("postfinance", "https://postfinance.github.io/kubelet-csr-approver")
    .with_images(vec!["ghcr.io/postfinance/kubelet-csr-approver".to_string()])
}

fn metallb_installer(helm: Arc<dyn HelmClient>) -> HelmInstaller {
    HelmInstaller::new(helm, "metallb", "metallb/metallb", "metallb-system")
        .with_repo("metallb", "https://metallb.github.io/metallb")
        .with_images(vec!["quay.io/metallb/controller".to_string()])
}

fn hcloud_ccm_installer(helm: Arc<dyn HelmClient>) -> HelmInstaller {
    HelmInstaller::new(helm, "hcloud-cloud-controller-manager", "hcloud/hcloud-cloud-controller-manager", "kube-system")
        .with_repo("hcloud", "https://charts.hetzner.cloud")
        .with_images(vec!["docker.io/hetznercloud/hcloud-cloud-controller-manager".to_string()])
}
