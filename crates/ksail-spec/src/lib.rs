//! Declarative cluster specification and default resolution.
//!
//! This is the canonical input the rest of the cluster engine consumes: a
//! pure data model plus a small algebra of defaulting and validation
//! predicates. Nothing in this crate talks to a cluster, a registry, or the
//! filesystem beyond the one existence check `validate` performs on
//! `source_directory`.

use std::path::{Path, PathBuf};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Kubernetes distribution to provision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum Distribution {
    Vanilla,
    K3s,
    Talos,
    VCluster,
}

/// Infrastructure provider the cluster's nodes run on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum Provider {
    Docker,
    Podman,
    Hetzner,
    Omni,
}

/// CNI plugin selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum Cni {
    Default,
    Cilium,
    Calico,
}

/// Three-state toggle used by fields whose "default" meaning depends on the
/// distribution/provider pair (CSI, load balancer, metrics-server, cert-manager).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum Tristate {
    Default,
    Enabled,
    Disabled,
}

impl Tristate {
    #[must_use]
    pub fn is_enabled(self) -> bool {
        matches!(self, Self::Enabled)
    }
}

/// In-cluster policy engine selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum PolicyEngine {
    None,
    Kyverno,
    Gatekeeper,
}

/// GitOps engine that reconciles the cluster's workload state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum GitOpsEngine {
    None,
    Flux,
    ArgoCd,
}

/// Local (Docker-hosted) registry configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LocalRegistrySpec {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

/// Cluster connection coordinates.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionSpec {
    #[serde(default)]
    pub kubeconfig: Option<PathBuf>,
    #[serde(default)]
    pub context: Option<String>,
}

/// The declarative cluster specification.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClusterSpec {
    pub name: String,
    pub distribution: Distribution,
    pub provider: Provider,
    #[serde(default = "default_cni")]
    pub cni: Cni,
    #[serde(default = "default_tristate")]
    pub csi: Tristate,
    #[serde(default = "default_tristate")]
    pub load_balancer: Tristate,
    #[serde(default = "default_tristate")]
    pub metrics_server: Tristate,
    #[serde(default = "default_tristate")]
    pub cert_manager: Tristate,
    #[serde(default)]
    pub policy_engine: PolicyEngine,
    #[serde(default)]
    pub git_ops_engine: GitOpsEngine,
    #[serde(default)]
    pub source_directory: Option<PathBuf>,
    #[serde(default)]
    pub local_registry: LocalRegistrySpec,
    #[serde(default)]
    pub connection: ConnectionSpec,
}

const fn default_cni() -> Cni {
    Cni::Default
}

const fn default_tristate() -> Tristate {
    Tristate::Default
}

impl Default for PolicyEngine {
    fn default() -> Self {
        Self::None
    }
}

impl Default for GitOpsEngine {
    fn default() -> Self {
        Self::None
    }
}

/// Validation failures for a `ClusterSpec`.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SpecError {
    #[error("cluster name must not be empty")]
    EmptyName,
    #[error("gitOpsEngine is set but sourceDirectory was not provided")]
    MissingSourceDirectory,
    #[error("sourceDirectory {0} is not a directory")]
    SourceDirectoryNotADirectory(PathBuf),
    #[error("talos distribution is not supported on the podman provider")]
    TalosOnPodman,
    #[error("localRegistry.enabled is true but localRegistry.host is blank")]
    BlankLocalRegistryHost,
}

impl ClusterSpec {
    /// Validate the spec against the invariants in the specification's
    /// Cluster Spec & Defaults component. Only checks that don't require
    /// touching the filesystem beyond a directory existence/type check.
    ///
    /// # Errors
    ///
    /// Returns the first violated invariant, in the order: empty name,
    /// Talos+Podman incompatibility, GitOps without a usable source
    /// directory, blank local registry host.
    pub fn validate(&self) -> Result<(), SpecError> {
        if self.name.trim().is_empty() {
            return Err(SpecError::EmptyName);
        }

        if self.distribution == Distribution::Talos && self.provider == Provider::Podman {
            return Err(SpecError::TalosOnPodman);
        }

        if self.git_ops_engine != GitOpsEngine::None {
            match &self.source_directory {
                None => return Err(SpecError::MissingSourceDirectory),
                Some(dir) => {
                    if !dir.is_dir() {
                        return Err(SpecError::SourceDirectoryNotADirectory(dir.clone()));
                    }
                }
            }
        }

        if self.local_registry.enabled {
            let blank = self
                .local_registry
                .host
                .as_deref()
                .map(str::trim)
                .unwrap_or_default()
                .is_empty();
            if blank {
                return Err(SpecError::BlankLocalRegistryHost);
            }
        }

        Ok(())
    }

    /// Returns whether the distribution/provider pair provides a CSI driver
    /// out of the box, without installing one explicitly.
    #[must_use]
    pub fn provides_csi_by_default(&self) -> bool {
        provides_csi_by_default(self.distribution, self.provider)
    }

    /// Returns whether the distribution/provider pair ships a metrics-server
    /// equivalent out of the box.
    #[must_use]
    pub fn provides_metrics_server_by_default(&self) -> bool {
        provides_metrics_server_by_default(self.distribution, self.provider)
    }

    /// Returns whether the distribution/provider pair ships a load balancer
    /// controller out of the box.
    #[must_use]
    pub fn provides_load_balancer_by_default(&self) -> bool {
        provides_load_balancer_by_default(self.distribution, self.provider)
    }

    /// Apply pure defaulting: normalize the name, default the local registry
    /// tag to `"dev"` when the registry is enabled but no tag was given, and
    /// default the GitOps sync tag similarly. Idempotent: `effective(effective(s)) == effective(s)`.
    #[must_use]
    pub fn effective(&self) -> Self {
        let mut spec = self.clone();
        spec.name = spec.name.trim().to_string();

        if spec.local_registry.enabled {
            if let Some(tag) = spec.local_registry.tag.as_ref() {
                if tag.trim().is_empty() {
                    spec.local_registry.tag = Some("dev".to_string());
                }
            } else {
                spec.local_registry.tag = Some("dev".to_string());
            }
        }

        spec
    }

    /// Whether talos+hetzner (the CSI special case called out in §4.5/§4.10).
    #[must_use]
    pub fn is_talos_hetzner(&self) -> bool {
        self.distribution == Distribution::Talos && self.provider == Provider::Hetzner
    }

    /// Whether this spec resolves the manifest root used by GitOps and the
    /// artifact builder, if any.
    #[must_use]
    pub fn source_directory(&self) -> Option<&Path> {
        self.source_directory.as_deref()
    }
}

#[must_use]
pub fn provides_csi_by_default(distribution: Distribution, _provider: Provider) -> bool {
    matches!(distribution, Distribution::K3s | Distribution::VCluster)
}

#[must_use]
pub fn provides_metrics_server_by_default(distribution: Distribution, _provider: Provider) -> bool {
    matches!(distribution, Distribution::K3s)
}

#[must_use]
pub fn provides_load_balancer_by_default(distribution: Distribution, _provider: Provider) -> bool {
    matches!(distribution, Distribution::K3s)
}
