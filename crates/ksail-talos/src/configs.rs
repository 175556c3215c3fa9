//! `Configs` — the value the spec's Talos engine owns end to end (spec §4.10,
//! §5 table). Bundled PKI identity lives behind an `Arc` so a rename's
//! "bundle is not the same object as the original" property (spec §5, S6) is
//! a pointer comparison rather than a deep equality check.

use std::path::Path;
use std::sync::Arc;

use tracing::info;

use crate::error::TalosError;
use crate::network::{nth_ip_in_network, reject_ipv6, DEFAULT_NETWORK_CIDR};
use crate::patch::{kubelet_cert_rotation_enabled, load_patches, MachineConfigPatch};
use crate::pki::{Bundle, Talosconfig};

/// A composed Talos machine-config bundle for one cluster.
#[derive(Debug, Clone)]
pub struct Configs {
    pub cluster_name: String,
    pub kubernetes_version: String,
    pub network_cidr: String,
    pub patches: Vec<MachineConfigPatch>,
    pub bundle: Arc<Bundle>,
    pub talosconfig: Talosconfig,
}

impl Configs {
    /// Load patches from `patch_root` and generate a fresh PKI bundle for
    /// `cluster_name`, using the default cluster network CIDR.
    ///
    /// # Errors
    ///
    /// Returns [`TalosError::Io`]/[`TalosError::InvalidPatch`] if patches
    /// can't be loaded, or [`TalosError::Pki`] if PKI generation fails.
    pub fn load(
        cluster_name: impl Into<String>,
        kubernetes_version: impl Into<String>,
        patch_root: &Path,
    ) -> Result<Self, TalosError> {
        Self::load_with_network(cluster_name, kubernetes_version, patch_root, DEFAULT_NETWORK_CIDR)
    }

    /// As [`Configs::load`], but with an explicit cluster network CIDR.
    ///
    /// # Errors
    ///
    /// As [`Configs::load`], plus [`TalosError::Ipv6NotSupported`] if
    /// `network_cidr` is an IPv6 network.
    pub fn load_with_network(
        cluster_name: impl Into<String>,
        kubernetes_version: impl Into<String>,
        patch_root: &Path,
        network_cidr: impl Into<String>,
    ) -> Result<Self, TalosError> {
        let cluster_name = cluster_name.into();
        let network_cidr = network_cidr.into();
        reject_ipv6(&network_cidr)?;

        let patches = load_patches(patch_root)
            .map_err(|err| err.context(format!("load machine-config patches from {}", patch_root.display())))?;
        let bundle = Arc::new(
            Bundle::generate(&cluster_name).map_err(|err| err.context("generate pki bundle"))?,
        );
        let talosconfig = Talosconfig {
            context: cluster_name.clone(),
        };

        info!(cluster_name, "composed talos configs");
        Ok(Self {
            cluster_name,
            kubernetes_version: kubernetes_version.into(),
            network_cidr,
            patches,
            bundle,
            talosconfig,
        })
    }

    /// Return a `Configs` renamed to `new_name`.
    ///
    /// If `new_name` is empty or equal to the current name, the receiver is
    /// returned unchanged. Otherwise the PKI bundle is regenerated from
    /// scratch and the `talosconfig` context is rewritten, since node certs
    /// embed the cluster name and must not be reused across a rename.
    ///
    /// # Errors
    ///
    /// Returns [`TalosError::Pki`] if bundle regeneration fails.
    pub fn with_name(self, new_name: impl Into<String>) -> Result<Self, TalosError> {
        let new_name = new_name.into();
        if new_name.is_empty() || new_name == self.cluster_name {
            return Ok(self);
        }

        let bundle = Arc::new(
            Bundle::generate(&new_name).map_err(|err| err.context("regenerate pki bundle for rename"))?,
        );
        let talosconfig = Talosconfig {
            context: new_name.clone(),
        };

        info!(old = self.cluster_name, new = new_name, "renamed talos cluster");
        Ok(Self {
            cluster_name: new_name,
            bundle,
            talosconfig,
            ..self
        })
    }

    /// `true` iff any applied control-plane patch sets
    /// `.machine.kubelet.extraArgs.rotate-server-certificates` to `"true"`.
    #[must_use]
    pub fn is_kubelet_cert_rotation_enabled(&self) -> bool {
        kubelet_cert_rotation_enabled(&self.patches)
    }

    /// Walk `self.network_cidr` `offset` times (offset 0=network,
    /// 1=gateway, 2+=usable).
    ///
    /// # Errors
    ///
    /// See [`nth_ip_in_network`].
    pub fn nth_ip_in_network(&self, offset: i64) -> Result<std::net::Ipv4Addr, TalosError> {
        nth_ip_in_network(&self.network_cidr, offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn configs(cluster_name: &str, root: &Path) -> Configs {
        Configs::load(cluster_name, "v1.31.0", root).unwrap()
    }

    #[test]
    fn default_network_cidr_is_10_5_0_0_24() {
        let root = tempfile::tempdir().unwrap();
        let configs = configs("original", root.path());
        assert_eq!(configs.network_cidr, "10.5.0.0/24");
    }

    #[test]
    fn with_name_is_a_no_op_for_blank_name() {
        let root = tempfile::tempdir().unwrap();
        let configs = configs("original", root.path());
        let bundle_before = Arc::clone(&configs.bundle);
        let renamed = configs.with_name("").unwrap();
        assert!(Arc::ptr_eq(&bundle_before, &renamed.bundle));
        assert_eq!(renamed.cluster_name, "original");
    }

    #[test]
    fn with_name_is_a_no_op_for_unchanged_name() {
        let root = tempfile::tempdir().unwrap();
        let configs = configs("original", root.path());
        let bundle_before = Arc::clone(&configs.bundle);
        let renamed = configs.with_name("original").unwrap();
        assert!(Arc::ptr_eq(&bundle_before, &renamed.bundle));
    }

    #[test]
    fn with_name_regenerates_pki_and_rewrites_talosconfig_context() {
        let root = tempfile::tempdir().unwrap();
        let configs = configs("original", root.path());
        let bundle_before = Arc::clone(&configs.bundle);

        let renamed = configs.with_name("renamed").unwrap();

        assert!(!Arc::ptr_eq(&bundle_before, &renamed.bundle));
        assert_eq!(renamed.cluster_name, "renamed");
        assert_eq!(renamed.talosconfig.context, "renamed");
    }
}
