//! Flux `FluxInstance` manager (C8) — the same idempotent upsert role as
//! [`crate::argocd::ArgoCdManager`], but against a single typed sync block
//! instead of a separate repository secret.
//!
//! Grounded on the same `ApiResource::from_gvk` pattern as
//! `examples/5dlabs-cto/crates/installer/src/gitops.rs`, re-targeted from
//! `Application` to `FluxInstance`.

use kube::api::{Api, DynamicObject, ObjectMeta, PostParams, TypeMeta};
use kube::core::GroupVersionKind;
use kube::discovery::ApiResource;
use kube::Client;
use tracing::info;

use crate::error::GitOpsError;

pub const NAMESPACE: &str = "flux-system";
pub const INSTANCE_NAME: &str = "flux";
const DEFAULT_SYNC_INTERVAL: &str = "1m";

fn instance_api_resource() -> ApiResource {
    ApiResource::from_gvk_with_plural(
        &GroupVersionKind::gvk("fluxcd.controlplane.io", "v1", "FluxInstance"),
        "fluxinstances",
    )
}

/// Desired state for [`FluxInstanceManager::ensure`].
#[derive(Debug, Clone)]
pub struct EnsureOptions {
    pub distribution_version: String,
    pub distribution_registry: String,
    pub repo_url: String,
    /// OCIRepository `spec.ref.tag`; falls back to `"dev"` when empty, per
    /// the typed sync-block assembly in spec §4.8.
    pub tag: String,
    pub interval: Option<String>,
    pub pull_secret: Option<String>,
}

impl EnsureOptions {
    fn tag(&self) -> &str {
        if self.tag.trim().is_empty() {
            "dev"
        } else {
            &self.tag
        }
    }

    fn interval(&self) -> &str {
        self.interval.as_deref().unwrap_or(DEFAULT_SYNC_INTERVAL)
    }
}

/// Idempotent manager for the single cluster-wide `FluxInstance`.
pub struct FluxInstanceManager {
    client: Client,
}

impl FluxInstanceManager {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Ensure `flux-system/flux` exists and matches `opts` (testable
    /// property 1: idempotence).
    ///
    /// # Errors
    ///
    /// Returns [`GitOpsError::Kube`] wrapped with operation context on any
    /// failed API call.
    pub async fn ensure(&self, opts: &EnsureOptions) -> Result<(), GitOpsError> {
        let api: Api<DynamicObject> =
            Api::namespaced_with(self.client.clone(), NAMESPACE, &instance_api_resource());

        let desired_spec = instance_spec(opts);

        match api
            .get_opt(INSTANCE_NAME)
            .await
            .map_err(|err| GitOpsError::from(err).context(format!("get fluxinstance {NAMESPACE}/{INSTANCE_NAME}")))?
        {
            Some(mut existing) => {
                existing.data["spec"] = desired_spec;
                api.replace(INSTANCE_NAME, &PostParams::default(), &existing)
                    .await
                    .map_err(|err| {
                        GitOpsError::from(err)
                            .context(format!("update fluxinstance {NAMESPACE}/{INSTANCE_NAME}"))
                    })?;
            }
            None => {
                let object = DynamicObject {
                    types: Some(TypeMeta {
                        api_version: "fluxcd.controlplane.io/v1".to_string(),
                        kind: "FluxInstance".to_string(),
                    }),
                    metadata: ObjectMeta {
                        name: Some(INSTANCE_NAME.to_string()),
                        namespace: Some(NAMESPACE.to_string()),
                        ..Default::default()
                    },
                    data: serde_json::json!({ "spec": desired_spec }),
                };
                api.create(&PostParams::default(), &object)
                    .await
                    .map_err(|err| {
                        GitOpsError::from(err)
                            .context(format!("create fluxinstance {NAMESPACE}/{INSTANCE_NAME}"))
                    })?;
            }
        }

        info!("ensured flux instance");
        Ok(())
    }
}

fn instance_spec(opts: &EnsureOptions) -> serde_json::Value {
    let mut sync = serde_json::json!({
        "kind": "OCIRepository",
        "url": opts.repo_url,
        "ref": { "tag": opts.tag() },
        "path": ".",
        "interval": opts.interval(),
    });

    if let Some(pull_secret) = &opts.pull_secret {
        sync["pullSecret"] = serde_json::Value::String(pull_secret.clone());
    }

    serde_json::json!({
        "distribution": {
            "version": opts.distribution_version,
            "registry": opts.distribution_registry,
        },
        "sync": sync,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_opts() -> EnsureOptions {
        EnsureOptions {
            distribution_version: "2.x".to_string(),
            distribution_registry: "ghcr.io/fluxcd".to_string(),
            repo_url: "oci://local-registry:5000/demo".to_string(),
            tag: String::new(),
            interval: None,
            pull_secret: None,
        }
    }

    #[test]
    fn blank_tag_defaults_to_dev() {
        let opts = base_opts();
        let spec = instance_spec(&opts);
        assert_eq!(spec["sync"]["ref"]["tag"], "dev");
    }

    #[test]
    fn sync_path_is_always_dot() {
        let opts = base_opts();
        let spec = instance_spec(&opts);
        assert_eq!(spec["sync"]["path"], ".");
    }

    #[test]
    fn interval_defaults_to_one_minute() {
        let opts = base_opts();
        let spec = instance_spec(&opts);
        assert_eq!(spec["sync"]["interval"], "1m");
    }

    #[test]
    fn pull_secret_is_included_when_set() {
        let mut opts = base_opts();
        opts.pull_secret = Some("ksail-registry-credentials".to_string());
        let spec = instance_spec(&opts);
        assert_eq!(spec["sync"]["pullSecret"], "ksail-registry-credentials");
    }
}
