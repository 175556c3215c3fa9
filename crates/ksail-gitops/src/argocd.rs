//! Argo CD `Application` + repository `Secret` manager (C7).
//!
//! Grounded on `examples/5dlabs-cto/crates/installer/src/gitops.rs`'s
//! `argocd_application_api()` `ApiResource` construction, generalized from a
//! read-only sync-status verifier into a full get-mutate-update manager, and
//! on `examples/octopilot-secret-manager-controller/src/controller/reconciler/notifications/argocd.rs`'s
//! `ApiResource::from_gvk` + annotation-patch idiom for [`ArgoCdManager::update_target_revision`].

use k8s_openapi::api::core::v1::{Namespace, Secret};
use kube::api::{Api, DynamicObject, ObjectMeta, PostParams, TypeMeta};
use kube::core::GroupVersionKind;
use kube::discovery::ApiResource;
use kube::{Client, Error as KubeError};
use std::collections::BTreeMap;
use tracing::info;

use crate::error::GitOpsError;

pub const NAMESPACE: &str = "argocd";
const DEFAULT_APPLICATION_NAME: &str = "ksail";
const REPOSITORY_SECRET_NAME: &str = "ksail-local-registry-repo";
const DEFAULT_DESTINATION_SERVER: &str = "https://kubernetes.default.svc";

fn application_api_resource() -> ApiResource {
    ApiResource::from_gvk_with_plural(
        &GroupVersionKind::gvk("argoproj.io", "v1alpha1", "Application"),
        "applications",
    )
}

/// Desired state for [`ArgoCdManager::ensure`].
#[derive(Debug, Clone)]
pub struct EnsureOptions {
    pub application_name: Option<String>,
    pub repo_url: String,
    pub target_revision: String,
    pub path: String,
    pub destination_namespace: String,
    pub insecure: bool,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl EnsureOptions {
    #[must_use]
    pub fn new(repo_url: impl Into<String>, target_revision: impl Into<String>) -> Self {
        Self {
            application_name: None,
            repo_url: repo_url.into(),
            target_revision: target_revision.into(),
            path: ".".to_string(),
            destination_namespace: "default".to_string(),
            insecure: false,
            username: None,
            password: None,
        }
    }

    fn name(&self) -> &str {
        self.application_name.as_deref().unwrap_or(DEFAULT_APPLICATION_NAME)
    }
}

/// Options for [`ArgoCdManager::update_target_revision`].
#[derive(Debug, Clone)]
pub struct TargetRevisionUpdate {
    pub application_name: Option<String>,
    pub target_revision: String,
    pub hard_refresh: bool,
}

/// Idempotent manager for the Argo CD `Application` and its repository
/// `Secret`.
pub struct ArgoCdManager {
    client: Client,
}

impl ArgoCdManager {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Ensure the `argocd` namespace, the repository `Secret`, and the
    /// `Application` exist and match `opts` (testable property 1: idempotence).
    ///
    /// # Errors
    ///
    /// Returns [`GitOpsError::Kube`] wrapped with operation context on any
    /// failed API call.
    pub async fn ensure(&self, opts: &EnsureOptions) -> Result<(), GitOpsError> {
        self.ensure_namespace()
            .await
            .map_err(|err| err.context(format!("ensure namespace {NAMESPACE}")))?;
        self.upsert_repository_secret(opts)
            .await
            .map_err(|err| err.context(format!("upsert secret {NAMESPACE}/{REPOSITORY_SECRET_NAME}")))?;
        self.upsert_application(opts)
            .await
            .map_err(|err| err.context(format!("upsert application {NAMESPACE}/{}", opts.name())))?;
        Ok(())
    }

    /// Update `spec.source.targetRevision` on an existing `Application`, and
    /// optionally annotate it for a hard refresh.
    ///
    /// # Errors
    ///
    /// Returns [`GitOpsError::Kube`] if the Application cannot be fetched or
    /// updated.
    pub async fn update_target_revision(
        &self,
        update: &TargetRevisionUpdate,
    ) -> Result<(), GitOpsError> {
        let name = update.application_name.as_deref().unwrap_or(DEFAULT_APPLICATION_NAME);
        let api: Api<DynamicObject> =
            Api::namespaced_with(self.client.clone(), NAMESPACE, &application_api_resource());

        let mut application = api
            .get(name)
            .await
            .map_err(|err| GitOpsError::from(err).context(format!("get application {NAMESPACE}/{name}")))?;

        if !update.target_revision.trim().is_empty() {
            if let Some(spec) = application.data.get_mut("spec").and_then(|v| v.as_object_mut()) {
                if let Some(source) = spec.get_mut("source").and_then(|v| v.as_object_mut()) {
                    source.insert(
                        "targetRevision".to_string(),
                        serde_json::Value::String(update.target_revision.clone()),
                    );
                }
            }
        }

        if update.hard_refresh {
            let annotations = application
                .metadata
                .annotations
                .get_or_insert_with(BTreeMap::new);
            annotations.insert(
                "argocd.argoproj.io/refresh".to_string(),
                "hard".to_string(),
            );
        }

        api.replace(name, &PostParams::default(), &application)
            .await
            .map_err(|err| GitOpsError::from(err).context(format!("update application {NAMESPACE}/{name}")))?;

        info!(name, "updated argocd application target revision");
        Ok(())
    }

    async fn ensure_namespace(&self) -> Result<(), GitOpsError> {
        let namespaces: Api<Namespace> = Api::all(self.client.clone());
        let namespace = Namespace {
            metadata: ObjectMeta {
                name: Some(NAMESPACE.to_string()),
                ..Default::default()
            },
            ..Default::default()
        };

        match namespaces.create(&PostParams::default(), &namespace).await {
            Ok(_) => Ok(()),
            Err(KubeError::Api(api_err)) if api_err.code == 409 => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    async fn upsert_repository_secret(&self, opts: &EnsureOptions) -> Result<(), GitOpsError> {
        let secrets: Api<Secret> = Api::namespaced(self.client.clone(), NAMESPACE);

        let mut string_data = BTreeMap::new();
        string_data.insert("type".to_string(), "oci".to_string());
        string_data.insert("url".to_string(), opts.repo_url.clone());
        if let Some(username) = &opts.username {
            string_data.insert("username".to_string(), username.clone());
        }
        if let Some(password) = &opts.password {
            string_data.insert("password".to_string(), password.clone());
        }
        if opts.insecure {
            string_data.insert("insecureOCIForceHttp".to_string(), "true".to_string());
        }

        let mut labels = BTreeMap::new();
        labels.insert(
            "argocd.argoproj.io/secret-type".to_string(),
            "repository".to_string(),
        );

        match secrets.get_opt(REPOSITORY_SECRET_NAME).await? {
            Some(existing) => {
                let mut updated = existing;
                updated.string_data = Some(string_data);
                updated.data = None;
                updated.metadata.labels = Some(labels);
                secrets
                    .replace(REPOSITORY_SECRET_NAME, &PostParams::default(), &updated)
                    .await?;
            }
            None => {
                let secret = Secret {
                    metadata: ObjectMeta {
                        name: Some(REPOSITORY_SECRET_NAME.to_string()),
                        namespace: Some(NAMESPACE.to_string()),
                        labels: Some(labels),
                        ..Default::default()
                    },
                    string_data: Some(string_data),
                    ..Default::default()
                };
                secrets.create(&PostParams::default(), &secret).await?;
            }
        }

        Ok(())
    }

    async fn upsert_application(&self, opts: &EnsureOptions) -> Result<(), GitOpsError> {
        let api: Api<DynamicObject> =
            Api::namespaced_with(self.client.clone(), NAMESPACE, &application_api_resource());

        let desired_spec = application_spec(opts);

        match api.get_opt(opts.name()).await? {
            Some(mut existing) => {
                existing.data["spec"] = desired_spec;
                api.replace(opts.name(), &PostParams::default(), &existing)
                    .await?;
            }
            None => {
                let object = DynamicObject {
                    types: Some(TypeMeta {
                        api_version: "argoproj.io/v1alpha1".to_string(),
                        kind: "Application".to_string(),
                    }),
                    metadata: ObjectMeta {
                        name: Some(opts.name().to_string()),
                        namespace: Some(NAMESPACE.to_string()),
                        ..Default::default()
                    },
                    data: serde_json::json!({ "spec": desired_spec }),
                };
                api.create(&PostParams::default(), &object).await?;
            }
        }

        info!(name = opts.name(), "ensured argocd application");
        Ok(())
    }
}

fn application_spec(opts: &EnsureOptions) -> serde_json::Value {
    serde_json::json!({
        "project": "default",
        "source": {
            "repoURL": opts.repo_url,
            "path": opts.path,
            "targetRevision": opts.target_revision,
        },
        "destination": {
            "server": DEFAULT_DESTINATION_SERVER,
            "namespace": opts.destination_namespace,
        },
        "syncPolicy": {
            "automated": { "prune": true, "selfHeal": true },
            "syncOptions": ["CreateNamespace=true"],
        },
    })
}
