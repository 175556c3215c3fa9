//! `Reconcile` = `TriggerRefresh` then `WaitForApplicationReady` (C9).
//!
//! Generalized from `examples/5dlabs-cto/crates/installer/src/gitops.rs`'s
//! `wait_for_full_sync` poll loop — that loop only ever reported degraded
//! apps; this one additionally classifies a terminal operation error into
//! [`GitOpsError::SourceNotAvailable`] vs [`GitOpsError::OperationFailed`]
//! per spec §4.9, and retries the refresh annotation write under conflict
//! the way `examples/octopilot-secret-manager-controller/src/controller/reconciler/notifications/argocd.rs`
//! retries its annotation patch.

use std::collections::BTreeMap;
use std::time::Duration;

use kube::api::{Api, DynamicObject, PostParams};
use kube::core::GroupVersionKind;
use kube::discovery::ApiResource;
use kube::{Client, Error as KubeError};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::argocd::NAMESPACE as ARGOCD_NAMESPACE;
use crate::error::{is_source_error_message, GitOpsError};

/// Reconciler poll interval (spec §4.9, §5).
pub const RECONCILER_POLL_INTERVAL: Duration = Duration::from_secs(2);
const MAX_CONFLICT_RETRIES: u32 = 5;
const REFRESH_ANNOTATION: &str = "argocd.argoproj.io/refresh";
const DEFAULT_APPLICATION_NAME: &str = "ksail";

fn application_api_resource() -> ApiResource {
    ApiResource::from_gvk_with_plural(
        &GroupVersionKind::gvk("argoproj.io", "v1alpha1", "Application"),
        "applications",
    )
}

/// Input to [`GitOpsReconciler::reconcile`].
#[derive(Debug, Clone)]
pub struct ReconcileOptions {
    pub application_name: Option<String>,
    pub timeout: Duration,
    pub hard_refresh: bool,
}

impl ReconcileOptions {
    fn name(&self) -> &str {
        self.application_name.as_deref().unwrap_or(DEFAULT_APPLICATION_NAME)
    }
}

/// Drives an Argo CD `Application` from "refresh requested" to
/// `Synced`+`Healthy`, or classifies why it couldn't get there.
pub struct GitOpsReconciler {
    client: Client,
}

impl GitOpsReconciler {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Trigger a refresh, then poll until the Application is Synced+Healthy
    /// or a terminal condition is reached.
    ///
    /// # Errors
    ///
    /// [`GitOpsError::SourceNotAvailable`], [`GitOpsError::OperationFailed`],
    /// or [`GitOpsError::ReconcileTimeout`].
    pub async fn reconcile(&self, opts: &ReconcileOptions) -> Result<(), GitOpsError> {
        self.trigger_refresh(opts).await?;
        self.wait_for_application_ready(opts).await
    }

    async fn trigger_refresh(&self, opts: &ReconcileOptions) -> Result<(), GitOpsError> {
        let name = opts.name();
        let api: Api<DynamicObject> =
            Api::namespaced_with(self.client.clone(), ARGOCD_NAMESPACE, &application_api_resource());

        let refresh_value = if opts.hard_refresh { "hard" } else { "normal" };

        for attempt in 0..MAX_CONFLICT_RETRIES {
            let mut application = api.get(name).await?;
            let annotations = application.metadata.annotations.get_or_insert_with(BTreeMap::new);
            annotations.insert(REFRESH_ANNOTATION.to_string(), refresh_value.to_string());

            match api.replace(name, &PostParams::default(), &application).await {
                Ok(_) => {
                    debug!(name, refresh_value, "triggered gitops refresh");
                    return Ok(());
                }
                Err(KubeError::Api(api_err)) if api_err.code == 409 => {
                    warn!(name, attempt, "conflict updating refresh annotation, retrying");
                    continue;
                }
                Err(err) => return Err(err.into()),
            }
        }

        Err(GitOpsError::OperationFailed(format!(
            "conflict retries exhausted refreshing application {name}"
        )))
    }

    async fn wait_for_application_ready(&self, opts: &ReconcileOptions) -> Result<(), GitOpsError> {
        let name = opts.name();
        let api: Api<DynamicObject> =
            Api::namespaced_with(self.client.clone(), ARGOCD_NAMESPACE, &application_api_resource());

        let deadline = Instant::now() + opts.timeout;
        let mut ticker = tokio::time::interval(RECONCILER_POLL_INTERVAL);

        loop {
            ticker.tick().await;

            if Instant::now() >= deadline {
                return Err(GitOpsError::ReconcileTimeout(name.to_string()));
            }

            let application = api.get(name).await?;

            match classify(&application) {
                Classification::Ready => {
                    info!(name, "application synced and healthy");
                    return Ok(());
                }
                Classification::SourceNotAvailable(message) => {
                    return Err(GitOpsError::SourceNotAvailable(message))
                }
                Classification::OperationFailed(message) => {
                    return Err(GitOpsError::OperationFailed(message))
                }
                Classification::Pending => {}
            }
        }
    }
}

enum Classification {
    Ready,
    SourceNotAvailable(String),
    OperationFailed(String),
    Pending,
}

fn classify(application: &DynamicObject) -> Classification {
    let status = &application.data["status"];

    let sync_status = status["sync"]["status"].as_str().unwrap_or("");
    let health_status = status["health"]["status"].as_str().unwrap_or("");

    if sync_status == "Synced" && health_status == "Healthy" {
        return Classification::Ready;
    }

    let operation_phase = status["operationState"]["phase"].as_str().unwrap_or("");
    let operation_message = status["operationState"]["message"].as_str().unwrap_or("");

    if matches!(operation_phase, "Error" | "Failed") {
        if is_source_error_message(operation_message) {
            return Classification::SourceNotAvailable(operation_message.to_string());
        }
        return Classification::OperationFailed(if operation_message.is_empty() {
            format!("operation phase {operation_phase}")
        } else {
            operation_message.to_string()
        });
    }

    if let Some(conditions) = status["conditions"].as_array() {
        for condition in conditions {
            let condition_type = condition["type"].as_str().unwrap_or("");
            if matches!(condition_type, "ComparisonError" | "SyncError") {
                let message = condition["message"].as_str().unwrap_or("");
                if is_source_error_message(message) {
                    return Classification::SourceNotAvailable(message.to_string());
                }
            }
        }
    }

    Classification::Pending
}
