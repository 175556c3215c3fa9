use thiserror::Error;

/// Errors surfaced by the GitOps managers and reconciler.
#[derive(Debug, Error)]
pub enum GitOpsError {
    #[error("kubernetes request failed: {0}")]
    Kube(#[from] kube::Error),
    #[error("gitops source not available: {0}")]
    SourceNotAvailable(String),
    #[error("gitops operation failed: {0}")]
    OperationFailed(String),
    #[error("reconcile timed out waiting for {0} to become Synced+Healthy")]
    ReconcileTimeout(String),
    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<GitOpsError>,
    },
}

impl GitOpsError {
    #[must_use]
    pub fn context(self, context: impl Into<String>) -> Self {
        Self::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }
}

/// Message fragments that classify a degraded Application/operation state as
/// source-side unavailability rather than a generic operation failure
/// (spec §4.9).
pub const SOURCE_ERROR_SIGNATURES: [&str; 7] = [
    "manifest unknown",
    "not found",
    "does not exist",
    "failed to fetch",
    "repository not found",
    "unable to resolve",
    "connection refused",
];

#[must_use]
pub fn is_source_error_message(message: &str) -> bool {
    let lower = message.to_lowercase();
    SOURCE_ERROR_SIGNATURES
        .iter()
        .any(|signature| lower.contains(signature))
}
