use thiserror::Error;

/// Errors surfaced by installers and the orchestrator.
#[derive(Debug, Error)]
pub enum InstallerError {
    #[error("helm: {0}")]
    Helm(String),
    #[error("kubernetes request failed: {0}")]
    Kube(#[from] kube::Error),
    #[error("readiness timeout waiting for {0}")]
    ReadinessTimeout(String),
    #[error("CRD not established: {0}")]
    CrdNotEstablished(String),
    #[error("unknown installer key: {0}")]
    UnknownInstaller(String),
    #[error("cloud-provider-kind: {0}")]
    CloudProviderKind(String),
    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<InstallerError>,
    },
}

impl InstallerError {
    #[must_use]
    pub fn context(self, context: impl Into<String>) -> Self {
        Self::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Transient errors are retried by the orchestrator rather than
    /// surfaced immediately (spec §7 policy).
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Kube(err) => matches!(
                err,
                kube::Error::Api(api_err) if api_err.code == 409 || api_err.code == 503
            ),
            Self::Context { source, .. } => source.is_transient(),
            _ => false,
        }
    }
}
