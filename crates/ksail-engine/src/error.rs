use thiserror::Error;

use ksail_gitops::GitOpsError;
use ksail_installer::InstallerError;
use ksail_oci::OciError;
use ksail_registry::RegistryError;
use ksail_spec::SpecError;

/// Errors surfaced by the end-to-end `up`/`down` pipeline.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid cluster spec: {0}")]
    Spec(#[from] SpecError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Oci(#[from] OciError),
    #[error(transparent)]
    Installer(#[from] InstallerError),
    #[error(transparent)]
    GitOps(#[from] GitOpsError),
    #[error("node provisioning failed: {0}")]
    Provider(String),
    #[error("installer teardown reported {0} error(s): {1}")]
    TeardownErrors(usize, String),
    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<EngineError>,
    },
}

impl EngineError {
    #[must_use]
    pub fn context(self, context: impl Into<String>) -> Self {
        Self::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }
}
