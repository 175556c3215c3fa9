use thiserror::Error;

/// Errors surfaced by the registry verifier and resolver.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("no registry could be resolved from flag/env, cluster spec, GitOps resources, or Docker")]
    NoRegistryFound,
    #[error("registry endpoint is required")]
    EndpointRequired,
    #[error("registry unreachable: {0}")]
    Unreachable(String),
    #[error("registry authentication required: {0}")]
    AuthRequired(String),
    #[error("permission denied pushing to registry: {0}")]
    PermissionDenied(String),
    #[error("unexpected registry response: {0}")]
    Other(String),
    #[error("kubernetes request failed: {0}")]
    Kube(#[from] kube::Error),
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("failed to run docker: {0}")]
    Docker(String),
}
