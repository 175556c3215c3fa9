use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced by the OCI workload artifact builder.
#[derive(Debug, Error)]
pub enum OciError {
    #[error("source path not found: {0}")]
    SourcePathNotFound(PathBuf),
    #[error("source path is not a directory: {0}")]
    SourcePathNotDirectory(PathBuf),
    #[error("no manifest files found under {0}")]
    NoManifestFiles(PathBuf),
    #[error("manifest file is empty: {0}")]
    EmptyManifestFile(PathBuf),
    #[error("registry endpoint is required")]
    RegistryEndpointRequired,
    #[error("version is required")]
    VersionRequired,
    #[error("repository is required")]
    RepositoryRequired,
    #[error("reading manifest tree: {0}")]
    Io(#[from] std::io::Error),
    #[error("building archive: {0}")]
    Archive(String),
    #[error("pushing artifact: {0}")]
    Push(String),
}
