//! `Build`/`BuildEmpty`: validate, collect manifests, construct a
//! deterministic layer, wrap it as an OCI image, and push.
//!
//! Grounded on `examples/newrelic-newrelic-agent-control/agent-control/src/oci.rs`'s
//! `oci_client::Client` wrapper — mirrored from its pull-side shape onto a
//! push-side one.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use oci_client::client::{Config as OciClientConfig, ImageLayer};
use oci_client::manifest::OciImageManifest;
use oci_client::secrets::RegistryAuth;
use oci_client::Reference;
use tracing::{debug, info};

use ksail_registry::normalize::{normalize_endpoint, sanitize_repository};

use crate::archive::{build_empty_layer, build_layer, collect_manifests};
use crate::error::OciError;

const LAYER_MEDIA_TYPE: &str = "application/vnd.oci.image.layer.v1.tar+gzip";

/// GitOps engine the built artifact targets, controlling whether the layer
/// duplicates entries at the archive root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GitOpsTarget {
    Flux,
    ArgoCd,
}

/// Input to [`build`] and [`build_empty`].
#[derive(Debug, Clone)]
pub struct BuildOptions {
    pub source_path: PathBuf,
    pub registry_endpoint: String,
    pub repository: Option<String>,
    pub version: String,
    pub name: Option<String>,
    pub gitops_target: GitOpsTarget,
    pub username: Option<String>,
    pub password: Option<String>,
    pub insecure: bool,
}

/// Outcome of a successful build-and-push.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildResult {
    pub name: String,
    pub version: String,
    pub endpoint: String,
    pub repository: String,
    pub tag: String,
    pub source_path: PathBuf,
    pub created_at: DateTime<Utc>,
}

fn validate_and_normalize(
    opts: &BuildOptions,
) -> Result<(String, String), OciError> {
    if opts.registry_endpoint.trim().is_empty() {
        return Err(OciError::RegistryEndpointRequired);
    }
    if opts.version.trim().is_empty() {
        return Err(OciError::VersionRequired);
    }

    let endpoint = normalize_endpoint(&opts.registry_endpoint);

    let repository = match &opts.repository {
        Some(repository) if !repository.trim().is_empty() => sanitize_repository(repository),
        _ => {
            let basename = opts
                .source_path
                .file_name()
                .and_then(|name| name.to_str())
                .unwrap_or("workload");
            sanitize_repository(basename)
        }
    };

    Ok((endpoint, repository))
}

/// Build the workload artifact from `opts.source_path` and push it.
///
/// # Errors
///
/// See `ErrSourcePathNotFound`/`ErrSourcePathNotDirectory`/`ErrNoManifestFiles`/
/// `ErrRegistryEndpointRequired`/`ErrVersionRequired` and wrapped push errors.
pub async fn build(opts: &BuildOptions) -> Result<BuildResult, OciError> {
    let (endpoint, repository) = validate_and_normalize(opts)?;

    if !opts.source_path.exists() {
        return Err(OciError::SourcePathNotFound(opts.source_path.clone()));
    }
    if !opts.source_path.is_dir() {
        return Err(OciError::SourcePathNotDirectory(opts.source_path.clone()));
    }

    let files = collect_manifests(&opts.source_path)?;
    let basename = opts
        .source_path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("source")
        .to_string();

    let single_root = matches!(opts.gitops_target, GitOpsTarget::ArgoCd);
    let layer_bytes = build_layer(&opts.source_path, &files, &basename, single_root)?;

    let name = opts.name.clone().unwrap_or_else(|| basename.clone());
    let created_at = Utc::now();

    let mut labels = BTreeMap::new();
    labels.insert("org.opencontainers.image.title".to_string(), name.clone());
    labels.insert(
        "org.opencontainers.image.version".to_string(),
        opts.version.clone(),
    );
    labels.insert(
        "org.opencontainers.image.source".to_string(),
        opts.source_path.display().to_string(),
    );
    labels.insert(
        "devantler.tech/ksail/repository".to_string(),
        repository.clone(),
    );
    labels.insert(
        "devantler.tech/ksail/registryEndpoint".to_string(),
        endpoint.clone(),
    );

    push(
        &endpoint,
        &repository,
        &opts.version,
        layer_bytes,
        labels,
        opts.username.as_deref(),
        opts.password.as_deref(),
        opts.insecure,
    )
    .await?;

    Ok(BuildResult {
        name,
        version: opts.version.clone(),
        endpoint,
        repository,
        tag: opts.version.clone(),
        source_path: opts.source_path.clone(),
        created_at,
    })
}

/// Build and push the empty-workload artifact: a single `kustomization.yaml`
/// with no resources, used to clear a GitOps source to a no-op state.
///
/// # Errors
///
/// `ErrRegistryEndpointRequired`, `ErrVersionRequired`, `ErrRepositoryRequired`.
pub async fn build_empty(opts: &BuildOptions) -> Result<BuildResult, OciError> {
    if opts.registry_endpoint.trim().is_empty() {
        return Err(OciError::RegistryEndpointRequired);
    }
    if opts.version.trim().is_empty() {
        return Err(OciError::VersionRequired);
    }
    let repository = match &opts.repository {
        Some(repository) if !repository.trim().is_empty() => sanitize_repository(repository),
        _ => return Err(OciError::RepositoryRequired),
    };

    let endpoint = normalize_endpoint(&opts.registry_endpoint);
    let layer_bytes = build_empty_layer()?;
    let name = opts.name.clone().unwrap_or_else(|| repository.clone());
    let created_at = Utc::now();

    let mut labels = BTreeMap::new();
    labels.insert("org.opencontainers.image.title".to_string(), name.clone());
    labels.insert(
        "org.opencontainers.image.version".to_string(),
        opts.version.clone(),
    );
    labels.insert(
        "devantler.tech/ksail/repository".to_string(),
        repository.clone(),
    );
    labels.insert(
        "devantler.tech/ksail/registryEndpoint".to_string(),
        endpoint.clone(),
    );
    labels.insert("devantler.tech/ksail/empty".to_string(), "true".to_string());

    push(
        &endpoint,
        &repository,
        &opts.version,
        layer_bytes,
        labels,
        opts.username.as_deref(),
        opts.password.as_deref(),
        opts.insecure,
    )
    .await?;

    Ok(BuildResult {
        name,
        version: opts.version.clone(),
        endpoint,
        repository,
        tag: opts.version.clone(),
        source_path: opts.source_path.clone(),
        created_at,
    })
}

#[allow(clippy::too_many_arguments)]
async fn push(
    endpoint: &str,
    repository: &str,
    version: &str,
    layer_bytes: Vec<u8>,
    labels: BTreeMap<String, String>,
    username: Option<&str>,
    password: Option<&str>,
    insecure: bool,
) -> Result<(), OciError> {
    let protocol = if insecure {
        oci_client::client::ClientProtocol::Http
    } else {
        oci_client::client::ClientProtocol::Https
    };

    let client = oci_client::Client::new(OciClientConfig {
        protocol,
        ..Default::default()
    });

    let auth = match (username, password) {
        (Some(username), Some(password)) => {
            RegistryAuth::Basic(username.to_string(), password.to_string())
        }
        _ => RegistryAuth::Anonymous,
    };

    let reference = Reference::try_from(format!("{endpoint}/{repository}:{version}"))
        .map_err(|err| OciError::Push(err.to_string()))?;

    let config_bytes = serde_json::to_vec(&serde_json::json!({
        "architecture": std::env::consts::ARCH,
        "os": std::env::consts::OS,
        "created": Utc::now().to_rfc3339(),
    }))
    .unwrap_or_default();
    let layer = ImageLayer::new(layer_bytes, LAYER_MEDIA_TYPE.to_string(), None);
    let config = oci_client::client::Config::oci_v1(config_bytes, None);

    let manifest = OciImageManifest::build(std::slice::from_ref(&layer), &config, Some(labels));

    debug!(endpoint, repository, version, "pushing workload artifact");

    client
        .push(&reference, &[layer], config, &auth, Some(manifest))
        .await
        .map_err(|err| OciError::Push(err.to_string()))?;

    info!(endpoint, repository, version, "pushed workload artifact");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_file(dir: &Path, relative: &str, contents: &str) {
        let path = dir.join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, contents).unwrap();
    }

    #[test]
    fn repository_defaults_to_sanitized_basename() {
        let dir = tempfile::tempdir().unwrap();
        let opts = BuildOptions {
            source_path: dir.path().join("My-App"),
            registry_endpoint: "ghcr.io".to_string(),
            repository: None,
            version: "v1".to_string(),
            name: None,
            gitops_target: GitOpsTarget::Flux,
            username: None,
            password: None,
            insecure: false,
        };
        let (_endpoint, repository) = validate_and_normalize(&opts).unwrap();
        assert_eq!(repository, "my-app");
    }

    #[tokio::test]
    async fn empty_version_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "a.yaml", "a: 1");
        let opts = BuildOptions {
            source_path: dir.path().to_path_buf(),
            registry_endpoint: "ghcr.io".to_string(),
            repository: Some("demo".to_string()),
            version: "   ".to_string(),
            name: None,
            gitops_target: GitOpsTarget::Flux,
            username: None,
            password: None,
            insecure: false,
        };

        let err = build(&opts).await.unwrap_err();
        assert!(matches!(err, OciError::VersionRequired));
    }

    #[tokio::test]
    async fn missing_repository_is_rejected_for_empty_build() {
        let dir = tempfile::tempdir().unwrap();
        let opts = BuildOptions {
            source_path: dir.path().to_path_buf(),
            registry_endpoint: "ghcr.io".to_string(),
            repository: None,
            version: "v1".to_string(),
            name: None,
            gitops_target: GitOpsTarget::ArgoCd,
            username: None,
            password: None,
            insecure: false,
        };

        let err = build_empty(&opts).await.unwrap_err();
        assert!(matches!(err, OciError::RepositoryRequired));
    }

    #[tokio::test]
    async fn missing_source_path_is_rejected() {
        let opts = BuildOptions {
            source_path: PathBuf::from("/nonexistent/path/for/test"),
            registry_endpoint: "ghcr.io".to_string(),
            repository: Some("demo".to_string()),
            version: "v1".to_string(),
            name: None,
            gitops_target: GitOpsTarget::Flux,
            username: None,
            password: None,
            insecure: false,
        };

        let err = build(&opts).await.unwrap_err();
        assert!(matches!(err, OciError::SourcePathNotFound(_)));
    }
}
