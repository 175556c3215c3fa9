//! Registry coordinate resolution — the five-step priority chain from
//! spec §4.3/§8 item 10: explicit flag/env, cluster spec, live GitOps
//! resource, Docker container discovery, and finally "none".

use std::env;

use kube::api::DynamicObject;
use kube::discovery::ApiResource;
use kube::{Api, Client};
use tokio::process::Command;
use tracing::debug;

use ksail_spec::{ClusterSpec, GitOpsEngine};

use crate::docker_config::{self, Credentials as DockerCredentials};
use crate::error::RegistryError;
use crate::normalize::{sanitize_repository, split_endpoint_and_path};
use crate::verifier::Credentials;

/// A fully resolved registry coordinate, ready to hand to the builder (C2)
/// or the verifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRegistry {
    pub endpoint: String,
    pub host: String,
    pub port: Option<u16>,
    pub repository: Option<String>,
    pub tag: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub source: ResolutionSource,
}

/// Which of the five priority steps produced the [`ResolvedRegistry`] —
/// kept on the value so callers and tests can assert on provenance, not
/// just the resolved coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionSource {
    FlagOrEnv,
    ClusterSpec,
    GitOpsResource,
    DockerContainer,
}

impl ResolvedRegistry {
    /// Credentials in the shape the verifier expects.
    #[must_use]
    pub fn credentials(&self) -> Credentials {
        Credentials {
            username: self.username.clone(),
            password: self.password.clone(),
        }
    }

    /// `true` unless this registry was discovered as a Docker-hosted local
    /// registry, in which case GitOps managers connect to it insecurely
    /// (spec §4.11: `insecure = !R.isExternal`).
    #[must_use]
    pub fn is_external(&self) -> bool {
        self.source != ResolutionSource::DockerContainer
    }
}

/// Parse a `[user:pass@]host[:port][/path]` coordinate, expanding `$VAR` /
/// `${VAR}` references in the user/pass segment from the process
/// environment. The `/path` component, if present, becomes the resolved
/// repository (spec S4: `ghcr.io/team/app` → `Host:"ghcr.io"`,
/// `Repository:"team/app"`).
fn parse_flag_or_env(raw: &str) -> ResolvedRegistry {
    let (creds, rest) = match raw.split_once('@') {
        Some((creds, rest)) => (Some(creds), rest),
        None => (None, raw),
    };

    let (username, password) = match creds {
        Some(creds) => match creds.split_once(':') {
            Some((u, p)) => (Some(expand_env(u)), Some(expand_env(p))),
            None => (Some(expand_env(creds)), None),
        },
        None => (None, None),
    };

    let (endpoint, repository) = split_endpoint_and_path(rest);
    let (host, port) = split_host_port(&endpoint);

    ResolvedRegistry {
        endpoint,
        host,
        port,
        repository: repository.map(|repository| sanitize_repository(&repository)),
        tag: None,
        username,
        password,
        source: ResolutionSource::FlagOrEnv,
    }
}

/// Split a normalized `host[:port]` endpoint into its host and numeric port,
/// if the trailing segment after the last `:` is all digits.
fn split_host_port(endpoint: &str) -> (String, Option<u16>) {
    match endpoint.rsplit_once(':') {
        Some((host, port)) if !port.is_empty() && port.chars().all(|c| c.is_ascii_digit()) => {
            (host.to_string(), port.parse().ok())
        }
        _ => (endpoint.to_string(), None),
    }
}

fn expand_env(value: &str) -> String {
    let trimmed = value
        .strip_prefix("${")
        .and_then(|v| v.strip_suffix('}'))
        .or_else(|| value.strip_prefix('$'));

    match trimmed {
        Some(var_name) => env::var(var_name).unwrap_or_else(|_| value.to_string()),
        None => value.to_string(),
    }
}

/// Resolve a registry coordinate using the five-step priority chain.
///
/// 1. `flag_or_env`, if `Some` and non-empty.
/// 2. `spec.local_registry`, if enabled.
/// 3. A live GitOps resource on the cluster (`FluxInstance/flux-system/flux`
///    or `Application/argocd/ksail`), translating a `-local-registry`
///    suffixed hostname to `localhost` plus its published port.
/// 4. A running Docker container named `{cluster}-local-registry`, or
///    failing that any container whose name ends in `-local-registry`.
/// 5. [`RegistryError::NoRegistryFound`].
pub async fn resolve(
    spec: &ClusterSpec,
    flag_or_env: Option<&str>,
    kube_client: Option<&Client>,
) -> Result<ResolvedRegistry, RegistryError> {
    if let Some(raw) = flag_or_env {
        if !raw.trim().is_empty() {
            debug!("resolving registry from flag/env override");
            return Ok(parse_flag_or_env(raw));
        }
    }

    if spec.local_registry.enabled {
        debug!(cluster = spec.name, "resolving registry from cluster spec");
        let host = spec.local_registry.host.as_deref().unwrap_or("localhost");
        let port = spec.local_registry.port.unwrap_or(5050);
        return Ok(ResolvedRegistry {
            endpoint: format!("{host}:{port}"),
            host: host.to_string(),
            port: Some(port),
            repository: spec
                .local_registry
                .path
                .clone()
                .map(|path| sanitize_repository(&path)),
            tag: spec.local_registry.tag.clone(),
            username: spec.local_registry.username.clone(),
            password: spec.local_registry.password.clone(),
            source: ResolutionSource::ClusterSpec,
        });
    }

    if let Some(client) = kube_client {
        if let Some(resolved) = resolve_from_gitops_resource(spec, client).await? {
            debug!(endpoint = resolved.endpoint, "resolved registry from gitops resource");
            return Ok(resolved);
        }
    }

    if let Some(resolved) = resolve_from_docker(spec).await? {
        debug!(endpoint = resolved.endpoint, "resolved registry from docker container");
        return Ok(resolved);
    }

    Err(RegistryError::NoRegistryFound)
}

async fn resolve_from_gitops_resource(
    spec: &ClusterSpec,
    client: &Client,
) -> Result<Option<ResolvedRegistry>, RegistryError> {
    let (api_resource, namespace, name, url_field, tag_field) = match spec.git_ops_engine {
        GitOpsEngine::Flux => (
            ApiResource::from_gvk_with_plural(
                &kube::core::GroupVersionKind::gvk("fluxcd.controlplane.io", "v1", "FluxInstance"),
                "fluxinstances",
            ),
            "flux-system",
            "flux",
            "spec.sync.url",
            "spec.sync.ref.tag",
        ),
        GitOpsEngine::ArgoCd => (
            ApiResource::from_gvk_with_plural(
                &kube::core::GroupVersionKind::gvk("argoproj.io", "v1alpha1", "Application"),
                "applications",
            ),
            "argocd",
            "ksail",
            "spec.source.repoURL",
            "spec.source.targetRevision",
        ),
        GitOpsEngine::None => return Ok(None),
    };

    let api: Api<DynamicObject> = Api::namespaced_with(client.clone(), namespace, &api_resource);
    let object = match api.get_opt(name).await? {
        Some(object) => object,
        None => return Ok(None),
    };

    let raw_url = dig_field(&object, url_field);
    let Some(raw_url) = raw_url else {
        return Ok(None);
    };
    let tag = dig_field(&object, tag_field);

    let (endpoint, repository) = translate_local_registry_hostname(&raw_url);
    let (host, port) = split_host_port(&endpoint);

    Ok(Some(ResolvedRegistry {
        endpoint,
        host,
        port,
        repository: repository.map(|repository| sanitize_repository(&repository)),
        tag,
        username: None,
        password: None,
        source: ResolutionSource::GitOpsResource,
    }))
}

/// Walk a dotted field path (e.g. `spec.source.repoURL`) through a
/// `DynamicObject`'s untyped JSON body.
fn dig_field(object: &DynamicObject, dotted_path: &str) -> Option<String> {
    let mut current = object.data.clone();
    for segment in dotted_path.split('.') {
        current = current.get(segment)?.clone();
    }
    current.as_str().map(str::to_string)
}

/// An in-cluster `*-local-registry` hostname is only reachable from inside
/// the cluster network; translate it to the host-published address so the
/// CLI process (running outside the cluster) can reach it. Returns the
/// translated endpoint alongside the repository path the raw URL carried
/// (if any), since `*-local-registry` hosts still keep their path.
fn translate_local_registry_hostname(raw: &str) -> (String, Option<String>) {
    let (endpoint, repository) = split_endpoint_and_path(raw);
    if let Some(host) = endpoint.split(':').next() {
        if host.ends_with("-local-registry") {
            return ("localhost:5050".to_string(), repository);
        }
    }
    (endpoint, repository)
}

async fn resolve_from_docker(
    spec: &ClusterSpec,
) -> Result<Option<ResolvedRegistry>, RegistryError> {
    let output = Command::new("docker")
        .args(["ps", "--format", "{{.Names}}"])
        .output()
        .await
        .map_err(|err| RegistryError::Docker(err.to_string()))?;

    if !output.status.success() {
        return Ok(None);
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let names: Vec<&str> = stdout.lines().collect();

    let preferred = format!("{}-local-registry", spec.name);
    let container_name = names
        .iter()
        .find(|name| **name == preferred)
        .or_else(|| names.iter().find(|name| name.ends_with("-local-registry")))
        .copied();

    Ok(container_name.map(|name| ResolvedRegistry {
        endpoint: format!("{name}:5000"),
        host: name.to_string(),
        port: Some(5000),
        repository: None,
        tag: None,
        username: None,
        password: None,
        source: ResolutionSource::DockerContainer,
    }))
}

/// Merge credentials from Flux's `flux-system/ksail-registry-credentials`
/// `.dockerconfigjson` Secret, or Argo CD's
/// `argocd/ksail-local-registry-repo` username/password Secret, into a
/// resolved registry that didn't already carry inline credentials.
pub async fn merge_gitops_credentials(
    resolved: ResolvedRegistry,
    spec: &ClusterSpec,
    client: &Client,
) -> Result<ResolvedRegistry, RegistryError> {
    if resolved.username.is_some() {
        return Ok(resolved);
    }

    match spec.git_ops_engine {
        GitOpsEngine::Flux => {
            let secrets: Api<k8s_openapi::api::core::v1::Secret> =
                Api::namespaced(client.clone(), "flux-system");
            let Ok(secret) = secrets.get("ksail-registry-credentials").await else {
                return Ok(resolved);
            };
            let Some(data) = secret.data else {
                return Ok(resolved);
            };
            let Some(dockerconfigjson) = data.get(".dockerconfigjson") else {
                return Ok(resolved);
            };
            let raw = String::from_utf8_lossy(&dockerconfigjson.0).to_string();
            if let Some(DockerCredentials { username, password }) =
                docker_config::lookup_credentials(&raw, &resolved.host)
            {
                return Ok(ResolvedRegistry {
                    username: Some(username),
                    password: Some(password),
                    ..resolved
                });
            }
            Ok(resolved)
        }
        GitOpsEngine::ArgoCd => {
            let secrets: Api<k8s_openapi::api::core::v1::Secret> =
                Api::namespaced(client.clone(), "argocd");
            let Ok(secret) = secrets.get("ksail-local-registry-repo").await else {
                return Ok(resolved);
            };
            let Some(data) = secret.data else {
                return Ok(resolved);
            };
            let username = data
                .get("username")
                .map(|v| String::from_utf8_lossy(&v.0).to_string());
            let password = data
                .get("password")
                .map(|v| String::from_utf8_lossy(&v.0).to_string());
            Ok(ResolvedRegistry {
                username,
                password,
                ..resolved
            })
        }
        GitOpsEngine::None => Ok(resolved),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_host_port() {
        let resolved = parse_flag_or_env("ghcr.io:443");
        assert_eq!(resolved.endpoint, "ghcr.io:443");
        assert_eq!(resolved.host, "ghcr.io");
        assert_eq!(resolved.port, Some(443));
        assert!(resolved.repository.is_none());
        assert!(resolved.username.is_none());
        assert_eq!(resolved.source, ResolutionSource::FlagOrEnv);
    }

    #[test]
    fn parses_inline_credentials() {
        let resolved = parse_flag_or_env("admin:s3cr3t@registry.local:5000");
        assert_eq!(resolved.endpoint, "registry.local:5000");
        assert_eq!(resolved.username.as_deref(), Some("admin"));
        assert_eq!(resolved.password.as_deref(), Some("s3cr3t"));
    }

    #[test]
    fn expands_env_var_credentials() {
        std::env::set_var("KSAIL_TEST_REGISTRY_PASSWORD", "from-env");
        let resolved = parse_flag_or_env("admin:$KSAIL_TEST_REGISTRY_PASSWORD@registry.local");
        assert_eq!(resolved.password.as_deref(), Some("from-env"));
        std::env::remove_var("KSAIL_TEST_REGISTRY_PASSWORD");
    }

    #[test]
    fn parses_host_and_repository_from_flag_path() {
        let resolved = parse_flag_or_env("user:pass@ghcr.io/team/app");
        assert_eq!(resolved.host, "ghcr.io");
        assert_eq!(resolved.port, None);
        assert_eq!(resolved.repository.as_deref(), Some("team/app"));
        assert_eq!(resolved.username.as_deref(), Some("user"));
        assert_eq!(resolved.password.as_deref(), Some("pass"));
    }

    #[test]
    fn translates_in_cluster_local_registry_hostname() {
        assert_eq!(
            translate_local_registry_hostname("my-cluster-local-registry:5000"),
            ("localhost:5050".to_string(), None)
        );
    }

    #[test]
    fn leaves_external_hostnames_untouched() {
        assert_eq!(
            translate_local_registry_hostname("ghcr.io"),
            ("ghcr.io".to_string(), None)
        );
    }

    fn minimal_spec() -> ClusterSpec {
        ClusterSpec {
            name: "demo".to_string(),
            distribution: ksail_spec::Distribution::Vanilla,
            provider: ksail_spec::Provider::Docker,
            cni: ksail_spec::Cni::Default,
            csi: ksail_spec::Tristate::Default,
            load_balancer: ksail_spec::Tristate::Default,
            metrics_server: ksail_spec::Tristate::Default,
            cert_manager: ksail_spec::Tristate::Default,
            policy_engine: ksail_spec::PolicyEngine::None,
            git_ops_engine: GitOpsEngine::None,
            source_directory: None,
            local_registry: ksail_spec::LocalRegistrySpec::default(),
            connection: ksail_spec::ConnectionSpec::default(),
        }
    }

    #[tokio::test]
    async fn flag_or_env_takes_priority_over_cluster_spec() {
        let mut spec = minimal_spec();
        spec.local_registry = ksail_spec::LocalRegistrySpec {
            enabled: true,
            host: Some("localhost".to_string()),
            port: Some(5050),
            ..Default::default()
        };

        let resolved = resolve(&spec, Some("ghcr.io"), None).await.unwrap();
        assert_eq!(resolved.source, ResolutionSource::FlagOrEnv);
        assert_eq!(resolved.endpoint, "ghcr.io");
    }

    #[tokio::test]
    async fn falls_back_to_cluster_spec_when_no_flag() {
        let mut spec = minimal_spec();
        spec.local_registry = ksail_spec::LocalRegistrySpec {
            enabled: true,
            host: Some("localhost".to_string()),
            port: Some(5050),
            ..Default::default()
        };

        let resolved = resolve(&spec, None, None).await.unwrap();
        assert_eq!(resolved.source, ResolutionSource::ClusterSpec);
        assert_eq!(resolved.endpoint, "localhost:5050");
    }

    /// S4 — registry resolver: flag beats config, and the flag's `/path`
    /// segment carries through as the repository.
    #[tokio::test]
    async fn flag_with_repository_path_beats_cluster_spec() {
        let mut spec = minimal_spec();
        spec.local_registry = ksail_spec::LocalRegistrySpec {
            enabled: true,
            host: Some("localhost".to_string()),
            port: Some(5000),
            ..Default::default()
        };

        let resolved = resolve(&spec, Some("user:pass@ghcr.io/team/app"), None)
            .await
            .unwrap();

        assert_eq!(resolved.host, "ghcr.io");
        assert_eq!(resolved.port, None);
        assert_eq!(resolved.repository.as_deref(), Some("team/app"));
        assert_eq!(resolved.username.as_deref(), Some("user"));
        assert_eq!(resolved.password.as_deref(), Some("pass"));
        assert!(resolved.is_external());
        assert_eq!(resolved.source, ResolutionSource::FlagOrEnv);
    }

    #[tokio::test]
    async fn no_registry_found_when_nothing_resolves() {
        let spec = minimal_spec();
        let err = resolve(&spec, None, None).await.unwrap_err();
        assert!(
            matches!(err, RegistryError::NoRegistryFound) || matches!(err, RegistryError::Docker(_))
        );
    }
}
