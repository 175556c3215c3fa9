//! `up`/`down` — end-to-end sequencing of C2-C10 (spec §4.11).
//!
//! Grounded on `examples/5dlabs-cto/crates/installer/src/orchestrator.rs`'s
//! `run_to_completion` top-level driver, generalized from a fixed install
//! step sequence to the spec's registry -> artifact -> nodes -> installers
//! -> gitops -> reconcile pipeline.

use std::sync::Arc;
use std::time::Duration;

use kube::Client;
use tracing::info;

use ksail_gitops::argocd::{ArgoCdManager, EnsureOptions as ArgoCdEnsureOptions};
use ksail_gitops::flux::{EnsureOptions as FluxEnsureOptions, FluxInstanceManager};
use ksail_gitops::reconciler::{GitOpsReconciler, ReconcileOptions};
use ksail_installer::{build_installers, HelmClient, Orchestrator};
use ksail_oci::{self, BuildOptions, GitOpsTarget};
use ksail_registry::{self, ResolvedRegistry};
use ksail_spec::{ClusterSpec, GitOpsEngine};

use crate::error::EngineError;
use crate::provider::NodeProvisioner;

const DEFAULT_ARTIFACT_TAG: &str = "dev";
const DEFAULT_FLUX_DISTRIBUTION_VERSION: &str = "2.x";
const DEFAULT_FLUX_DISTRIBUTION_REGISTRY: &str = "ghcr.io/fluxcd";

/// Everything `up`/`down` need that isn't carried on the [`ClusterSpec`]
/// itself: injected clients and the timeouts the spec assigns to each
/// suspension point.
pub struct EngineContext {
    pub kube_client: Client,
    pub helm: Arc<dyn HelmClient>,
    pub provisioner: Arc<dyn NodeProvisioner>,
    /// Explicit registry coordinate from a flag or environment variable,
    /// taking priority over every other resolution source.
    pub registry_flag_or_env: Option<String>,
    pub readiness_timeout: Duration,
    pub reconcile_timeout: Duration,
}

/// `up(spec)`: resolve the registry, build and push the workload artifact,
/// provision nodes, install components phase by phase, then ensure and
/// reconcile the GitOps engine.
///
/// # Errors
///
/// Returns the first failing step's error, wrapped with context identifying
/// which step failed.
pub async fn up(ctx: &EngineContext, spec: &ClusterSpec) -> Result<(), EngineError> {
    spec.validate()?;
    let spec = spec.effective();

    // Registry resolution and the artifact push happen first, as spec'd in
    // §4.11's numbered `up` sequence — they're skipped entirely when there's
    // no GitOps engine to read the artifact back (DESIGN.md open question).
    let pushed = if spec.git_ops_engine == GitOpsEngine::None {
        None
    } else {
        let resolved = resolve_registry(ctx, &spec).await?;
        let artifact = push_artifact(&spec, &resolved).await?;
        Some((resolved, artifact))
    };

    info!(cluster = spec.name, "provisioning nodes");
    ctx.provisioner
        .create_nodes(&spec)
        .await
        .map_err(|err| err.context("create nodes"))?;

    info!(cluster = spec.name, "installing components");
    let installers = build_installers(&spec, Arc::clone(&ctx.helm));
    let orchestrator = Orchestrator::new(installers, ctx.readiness_timeout, Some(ctx.kube_client.clone()));
    orchestrator
        .install_all()
        .await
        .map_err(|err| EngineError::from(err).context("install components"))?;

    let Some((resolved, artifact)) = pushed else {
        return Ok(());
    };

    ensure_gitops(ctx, &spec, &resolved, &artifact).await?;

    info!(cluster = spec.name, "reconciling gitops");
    let reconciler = GitOpsReconciler::new(ctx.kube_client.clone());
    reconciler
        .reconcile(&ReconcileOptions {
            application_name: None,
            timeout: ctx.reconcile_timeout,
            hard_refresh: true,
        })
        .await
        .map_err(|err| EngineError::from(err).context("reconcile gitops"))?;

    Ok(())
}

/// `down(spec)`: uninstall components in reverse phase order (errors
/// collected, not aborted on), then delete nodes. The reconciler is never
/// invoked.
///
/// # Errors
///
/// Returns [`EngineError::TeardownErrors`] if any installer failed to
/// uninstall, or the node-deletion error if that step fails.
pub async fn down(ctx: &EngineContext, spec: &ClusterSpec) -> Result<(), EngineError> {
    spec.validate()?;
    let spec = spec.effective();

    info!(cluster = spec.name, "uninstalling components");
    let installers = build_installers(&spec, Arc::clone(&ctx.helm));
    let orchestrator = Orchestrator::new(installers, ctx.readiness_timeout, Some(ctx.kube_client.clone()));
    let errors = orchestrator.uninstall_all().await;

    info!(cluster = spec.name, "deleting nodes");
    ctx.provisioner
        .delete_nodes(&spec)
        .await
        .map_err(|err| err.context("delete nodes"))?;

    if !errors.is_empty() {
        let summary = errors
            .iter()
            .map(|(key, err)| format!("{key}: {err}"))
            .collect::<Vec<_>>()
            .join("; ");
        return Err(EngineError::TeardownErrors(errors.len(), summary));
    }

    Ok(())
}

async fn resolve_registry(ctx: &EngineContext, spec: &ClusterSpec) -> Result<ResolvedRegistry, EngineError> {
    let resolved = ksail_registry::resolve(
        spec,
        ctx.registry_flag_or_env.as_deref(),
        Some(&ctx.kube_client),
    )
    .await
    .map_err(|err| EngineError::from(err).context("resolve registry"))?;

    ksail_registry::merge_gitops_credentials(resolved, spec, &ctx.kube_client)
        .await
        .map_err(|err| EngineError::from(err).context("merge gitops credentials"))
}

fn gitops_target_for(engine: GitOpsEngine) -> GitOpsTarget {
    match engine {
        GitOpsEngine::Flux => GitOpsTarget::Flux,
        GitOpsEngine::ArgoCd | GitOpsEngine::None => GitOpsTarget::ArgoCd,
    }
}

async fn push_artifact(
    spec: &ClusterSpec,
    resolved: &ResolvedRegistry,
) -> Result<ksail_oci::BuildResult, EngineError> {
    let Some(source_directory) = spec.source_directory.clone() else {
        return Err(EngineError::Oci(ksail_oci::OciError::SourcePathNotFound(
            std::path::PathBuf::new(),
        )));
    };

    let opts = BuildOptions {
        source_path: source_directory,
        registry_endpoint: resolved.endpoint.clone(),
        repository: resolved.repository.clone(),
        version: resolved
            .tag
            .clone()
            .or_else(|| spec.local_registry.tag.clone())
            .unwrap_or_else(|| DEFAULT_ARTIFACT_TAG.to_string()),
        name: None,
        gitops_target: gitops_target_for(spec.git_ops_engine),
        username: resolved.username.clone(),
        password: resolved.password.clone(),
        insecure: !resolved.is_external(),
    };

    ksail_oci::build(&opts)
        .await
        .map_err(|err| EngineError::from(err).context("build and push workload artifact"))
}

async fn ensure_gitops(
    ctx: &EngineContext,
    spec: &ClusterSpec,
    resolved: &ResolvedRegistry,
    artifact: &ksail_oci::BuildResult,
) -> Result<(), EngineError> {
    let repo_url = format!("oci://{}/{}", artifact.endpoint, artifact.repository);
    let insecure = !resolved.is_external();

    match spec.git_ops_engine {
        GitOpsEngine::ArgoCd => {
            let manager = ArgoCdManager::new(ctx.kube_client.clone());
            let mut opts = ArgoCdEnsureOptions::new(repo_url, artifact.tag.clone());
            opts.insecure = insecure;
            opts.username = resolved.username.clone();
            opts.password = resolved.password.clone();
            manager
                .ensure(&opts)
                .await
                .map_err(|err| EngineError::from(err).context("ensure argocd application"))
        }
        GitOpsEngine::Flux => {
            let manager = FluxInstanceManager::new(ctx.kube_client.clone());
            let opts = FluxEnsureOptions {
                distribution_version: DEFAULT_FLUX_DISTRIBUTION_VERSION.to_string(),
                distribution_registry: DEFAULT_FLUX_DISTRIBUTION_REGISTRY.to_string(),
                repo_url,
                tag: artifact.tag.clone(),
                interval: None,
                pull_secret: None,
            };
            manager
                .ensure(&opts)
                .await
                .map_err(|err| EngineError::from(err).context("ensure flux instance"))
        }
        GitOpsEngine::None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ksail_spec::{Cni, Distribution, Provider, Tristate};

    fn base_spec() -> ClusterSpec {
        ClusterSpec {
            name: "demo".to_string(),
            distribution: Distribution::Vanilla,
            provider: Provider::Docker,
            cni: Cni::Default,
            csi: Tristate::Default,
            load_balancer: Tristate::Default,
            metrics_server: Tristate::Default,
            cert_manager: Tristate::Default,
            policy_engine: ksail_spec::PolicyEngine::None,
            git_ops_engine: GitOpsEngine::None,
            source_directory: None,
            local_registry: ksail_spec::LocalRegistrySpec::default(),
            connection: ksail_spec::ConnectionSpec::default(),
        }
    }

    #[tokio::test]
    async fn push_artifact_requires_a_source_directory() {
        let spec = base_spec();
        let resolved = ResolvedRegistry {
            endpoint: "localhost:5050".to_string(),
            host: "localhost".to_string(),
            port: Some(5050),
            repository: None,
            tag: None,
            username: None,
            password: None,
            source: ksail_registry::ResolutionSource::DockerContainer,
        };

        let result = push_artifact(&spec, &resolved).await;
        assert!(matches!(
            result,
            Err(EngineError::Oci(ksail_oci::OciError::SourcePathNotFound(_)))
        ));
    }

    #[test]
    fn gitops_target_follows_the_selected_engine() {
        assert_eq!(gitops_target_for(GitOpsEngine::Flux), GitOpsTarget::Flux);
        assert_eq!(gitops_target_for(GitOpsEngine::ArgoCd), GitOpsTarget::ArgoCd);
        assert_eq!(gitops_target_for(GitOpsEngine::None), GitOpsTarget::ArgoCd);
    }
}
