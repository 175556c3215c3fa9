//! Assembles the per-field probes into one effective [`ClusterSpec`].
//!
//! Every probe is a read-only call; the first one to fail short-circuits
//! detection and its error propagates, as spec §4.4 requires — there is no
//! partial-spec fallback.

use ksail_spec::{ClusterSpec, ConnectionSpec, Distribution, LocalRegistrySpec, Provider};
use tracing::debug;

use crate::docker_probe::DockerContainerProbe;
use crate::error::DetectorError;
use crate::helm_probe::HelmReleaseProbe;
use crate::kube_probe::DeploymentProbe;
use crate::probes::{
    detect_cert_manager, detect_cni, detect_csi, detect_git_ops_engine, detect_load_balancer,
    detect_metrics_server, detect_policy_engine,
};

/// Probe a live cluster and reconstruct the `ClusterSpec` that would have
/// produced its current component set, given the fixed `(name, distribution,
/// provider)` the caller already knows.
///
/// # Errors
///
/// Returns the first probe's error; no partial spec is returned on failure.
pub async fn detect(
    name: &str,
    distribution: Distribution,
    provider: Provider,
    helm: &dyn HelmReleaseProbe,
    docker: &dyn DockerContainerProbe,
    deployments: &dyn DeploymentProbe,
) -> Result<ClusterSpec, DetectorError> {
    let cni = detect_cni(helm).await.map_err(|err| err.context("detect cni"))?;
    let csi = detect_csi(distribution, provider, helm, deployments)
        .await
        .map_err(|err| err.context("detect csi"))?;
    let load_balancer = detect_load_balancer(distribution, provider, helm, docker)
        .await
        .map_err(|err| err.context("detect load balancer"))?;
    let metrics_server = detect_metrics_server(distribution, provider, helm)
        .await
        .map_err(|err| err.context("detect metrics server"))?;
    let cert_manager = detect_cert_manager(helm)
        .await
        .map_err(|err| err.context("detect cert manager"))?;
    let policy_engine = detect_policy_engine(helm)
        .await
        .map_err(|err| err.context("detect policy engine"))?;
    let git_ops_engine = detect_git_ops_engine(helm)
        .await
        .map_err(|err| err.context("detect gitops engine"))?;

    debug!(
        cluster = name,
        ?cni,
        ?csi,
        ?load_balancer,
        ?metrics_server,
        ?cert_manager,
        ?policy_engine,
        ?git_ops_engine,
        "detected cluster components"
    );

    Ok(ClusterSpec {
        name: name.to_string(),
        distribution,
        provider,
        cni,
        csi,
        load_balancer,
        metrics_server,
        cert_manager,
        policy_engine,
        git_ops_engine,
        source_directory: None,
        local_registry: LocalRegistrySpec::default(),
        connection: ConnectionSpec::default(),
    })
}
