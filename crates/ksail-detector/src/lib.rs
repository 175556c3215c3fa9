//! Live-cluster component detection: probe a running cluster's Helm
//! releases, Deployments, and Docker containers and reconstruct the
//! effective [`ksail_spec::ClusterSpec`] they imply.

pub mod detector;
pub mod docker_probe;
pub mod error;
pub mod helm_probe;
pub mod kube_probe;
pub mod probes;

pub use detector::detect;
pub use docker_probe::{DockerContainerProbe, ShellDockerProbe};
pub use error::DetectorError;
pub use helm_probe::{HelmReleaseProbe, ShellHelmProbe};
pub use kube_probe::{DeploymentProbe, KubeDeploymentProbe};
