//! Registry verification and resolution.
//!
//! Resolves which OCI registry a cluster's workload artifacts should be
//! pushed to, and probes reachability and push-auth before the builder (C2)
//! attempts an actual push.

pub mod docker_config;
mod error;
pub mod normalize;
pub mod resolver;
pub mod verifier;

pub use error::RegistryError;
pub use resolver::{resolve, merge_gitops_credentials, ResolutionSource, ResolvedRegistry};
pub use verifier::{artifact_exists, verify_access, verify_registry_access_with_timeout, AccessStatus, Credentials};
