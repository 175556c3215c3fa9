//! Argo CD / Flux GitOps managers and reconciler.
//!
//! `ksail-gitops` owns the three GitOps responsibilities the cluster engine
//! delegates to it: ensuring the Argo CD `Application` + repository `Secret`
//! (C7) or the Flux `FluxInstance` (C8) reflect the desired OCI source, and
//! driving a reconcile pass to completion (C9).

pub mod argocd;
pub mod error;
pub mod flux;
pub mod reconciler;

pub use argocd::{ArgoCdManager, EnsureOptions as ArgoCdEnsureOptions, TargetRevisionUpdate};
pub use error::GitOpsError;
pub use flux::{EnsureOptions as FluxEnsureOptions, FluxInstanceManager};
pub use reconciler::{GitOpsReconciler, ReconcileOptions};
