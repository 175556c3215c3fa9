//! Installer protocol, factory, and orchestrator.
//!
//! `ksail-installer` maps an effective [`ksail_spec::ClusterSpec`] onto a set
//! of phased, readiness-gated installers (C5) and drives them to completion
//! or inverse-order teardown (C6).

pub mod cpk;
pub mod error;
pub mod factory;
pub mod helm;
pub mod helm_installer;
pub mod installer;
pub mod orchestrator;
pub mod readiness;

pub use cpk::{CloudProviderKindInstaller, CpkCoordinator};
pub use error::InstallerError;
pub use factory::build as build_installers;
pub use helm::{HelmClient, ReleaseOptions, ShellHelmClient};
pub use helm_installer::HelmInstaller;
pub use installer::{get_images_from_installers, phase_for, Installer, Phase};
pub use orchestrator::Orchestrator;
pub use readiness::poll_for_readiness;
