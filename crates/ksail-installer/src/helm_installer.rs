//! A generic Helm-chart-backed [`Installer`], covering every factory entry
//! whose lifecycle is "helm upgrade --install" / "helm uninstall".
//!
//! Grounded on `examples/5dlabs-cto/crates/installer/src/installer/components.rs`'s
//! per-component `install_*` functions, generalized from one function per
//! hardcoded component into one value per factory entry.

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::InstallerError;
use crate::helm::{HelmClient, ReleaseOptions};
use crate::installer::Installer;

#[derive(Clone)]
pub struct HelmInstaller {
    pub release_name: String,
    pub chart: String,
    pub namespace: String,
    pub repo: Option<(String, String)>,
    pub images: Vec<String>,
    pub values: Vec<(String, String)>,
    helm: Arc<dyn HelmClient>,
}

impl HelmInstaller {
    #[must_use]
    pub fn new(
        helm: Arc<dyn HelmClient>,
        release_name: impl Into<String>,
        chart: impl Into<String>,
        namespace: impl Into<String>,
    ) -> Self {
        Self {
            release_name: release_name.into(),
            chart: chart.into(),
            namespace: namespace.into(),
            repo: None,
            images: Vec::new(),
            values: Vec::new(),
            helm,
        }
    }

    #[must_use]
    pub fn with_repo(mut self, name: impl Into<String>, url: impl Into<String>) -> Self {
        self.repo = Some((name.into(), url.into()));
        self
    }

    #[must_use]
    pub fn with_images(mut self, images: Vec<String>) -> Self {
        self.images = images;
        self
    }

    #[must_use]
    pub fn with_values(mut self, values: Vec<(String, String)>) -> Self {
        self.values = values;
        self
    }
}

#[async_trait]
impl Installer for HelmInstaller {
    async fn install(&self) -> Result<(), InstallerError> {
        if let Some((name, url)) = &self.repo {
            self.helm
                .add_repository(name, url)
                .await
                .map_err(|err| err.context(format!("add helm repository {name}")))?;
        }

        let opts = ReleaseOptions {
            namespace: self.namespace.clone(),
            create_namespace: true,
            values: self.values.clone(),
            wait: true,
        };

        self.helm
            .install_or_upgrade(&self.release_name, &self.chart, &opts)
            .await
            .map_err(|err| err.context(format!("install {}", self.release_name)))
    }

    async fn uninstall(&self) -> Result<(), InstallerError> {
        self.helm
            .uninstall_release(&self.namespace, &self.release_name)
            .await
            .map_err(|err| err.context(format!("uninstall {}", self.release_name)))
    }

    fn images(&self) -> Vec<String> {
        self.images.clone()
    }

    async fn is_ready(&self) -> Result<bool, InstallerError> {
        self.helm.release_exists(&self.namespace, &self.release_name).await
    }
}
