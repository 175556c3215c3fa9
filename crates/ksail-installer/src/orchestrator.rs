//! Phase-based installer orchestration.
//!
//! Generalized from `examples/5dlabs-cto/crates/installer/src/orchestrator.rs`'s
//! fixed `InstallStep` sequencing loop onto the spec's phase table: instead
//! of one hardcoded enum of steps, the phase a key belongs to is looked up
//! from [`crate::installer::phase_for`], and every key within a phase runs
//! before the orchestrator waits on that phase's readiness gates and moves
//! on.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use kube::Client;
use tracing::{info, warn};

use crate::error::InstallerError;
use crate::installer::{phase_for, Installer, Phase};
use crate::readiness::poll_for_readiness;

const CALICO_CRD_ESTABLISHED_ERROR: &str = "no matches for kind";

const CALICO_CRDS: [&str; 6] = [
    "felixconfigurations.crd.projectcalico.org",
    "ipamblocks.crd.projectcalico.org",
    "blockaffinities.crd.projectcalico.org",
    "ipamhandles.crd.projectcalico.org",
    "ipamconfigs.crd.projectcalico.org",
    "clusterinformations.crd.projectcalico.org",
];

/// Runs the install-then-wait sequence phase by phase, and the reverse
/// sequence for teardown.
pub struct Orchestrator {
    installers: HashMap<String, Arc<dyn Installer>>,
    readiness_timeout: Duration,
    kube_client: Option<Client>,
}

impl Orchestrator {
    #[must_use]
    pub fn new(
        installers: HashMap<String, Arc<dyn Installer>>,
        readiness_timeout: Duration,
        kube_client: Option<Client>,
    ) -> Self {
        Self {
            installers,
            readiness_timeout,
            kube_client,
        }
    }

    /// Install every entry, phase by phase in [`Phase::all_in_order`],
    /// waiting for each phase's readiness gates before starting the next.
    pub async fn install_all(&self) -> Result<(), InstallerError> {
        for phase in Phase::all_in_order() {
            let keys = self.keys_in_phase(phase);
            if keys.is_empty() {
                continue;
            }

            info!(?phase, keys = ?keys, "installing phase");
            for key in &keys {
                self.install_one(key).await?;
            }

            for key in &keys {
                self.wait_ready(key).await?;
            }
        }

        Ok(())
    }

    /// Uninstall every entry in the reverse of [`Phase::all_in_order`].
    /// Errors are collected rather than aborting subsequent uninstalls
    /// (testable property 2: inverse teardown).
    pub async fn uninstall_all(&self) -> Vec<(String, InstallerError)> {
        let mut errors = Vec::new();

        for phase in Phase::all_in_order().into_iter().rev() {
            let keys = self.keys_in_phase(phase);
            for key in &keys {
                if let Some(installer) = self.installers.get(key) {
                    if let Err(err) = installer.uninstall().await {
                        warn!(key, error = %err, "uninstall failed, continuing teardown");
                        errors.push((key.clone(), err));
                    }
                }
            }
        }

        errors
    }

    fn keys_in_phase(&self, phase: Phase) -> Vec<String> {
        let mut keys: Vec<String> = self
            .installers
            .keys()
            .filter(|key| phase_for(key) == Some(phase))
            .cloned()
            .collect();
        keys.sort();
        keys
    }

    async fn install_one(&self, key: &str) -> Result<(), InstallerError> {
        let installer = self
            .installers
            .get(key)
            .ok_or_else(|| InstallerError::UnknownInstaller(key.to_string()))?;

        match installer.install().await {
            Ok(()) => Ok(()),
            Err(err) if key == "calico" && is_calico_crd_race(&err) => {
                warn!("calico CRDs not yet established, waiting and retrying once");
                self.wait_for_calico_crds().await?;
                installer
                    .install()
                    .await
                    .map_err(|err| err.context("retry calico install after CRD establishment"))
            }
            Err(err) => Err(err.context(format!("install {key}"))),
        }
    }

    async fn wait_ready(&self, key: &str) -> Result<(), InstallerError> {
        let installer = self
            .installers
            .get(key)
            .ok_or_else(|| InstallerError::UnknownInstaller(key.to_string()))?
            .clone();

        poll_for_readiness(
            key,
            self.readiness_timeout,
            installer.poll_interval(),
            move || {
                let installer = installer.clone();
                async move { installer.is_ready().await }
            },
        )
        .await
    }

    async fn wait_for_calico_crds(&self) -> Result<(), InstallerError> {
        let Some(client) = self.kube_client.clone() else {
            return Ok(());
        };

        poll_for_readiness(
            "calico-crds",
            self.readiness_timeout,
            Duration::from_secs(2),
            move || {
                let client = client.clone();
                async move { all_calico_crds_established(&client).await }
            },
        )
        .await
    }
}

fn is_calico_crd_race(err: &InstallerError) -> bool {
    err.to_string().contains(CALICO_CRD_ESTABLISHED_ERROR)
}

async fn all_calico_crds_established(client: &Client) -> Result<bool, InstallerError> {
    use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
    use kube::Api;

    let api: Api<CustomResourceDefinition> = Api::all(client.clone());

    for crd_name in CALICO_CRDS {
        let crd = match api.get_opt(crd_name).await? {
            Some(crd) => crd,
            None => return Ok(false),
        };

        let established = crd
            .status
            .and_then(|status| status.conditions)
            .map(|conditions| {
                conditions
                    .iter()
                    .any(|condition| condition.type_ == "Established" && condition.status == "True")
            })
            .unwrap_or(false);

        if !established {
            return Ok(false);
        }
    }

    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct RecordingInstaller {
        calls: Arc<std::sync::Mutex<Vec<String>>>,
        name: String,
    }

    #[async_trait]
    impl Installer for RecordingInstaller {
        async fn install(&self) -> Result<(), InstallerError> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("install:{}", self.name));
            Ok(())
        }

        async fn uninstall(&self) -> Result<(), InstallerError> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("uninstall:{}", self.name));
            Ok(())
        }

        fn images(&self) -> Vec<String> {
            vec![]
        }

        async fn is_ready(&self) -> Result<bool, InstallerError> {
            Ok(true)
        }
    }

    fn installer(calls: Arc<std::sync::Mutex<Vec<String>>>, name: &str) -> Arc<dyn Installer> {
        Arc::new(RecordingInstaller {
            calls,
            name: name.to_string(),
        })
    }

    #[tokio::test]
    async fn install_all_runs_phases_in_order() {
        let calls = Arc::new(std::sync::Mutex::new(Vec::new()));
        let mut installers: HashMap<String, Arc<dyn Installer>> = HashMap::new();
        installers.insert("argocd".to_string(), installer(calls.clone(), "argocd"));
        installers.insert("cilium".to_string(), installer(calls.clone(), "cilium"));
        installers.insert(
            "cert-manager".to_string(),
            installer(calls.clone(), "cert-manager"),
        );

        let orchestrator = Orchestrator::new(installers, Duration::from_secs(1), None);
        orchestrator.install_all().await.unwrap();

        let recorded = calls.lock().unwrap().clone();
        let cilium_pos = recorded.iter().position(|c| c == "install:cilium").unwrap();
        let cert_manager_pos = recorded
            .iter()
            .position(|c| c == "install:cert-manager")
            .unwrap();
        let argocd_pos = recorded.iter().position(|c| c == "install:argocd").unwrap();

        assert!(cilium_pos < cert_manager_pos);
        assert!(cert_manager_pos < argocd_pos);
    }

    #[tokio::test]
    async fn uninstall_all_is_reverse_of_install_order() {
        let calls = Arc::new(std::sync::Mutex::new(Vec::new()));
        let mut installers: HashMap<String, Arc<dyn Installer>> = HashMap::new();
        installers.insert("argocd".to_string(), installer(calls.clone(), "argocd"));
        installers.insert("cilium".to_string(), installer(calls.clone(), "cilium"));

        let orchestrator = Orchestrator::new(installers, Duration::from_secs(1), None);
        orchestrator.install_all().await.unwrap();
        calls.lock().unwrap().clear();

        let errors = orchestrator.uninstall_all().await;
        assert!(errors.is_empty());

        let recorded = calls.lock().unwrap().clone();
        let cilium_pos = recorded
            .iter()
            .position(|c| c == "uninstall:cilium")
            .unwrap();
        let argocd_pos = recorded
            .iter()
            .position(|c| c == "uninstall:argocd")
            .unwrap();

        assert!(argocd_pos < cilium_pos);
    }

    struct AlwaysFailsInstaller;

    #[async_trait]
    impl Installer for AlwaysFailsInstaller {
        async fn install(&self) -> Result<(), InstallerError> {
            Ok(())
        }
        async fn uninstall(&self) -> Result<(), InstallerError> {
            Err(InstallerError::Helm("boom".to_string()))
        }
        fn images(&self) -> Vec<String> {
            vec![]
        }
        async fn is_ready(&self) -> Result<bool, InstallerError> {
            Ok(true)
        }
    }

    #[tokio::test]
    async fn uninstall_errors_are_collected_not_aborting() {
        let mut installers: HashMap<String, Arc<dyn Installer>> = HashMap::new();
        installers.insert("cilium".to_string(), Arc::new(AlwaysFailsInstaller));
        installers.insert(
            "cert-manager".to_string(),
            installer(Arc::new(std::sync::Mutex::new(Vec::new())), "cert-manager"),
        );

        let orchestrator = Orchestrator::new(installers, Duration::from_secs(1), None);
        let errors = orchestrator.uninstall_all().await;

        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].0, "cilium");
    }

    struct FlakyCalicoInstaller {
        attempts: AtomicU32,
    }

    #[async_trait]
    impl Installer for FlakyCalicoInstaller {
        async fn install(&self) -> Result<(), InstallerError> {
            if self.attempts.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(InstallerError::Helm(
                    "no matches for kind \"FelixConfiguration\"".to_string(),
                ))
            } else {
                Ok(())
            }
        }
        async fn uninstall(&self) -> Result<(), InstallerError> {
            Ok(())
        }
        fn images(&self) -> Vec<String> {
            vec![]
        }
        async fn is_ready(&self) -> Result<bool, InstallerError> {
            Ok(true)
        }
    }

    #[tokio::test]
    async fn calico_crd_race_retries_once_without_kube_client() {
        let mut installers: HashMap<String, Arc<dyn Installer>> = HashMap::new();
        installers.insert(
            "calico".to_string(),
            Arc::new(FlakyCalicoInstaller {
                attempts: AtomicU32::new(0),
            }),
        );

        // With no injected kube client, the CRD wait is a no-op and the
        // retry happens immediately.
        let orchestrator = Orchestrator::new(installers, Duration::from_secs(1), None);
        orchestrator.install_all().await.unwrap();
    }
}
