//! Machine-config patch loading (spec §4.10).
//!
//! Patches live under three directories of a patch root — `cluster/`,
//! `control-planes/`, `workers/` — and are tagged with the matching
//! [`Scope`] on load. Grounded on the directory-walk shape of
//! `examples/5dlabs-cto/crates/heal/src/templates.rs`'s `std::fs::read_dir`
//! loader, re-targeted from template discovery to scoped patch discovery.

use std::path::{Path, PathBuf};

use crate::error::TalosError;

/// Which node class a machine-config patch applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Cluster,
    ControlPlane,
    Worker,
}

/// A single loaded machine-config patch.
#[derive(Debug, Clone)]
pub struct MachineConfigPatch {
    pub path: PathBuf,
    pub scope: Scope,
    pub content: Vec<u8>,
}

const SCOPE_DIRS: [(&str, Scope); 3] = [
    ("cluster", Scope::Cluster),
    ("control-planes", Scope::ControlPlane),
    ("workers", Scope::Worker),
];

fn is_patch_file(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"))
}

/// Load every `.yaml`/`.yml` patch under `root/{cluster,control-planes,workers}`,
/// tagging each with its directory's [`Scope`]. Missing scope directories are
/// treated as contributing no patches.
///
/// # Errors
///
/// Returns [`TalosError::Io`] if a present scope directory cannot be read,
/// or [`TalosError::InvalidPatch`] if a patch file is not valid YAML.
pub fn load_patches(root: &Path) -> Result<Vec<MachineConfigPatch>, TalosError> {
    let mut patches = Vec::new();

    for (dir_name, scope) in SCOPE_DIRS {
        let dir = root.join(dir_name);
        if !dir.is_dir() {
            continue;
        }

        let mut entries: Vec<PathBuf> = std::fs::read_dir(&dir)
            .map_err(|source| TalosError::Io {
                path: dir.clone(),
                source,
            })?
            .filter_map(|entry| entry.ok().map(|entry| entry.path()))
            .filter(|path| is_patch_file(path))
            .collect();
        entries.sort();

        for path in entries {
            let content = std::fs::read(&path).map_err(|source| TalosError::Io {
                path: path.clone(),
                source,
            })?;
            serde_yaml::from_slice::<serde_yaml::Value>(&content).map_err(|source| {
                TalosError::InvalidPatch {
                    path: path.clone(),
                    source,
                }
            })?;
            patches.push(MachineConfigPatch {
                path,
                scope,
                content,
            });
        }
    }

    Ok(patches)
}

/// Returns `true` iff any control-plane patch sets
/// `.machine.kubelet.extraArgs.rotate-server-certificates` to `"true"`.
#[must_use]
pub fn kubelet_cert_rotation_enabled(patches: &[MachineConfigPatch]) -> bool {
    patches
        .iter()
        .filter(|patch| patch.scope == Scope::ControlPlane)
        .filter_map(|patch| serde_yaml::from_slice::<serde_yaml::Value>(&patch.content).ok())
        .any(|value| {
            value["machine"]["kubelet"]["extraArgs"]["rotate-server-certificates"].as_str()
                == Some("true")
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_patch(dir: &Path, name: &str, content: &str) {
        fs::create_dir_all(dir).unwrap();
        fs::write(dir.join(name), content).unwrap();
    }

    #[test]
    fn loads_patches_from_all_three_scopes() {
        let root = tempfile::tempdir().unwrap();
        write_patch(&root.path().join("cluster"), "a.yaml", "cluster: {}\n");
        write_patch(
            &root.path().join("control-planes"),
            "b.yaml",
            "machine: {}\n",
        );
        write_patch(&root.path().join("workers"), "c.yml", "machine: {}\n");

        let patches = load_patches(root.path()).unwrap();
        assert_eq!(patches.len(), 3);
        assert!(patches.iter().any(|p| p.scope == Scope::Cluster));
        assert!(patches.iter().any(|p| p.scope == Scope::ControlPlane));
        assert!(patches.iter().any(|p| p.scope == Scope::Worker));
    }

    #[test]
    fn ignores_non_yaml_files() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("cluster");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("README.md"), "not a patch").unwrap();

        let patches = load_patches(root.path()).unwrap();
        assert!(patches.is_empty());
    }

    #[test]
    fn missing_scope_directory_contributes_nothing() {
        let root = tempfile::tempdir().unwrap();
        write_patch(&root.path().join("cluster"), "a.yaml", "cluster: {}\n");

        let patches = load_patches(root.path()).unwrap();
        assert_eq!(patches.len(), 1);
    }

    #[test]
    fn invalid_yaml_patch_is_rejected() {
        let root = tempfile::tempdir().unwrap();
        write_patch(&root.path().join("cluster"), "broken.yaml", "not: [valid");

        assert!(matches!(
            load_patches(root.path()),
            Err(TalosError::InvalidPatch { .. })
        ));
    }

    #[test]
    fn detects_kubelet_cert_rotation_flag() {
        let patches = vec![MachineConfigPatch {
            path: PathBuf::from("control-planes/rotate.yaml"),
            scope: Scope::ControlPlane,
            content: b"machine:\n  kubelet:\n    extraArgs:\n      rotate-server-certificates: \"true\"\n"
                .to_vec(),
        }];
        assert!(kubelet_cert_rotation_enabled(&patches));
    }

    #[test]
    fn worker_patch_does_not_count_toward_rotation() {
        let patches = vec![MachineConfigPatch {
            path: PathBuf::from("workers/rotate.yaml"),
            scope: Scope::Worker,
            content: b"machine:\n  kubelet:\n    extraArgs:\n      rotate-server-certificates: \"true\"\n"
                .to_vec(),
        }];
        assert!(!kubelet_cert_rotation_enabled(&patches));
    }

    #[test]
    fn absent_flag_means_rotation_disabled() {
        let patches = vec![MachineConfigPatch {
            path: PathBuf::from("control-planes/plain.yaml"),
            scope: Scope::ControlPlane,
            content: b"machine: {}\n".to_vec(),
        }];
        assert!(!kubelet_cert_rotation_enabled(&patches));
    }
}
