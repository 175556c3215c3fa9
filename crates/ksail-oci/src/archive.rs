//! Manifest collection and deterministic gzip-tar layer construction.
//!
//! Grounded on the `tar`+`flate2` pairing the newrelic agent-control crate
//! depends on for its own package extraction
//! (`examples/newrelic-newrelic-agent-control/agent-control/Cargo.toml`),
//! used here on the push side instead of the pull side.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use flate2::write::GzEncoder;
use flate2::Compression;
use tar::{Builder, Header};

use crate::error::OciError;

const MANIFEST_EXTENSIONS: [&str; 3] = ["yaml", "yml", "json"];

/// Recursively walk `source_path`, returning every file whose extension
/// matches (case-insensitively) `.yaml`, `.yml`, or `.json`, sorted
/// lexicographically by path relative to `source_path`. Zero-byte files are
/// rejected with a per-file error rather than silently skipped.
pub fn collect_manifests(source_path: &Path) -> Result<Vec<PathBuf>, OciError> {
    if !source_path.exists() {
        return Err(OciError::SourcePathNotFound(source_path.to_path_buf()));
    }
    if !source_path.is_dir() {
        return Err(OciError::SourcePathNotDirectory(source_path.to_path_buf()));
    }

    let mut files = Vec::new();
    walk(source_path, source_path, &mut files)?;
    files.sort();

    if files.is_empty() {
        return Err(OciError::NoManifestFiles(source_path.to_path_buf()));
    }

    Ok(files)
}

fn walk(root: &Path, dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), OciError> {
    let mut entries: Vec<_> = fs::read_dir(dir)?.collect::<Result<_, _>>()?;
    entries.sort_by_key(std::fs::DirEntry::path);

    for entry in entries {
        let path = entry.path();
        if path.is_dir() {
            walk(root, &path, out)?;
            continue;
        }

        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            continue;
        };
        if !MANIFEST_EXTENSIONS
            .iter()
            .any(|candidate| ext.eq_ignore_ascii_case(candidate))
        {
            continue;
        }

        let metadata = fs::metadata(&path)?;
        if metadata.len() == 0 {
            return Err(OciError::EmptyManifestFile(path));
        }

        out.push(path.strip_prefix(root).unwrap_or(&path).to_path_buf());
    }

    Ok(())
}

/// Build a deterministic gzip-compressed tar archive from `files` (paths
/// relative to `source_root`). Entries are written under a single top-level
/// prefix (`basename`), and — unless `single_root` is set (ArgoCD mode) —
/// duplicated at the archive root as well, matching Flux's default sync
/// path of `.` and ArgoCD's default prefix-path sync.
///
/// Entries are written in the order given; callers pass an already-sorted
/// `files` list so the resulting byte stream is stable across builds of
/// identical input.
pub fn build_layer(
    source_root: &Path,
    files: &[PathBuf],
    basename: &str,
    single_root: bool,
) -> Result<Vec<u8>, OciError> {
    let mut tar_bytes = Vec::new();
    {
        let mut builder = Builder::new(&mut tar_bytes);
        builder.mode(tar::HeaderMode::Deterministic);

        for relative in files {
            let contents = fs::read(source_root.join(relative))?;
            append_entry(&mut builder, &format!("{basename}/{}", forward_slash(relative)), &contents)?;
            if !single_root {
                append_entry(&mut builder, &forward_slash(relative), &contents)?;
            }
        }

        builder
            .finish()
            .map_err(|err| OciError::Archive(err.to_string()))?;
    }

    gzip(&tar_bytes)
}

/// Build the single-file empty-build layer: `kustomization.yaml` with an
/// empty `resources` list.
pub fn build_empty_layer() -> Result<Vec<u8>, OciError> {
    const CONTENTS: &str =
        "apiVersion: kustomize.config.k8s.io/v1beta1\nkind: Kustomization\nresources: []\n";

    let mut tar_bytes = Vec::new();
    {
        let mut builder = Builder::new(&mut tar_bytes);
        builder.mode(tar::HeaderMode::Deterministic);
        append_entry(&mut builder, "kustomization.yaml", CONTENTS.as_bytes())?;
        builder
            .finish()
            .map_err(|err| OciError::Archive(err.to_string()))?;
    }

    gzip(&tar_bytes)
}

fn append_entry<W: Write>(
    builder: &mut Builder<W>,
    path: &str,
    contents: &[u8],
) -> Result<(), OciError> {
    let mut header = Header::new_gnu();
    header.set_size(contents.len() as u64);
    header.set_mode(0o644);
    header.set_mtime(0);
    header.set_cksum();
    builder
        .append_data(&mut header, path, contents)
        .map_err(|err| OciError::Archive(err.to_string()))
}

fn forward_slash(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

fn gzip(tar_bytes: &[u8]) -> Result<Vec<u8>, OciError> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(tar_bytes)
        .map_err(|err| OciError::Archive(err.to_string()))?;
    encoder
        .finish()
        .map_err(|err| OciError::Archive(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    fn write_file(dir: &Path, relative: &str, contents: &str) {
        let path = dir.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    #[test]
    fn collects_and_sorts_manifest_files() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "b.yaml", "b: 1");
        write_file(dir.path(), "a.yaml", "a: 1");
        write_file(dir.path(), "notes.txt", "ignored");

        let files = collect_manifests(dir.path()).unwrap();
        assert_eq!(files, vec![PathBuf::from("a.yaml"), PathBuf::from("b.yaml")]);
    }

    #[test]
    fn rejects_zero_byte_manifest() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "empty.yaml", "");

        let err = collect_manifests(dir.path()).unwrap_err();
        assert!(matches!(err, OciError::EmptyManifestFile(_)));
    }

    #[test]
    fn no_manifest_files_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "readme.md", "not a manifest");

        let err = collect_manifests(dir.path()).unwrap_err();
        assert!(matches!(err, OciError::NoManifestFiles(_)));
    }

    #[test]
    fn build_is_byte_identical_across_runs() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "a.yaml", "a: 1");
        write_file(dir.path(), "b.yaml", "b: 1");
        let files = collect_manifests(dir.path()).unwrap();

        let first = build_layer(dir.path(), &files, "src", false).unwrap();
        let second = build_layer(dir.path(), &files, "src", false).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn dual_root_mode_duplicates_entries_at_archive_root() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "a.yaml", "a: 1");
        let files = collect_manifests(dir.path()).unwrap();

        let layer = build_layer(dir.path(), &files, "src", false).unwrap();
        let names = entry_names(&layer);

        assert!(names.contains(&"src/a.yaml".to_string()));
        assert!(names.contains(&"a.yaml".to_string()));
    }

    #[test]
    fn single_root_mode_omits_root_duplicate() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "a.yaml", "a: 1");
        let files = collect_manifests(dir.path()).unwrap();

        let layer = build_layer(dir.path(), &files, "src", true).unwrap();
        let names = entry_names(&layer);

        assert_eq!(names, vec!["src/a.yaml".to_string()]);
    }

    fn entry_names(gzip_tar: &[u8]) -> Vec<String> {
        let mut decoder = flate2::read::GzDecoder::new(gzip_tar);
        let mut tar_bytes = Vec::new();
        decoder.read_to_end(&mut tar_bytes).unwrap();

        let mut archive = tar::Archive::new(tar_bytes.as_slice());
        archive
            .entries()
            .unwrap()
            .map(|entry| {
                entry
                    .unwrap()
                    .path()
                    .unwrap()
                    .to_string_lossy()
                    .into_owned()
            })
            .collect()
    }
}
