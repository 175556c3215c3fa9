//! Registry endpoint normalization and repository sanitization.
//!
//! These are pure string transforms shared by the builder (C2) and the
//! resolver (C3) — see spec §8 items 7–8.

/// Strip a leading `oci://`, `http://`, or `https://` scheme (case
/// insensitive), drop any path component, and trim surrounding whitespace.
/// Host casing is preserved.
#[must_use]
pub fn normalize_endpoint(raw: &str) -> String {
    split_endpoint_and_path(raw).0
}

/// Like [`normalize_endpoint`], but also returns the path component that
/// `normalize_endpoint` drops — the resolver needs it to recover a
/// `/repository` suffix on a `--registry=host/repo` coordinate.
#[must_use]
pub fn split_endpoint_and_path(raw: &str) -> (String, Option<String>) {
    let trimmed = raw.trim();

    let without_scheme = ["oci://", "https://", "http://"]
        .iter()
        .find_map(|scheme| {
            if trimmed.len() >= scheme.len() && trimmed[..scheme.len()].eq_ignore_ascii_case(scheme)
            {
                Some(&trimmed[scheme.len()..])
            } else {
                None
            }
        })
        .unwrap_or(trimmed);

    match without_scheme.split_once('/') {
        Some((host, path)) => {
            let host = host.trim_end_matches('/').to_string();
            let path = path.trim_matches('/');
            let path = if path.is_empty() {
                None
            } else {
                Some(path.to_string())
            };
            (host, path)
        }
        None => (without_scheme.trim_end_matches('/').to_string(), None),
    }
}

/// Lowercase and trim a repository path, keeping `/`-separated segments.
#[must_use]
pub fn sanitize_repository(raw: &str) -> String {
    raw.trim()
        .to_lowercase()
        .split('/')
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_oci_scheme_and_trailing_slash() {
        assert_eq!(normalize_endpoint("oci://ghcr.io/foo/"), "ghcr.io");
    }

    #[test]
    fn strips_https_scheme_preserving_host_case() {
        assert_eq!(
            normalize_endpoint(" HTTPS://Registry:5000/x "),
            "Registry:5000"
        );
    }

    #[test]
    fn passes_through_bare_host_port() {
        assert_eq!(normalize_endpoint("localhost:5000"), "localhost:5000");
    }

    #[test]
    fn splits_host_and_repository_path() {
        assert_eq!(
            split_endpoint_and_path("ghcr.io/team/app"),
            ("ghcr.io".to_string(), Some("team/app".to_string()))
        );
    }

    #[test]
    fn splits_host_with_no_path_as_none() {
        assert_eq!(
            split_endpoint_and_path("oci://Registry:5000/"),
            ("Registry:5000".to_string(), None)
        );
    }

    #[test]
    fn sanitizes_repository_path() {
        assert_eq!(
            sanitize_repository("  KSail/Workloads/My-App  "),
            "ksail/workloads/my-app"
        );
    }
}
