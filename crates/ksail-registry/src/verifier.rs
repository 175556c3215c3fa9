//! Registry reachability and push-auth probing.
//!
//! Mirrors the retry/backoff shape used across the teacher's provider
//! clients (`examples/5dlabs-cto/crates/metal/src/providers/*/client.rs`),
//! re-targeted from node-provisioning calls onto the Docker Registry HTTP
//! API v2 `tags/list` and manifest endpoints.

use std::time::Duration;

use tokio::sync::watch;

use crate::error::RegistryError;

/// Coordinates the caller has over a registry access attempt.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Outcome of a single reachability/auth probe, classified the way spec §6's
/// "Registry HTTP endpoint" row and §7's error taxonomy require so callers
/// can match on it without re-deriving the classification themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessStatus {
    Ok,
    AuthRequired,
    PermissionDenied,
    /// A 404 on a tag/manifest lookup is not itself an error — the artifact
    /// or repository simply doesn't exist yet.
    NotFoundAcceptable,
    Unreachable,
    Other,
}

const MAX_ATTEMPTS: u32 = 3;
const BASE_BACKOFF: Duration = Duration::from_secs(2);
const MAX_BACKOFF: Duration = Duration::from_secs(10);

fn backoff_for(attempt: u32) -> Duration {
    let scaled = BASE_BACKOFF.saturating_mul(1 << attempt.min(4));
    scaled.min(MAX_BACKOFF)
}

fn classify_status(status: reqwest::StatusCode) -> AccessStatus {
    match status {
        s if s.is_success() => AccessStatus::Ok,
        reqwest::StatusCode::UNAUTHORIZED => AccessStatus::AuthRequired,
        reqwest::StatusCode::FORBIDDEN => AccessStatus::PermissionDenied,
        reqwest::StatusCode::NOT_FOUND => AccessStatus::NotFoundAcceptable,
        _ => AccessStatus::Other,
    }
}

/// Probe `GET /v2/{repository}/tags/list` on `endpoint`, classifying the
/// response without retry. Network-level failures (connection refused, DNS
/// failure, TLS error) classify as [`AccessStatus::Unreachable`].
pub async fn verify_access(
    client: &reqwest::Client,
    endpoint: &str,
    repository: &str,
    creds: &Credentials,
    insecure: bool,
) -> Result<AccessStatus, RegistryError> {
    let scheme = if insecure { "http" } else { "https" };
    let url = format!("{scheme}://{endpoint}/v2/{repository}/tags/list");

    let mut request = client.get(&url);
    if let (Some(username), Some(password)) = (&creds.username, &creds.password) {
        request = request.basic_auth(username, Some(password));
    }

    match request.send().await {
        Ok(response) => Ok(classify_status(response.status())),
        Err(err) if err.is_connect() || err.is_timeout() => Ok(AccessStatus::Unreachable),
        Err(err) => Err(RegistryError::Http(err)),
    }
}

/// Probe whether `repository:tag` exists via `HEAD /v2/{repository}/manifests/{tag}`.
/// A 404 is reported as `Ok(false)`, never as an error.
pub async fn artifact_exists(
    client: &reqwest::Client,
    endpoint: &str,
    repository: &str,
    tag: &str,
    creds: &Credentials,
    insecure: bool,
) -> Result<bool, RegistryError> {
    let scheme = if insecure { "http" } else { "https" };
    let url = format!("{scheme}://{endpoint}/v2/{repository}/manifests/{tag}");

    let mut request = client.head(&url);
    if let (Some(username), Some(password)) = (&creds.username, &creds.password) {
        request = request.basic_auth(username, Some(password));
    }

    let response = request.send().await?;
    Ok(response.status().is_success())
}

/// Retries [`verify_access`] up to [`MAX_ATTEMPTS`] times with exponential
/// backoff, stopping early once a terminal classification (anything but a
/// transient [`AccessStatus::Unreachable`]) is reached, or when `cancel`
/// signals shutdown.
pub async fn verify_registry_access_with_timeout(
    client: &reqwest::Client,
    endpoint: &str,
    repository: &str,
    creds: &Credentials,
    insecure: bool,
    mut cancel: watch::Receiver<bool>,
) -> Result<AccessStatus, RegistryError> {
    let mut attempt = 0;
    loop {
        if *cancel.borrow() {
            return Err(RegistryError::Unreachable(
                "verification cancelled".to_string(),
            ));
        }

        let status = verify_access(client, endpoint, repository, creds, insecure).await?;
        if status != AccessStatus::Unreachable || attempt + 1 >= MAX_ATTEMPTS {
            return Ok(status);
        }

        tokio::select! {
            () = tokio::time::sleep(backoff_for(attempt)) => {}
            _ = cancel.changed() => {
                if *cancel.borrow() {
                    return Err(RegistryError::Unreachable(
                        "verification cancelled".to_string(),
                    ));
                }
            }
        }

        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn classifies_successful_tags_list_as_ok() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/ksail/workloads/tags/list"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let endpoint = server.address().to_string();
        let status = verify_access(
            &client,
            &endpoint,
            "ksail/workloads",
            &Credentials::default(),
            true,
        )
        .await
        .unwrap();

        assert_eq!(status, AccessStatus::Ok);
    }

    #[tokio::test]
    async fn classifies_401_as_auth_required() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/ksail/workloads/tags/list"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let endpoint = server.address().to_string();
        let status = verify_access(
            &client,
            &endpoint,
            "ksail/workloads",
            &Credentials::default(),
            true,
        )
        .await
        .unwrap();

        assert_eq!(status, AccessStatus::AuthRequired);
    }

    #[tokio::test]
    async fn classifies_403_as_permission_denied() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/ksail/workloads/tags/list"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let endpoint = server.address().to_string();
        let status = verify_access(
            &client,
            &endpoint,
            "ksail/workloads",
            &Credentials::default(),
            true,
        )
        .await
        .unwrap();

        assert_eq!(status, AccessStatus::PermissionDenied);
    }

    #[tokio::test]
    async fn missing_manifest_is_false_not_error() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/v2/ksail/workloads/manifests/v1"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let endpoint = server.address().to_string();
        let exists = artifact_exists(
            &client,
            &endpoint,
            "ksail/workloads",
            "v1",
            &Credentials::default(),
            true,
        )
        .await
        .unwrap();

        assert!(!exists);
    }

    #[test]
    fn backoff_is_capped() {
        assert_eq!(backoff_for(0), Duration::from_secs(2));
        assert_eq!(backoff_for(10), MAX_BACKOFF);
    }
}
