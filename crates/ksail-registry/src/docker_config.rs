//! `.dockerconfigjson` parsing with exact-host > `https://host` > canonical
//! `docker.io` key precedence (spec §8 item 9).

use std::collections::HashMap;

use serde::Deserialize;

/// A single decoded `auths` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct DockerAuthEntry {
    #[serde(default)]
    pub auth: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct DockerConfigJson {
    #[serde(default)]
    auths: HashMap<String, DockerAuthEntry>,
}

/// Username/password pair extracted from a docker config entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

const DOCKER_HUB_CANONICAL: &str = "https://index.docker.io/v1/";

/// Look up credentials for `host` inside a raw `.dockerconfigjson` payload.
///
/// Lookup order: exact host key, then `https://{host}`, then — only when
/// `host` is `docker.io` — the canonical Docker Hub key. Returns `None` when
/// no matching entry exists or an entry exists but carries no credentials.
#[must_use]
pub fn lookup_credentials(dockerconfigjson: &str, host: &str) -> Option<Credentials> {
    let parsed: DockerConfigJson = serde_json::from_str(dockerconfigjson).ok()?;

    let candidates: Vec<String> = if host.eq_ignore_ascii_case("docker.io") {
        vec![
            host.to_string(),
            format!("https://{host}"),
            DOCKER_HUB_CANONICAL.to_string(),
        ]
    } else {
        vec![host.to_string(), format!("https://{host}")]
    };

    candidates
        .iter()
        .find_map(|key| parsed.auths.get(key))
        .and_then(entry_to_credentials)
}

fn entry_to_credentials(entry: &DockerAuthEntry) -> Option<Credentials> {
    if let (Some(username), Some(password)) = (&entry.username, &entry.password) {
        return Some(Credentials {
            username: username.clone(),
            password: password.clone(),
        });
    }

    let auth = entry.auth.as_ref()?;
    let decoded = base64::Engine::decode(&base64::engine::general_purpose::STANDARD, auth).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (username, password) = decoded.split_once(':')?;
    Some(Credentials {
        username: username.to_string(),
        password: password.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with(entries: &[(&str, &str)]) -> String {
        let auths: HashMap<&str, serde_json::Value> = entries
            .iter()
            .map(|(host, auth_b64)| {
                (
                    *host,
                    serde_json::json!({ "auth": auth_b64 }),
                )
            })
            .collect();
        serde_json::to_string(&serde_json::json!({ "auths": auths })).unwrap()
    }

    fn b64(user_pass: &str) -> String {
        base64::Engine::encode(&base64::engine::general_purpose::STANDARD, user_pass)
    }

    #[test]
    fn exact_host_wins_over_docker_hub_canonical() {
        let cfg = config_with(&[
            ("docker.io", &b64("exact:pw")),
            (DOCKER_HUB_CANONICAL, &b64("canonical:pw")),
        ]);

        let creds = lookup_credentials(&cfg, "docker.io").unwrap();
        assert_eq!(creds.username, "exact");
    }

    #[test]
    fn https_prefixed_host_is_matched() {
        let cfg = config_with(&[("https://ghcr.io", &b64("ghuser:ghpass"))]);
        let creds = lookup_credentials(&cfg, "ghcr.io").unwrap();
        assert_eq!(creds.username, "ghuser");
        assert_eq!(creds.password, "ghpass");
    }

    #[test]
    fn docker_hub_canonical_key_used_only_for_docker_io() {
        let cfg = config_with(&[(DOCKER_HUB_CANONICAL, &b64("hubuser:hubpass"))]);
        assert!(lookup_credentials(&cfg, "docker.io").is_some());
        assert!(lookup_credentials(&cfg, "ghcr.io").is_none());
    }

    #[test]
    fn no_cross_host_credential_bleed() {
        let cfg = config_with(&[("ghcr.io", &b64("gh:pw"))]);
        assert!(lookup_credentials(&cfg, "quay.io").is_none());
    }

    #[test]
    fn missing_entry_returns_none() {
        let cfg = config_with(&[]);
        assert!(lookup_credentials(&cfg, "ghcr.io").is_none());
    }
}
