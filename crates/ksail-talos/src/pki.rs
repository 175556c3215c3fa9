//! PKI bundle generation.
//!
//! Node certs embed the cluster name, so a rename must regenerate every CA
//! from scratch rather than reuse key material (spec §4.10). Grounded on
//! `rcgen`'s self-signed CA pattern as used for certificate identity in
//! `examples/newrelic-newrelic-agent-control` (same workspace dependency,
//! here generating cluster CAs instead of agent-control client certs).

use rcgen::{BasicConstraints, CertificateParams, DistinguishedName, DnType, IsCa, KeyPair, KeyUsagePurpose};

use crate::error::TalosError;

/// A self-signed certificate authority: PEM certificate + PEM private key.
#[derive(Debug, Clone)]
pub struct CertificateAuthority {
    pub certificate_pem: String,
    pub private_key_pem: String,
}

impl CertificateAuthority {
    fn generate(common_name: &str) -> Result<Self, TalosError> {
        let key_pair = KeyPair::generate().map_err(|err| TalosError::Pki(err.to_string()))?;

        let mut params =
            CertificateParams::new(Vec::<String>::new()).map_err(|err| TalosError::Pki(err.to_string()))?;
        let mut distinguished_name = DistinguishedName::new();
        distinguished_name.push(DnType::CommonName, common_name);
        params.distinguished_name = distinguished_name;
        params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        params.key_usages = vec![KeyUsagePurpose::KeyCertSign, KeyUsagePurpose::CrlSign];

        let certificate = params
            .self_signed(&key_pair)
            .map_err(|err| TalosError::Pki(err.to_string()))?;

        Ok(Self {
            certificate_pem: certificate.pem(),
            private_key_pem: key_pair.serialize_pem(),
        })
    }
}

/// The three CAs a Talos cluster needs: etcd, Kubernetes, and the Talos
/// machine identity itself.
#[derive(Debug, Clone)]
pub struct Bundle {
    pub cluster_name: String,
    pub etcd: CertificateAuthority,
    pub kubernetes: CertificateAuthority,
    pub talos: CertificateAuthority,
}

impl Bundle {
    /// Generate a fresh bundle for `cluster_name`. Each call produces
    /// distinct key material, even for the same name.
    ///
    /// # Errors
    ///
    /// Returns [`TalosError::Pki`] if certificate generation fails.
    pub fn generate(cluster_name: &str) -> Result<Self, TalosError> {
        Ok(Self {
            cluster_name: cluster_name.to_string(),
            etcd: CertificateAuthority::generate(&format!("{cluster_name}-etcd-ca"))?,
            kubernetes: CertificateAuthority::generate(&format!("{cluster_name}-kubernetes-ca"))?,
            talos: CertificateAuthority::generate(&format!("{cluster_name}-talos-ca"))?,
        })
    }
}

/// The minimal piece of a generated `talosconfig` the engine cares about:
/// which cluster context it points at.
#[derive(Debug, Clone)]
pub struct Talosconfig {
    pub context: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_bundle_embeds_cluster_name_in_ca_subjects() {
        let bundle = Bundle::generate("demo").unwrap();
        assert!(bundle.etcd.certificate_pem.contains("BEGIN CERTIFICATE"));
        assert!(bundle.kubernetes.certificate_pem.contains("BEGIN CERTIFICATE"));
        assert!(bundle.talos.certificate_pem.contains("BEGIN CERTIFICATE"));
    }

    #[test]
    fn two_generations_for_the_same_name_produce_different_key_material() {
        let first = Bundle::generate("demo").unwrap();
        let second = Bundle::generate("demo").unwrap();
        assert_ne!(first.talos.private_key_pem, second.talos.private_key_pem);
    }
}
