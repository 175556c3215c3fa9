//! Talos machine-config patch composition, PKI-regenerating rename, and
//! kubelet cert-rotation detection.

pub mod configs;
pub mod error;
pub mod network;
pub mod patch;
pub mod pki;

pub use configs::Configs;
pub use error::TalosError;
pub use network::{nth_ip_in_network, reject_ipv6, DEFAULT_NETWORK_CIDR};
pub use patch::{kubelet_cert_rotation_enabled, load_patches, MachineConfigPatch, Scope};
pub use pki::{Bundle, CertificateAuthority, Talosconfig};
