use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced by the Talos config engine.
#[derive(Debug, Error)]
pub enum TalosError {
    #[error("ipv6 networks are not supported: {0}")]
    Ipv6NotSupported(String),

    #[error("offset must be non-negative, got {0}")]
    NegativeOffset(i64),

    #[error("invalid cidr {0}")]
    InvalidCidr(String),

    #[error("offset {offset} is out of range for a network of size {network_size}")]
    OffsetOutOfRange { offset: i64, network_size: u64 },

    #[error("invalid machine-config patch {path}: {source}")]
    InvalidPatch {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("pki generation failed: {0}")]
    Pki(String),

    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<TalosError>,
    },
}

impl TalosError {
    #[must_use]
    pub fn context(self, context: impl Into<String>) -> Self {
        Self::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }
}
