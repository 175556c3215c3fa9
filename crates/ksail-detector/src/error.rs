//! Errors for component detection.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DetectorError {
    #[error("query helm release {name} in {namespace}: {source}")]
    Helm {
        namespace: String,
        name: String,
        source: String,
    },

    #[error("query kubernetes: {0}")]
    Kube(#[from] kube::Error),

    #[error("query docker: {0}")]
    Docker(String),

    #[error("{context}: {source}")]
    Context {
        context: String,
        source: Box<Self>,
    },
}

impl DetectorError {
    #[must_use]
    pub fn context(self, context: impl Into<String>) -> Self {
        Self::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }
}
