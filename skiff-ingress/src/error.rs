//! Error types for skiff-ingress.

use std::path::PathBuf;

use skiff_core::WriteError;
use thiserror::Error;

/// All errors that can arise while reconciling the ingress config.
#[derive(Debug, Error)]
pub enum IngressError {
    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML serialization error (write path).
    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// The existing config file is not valid YAML of the expected shape.
    #[error("failed to parse ingress config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

impl From<WriteError> for IngressError {
    fn from(err: WriteError) -> Self {
        io_err(err.path, err.source)
    }
}

/// Convenience constructor for [`IngressError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> IngressError {
    IngressError::Io {
        path: path.into(),
        source,
    }
}
