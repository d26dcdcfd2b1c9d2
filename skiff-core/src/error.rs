//! Error types for skiff-core.

use std::path::PathBuf;

use thiserror::Error;

use crate::types::ProjectName;

/// All errors that can arise from registry operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Underlying I/O failure, annotated with the path involved.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML serialization error (write/save path).
    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// YAML parse error on load; includes file path and line context from serde_yaml.
    #[error("failed to parse registry document at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// Insert rejected: a record already owns the name, subdomain or repository URL.
    #[error("project conflicts with existing record '{existing}'")]
    Conflict { existing: ProjectName },

    /// Update targeted a project that is not registered.
    #[error("project '{0}' is not registered")]
    NotFound(ProjectName),

    /// Project name cannot be used as a document file name.
    #[error("invalid project name '{0}': must be non-empty and contain only [A-Za-z0-9._-]")]
    InvalidName(String),
}

/// Errors raised while building [`crate::Config`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// `dirs::home_dir()` returned `None`; cannot resolve default paths.
    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,

    /// A variable was present but could not be parsed.
    #[error("invalid value for {var}: {message}")]
    Invalid { var: &'static str, message: String },
}

/// A failed [`crate::fs::atomic_write`], annotated with the path involved.
#[derive(Debug, Error)]
#[error("I/O error at {path}: {source}")]
pub struct WriteError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

impl WriteError {
    pub(crate) fn new(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self {
            path: path.into(),
            source,
        }
    }
}

impl From<WriteError> for RegistryError {
    fn from(err: WriteError) -> Self {
        io_err(err.path, err.source)
    }
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> RegistryError {
    RegistryError::Io {
        path: path.into(),
        source,
    }
}
