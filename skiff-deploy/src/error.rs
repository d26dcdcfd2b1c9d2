//! Error taxonomy surfaced by every orchestrator operation.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use skiff_core::{ProjectName, RegistryError, WriteError};
use skiff_ingress::IngressError;
use skiff_renderer::RenderError;
use skiff_runner::RunnerError;

#[derive(Debug, Error)]
pub enum DeployError {
    /// `init` found a record sharing the subdomain, repository URL or name.
    #[error("subdomain or GitHub URL already registered by project '{existing}'")]
    DuplicateProject { existing: ProjectName },

    #[error("project '{0}' not found")]
    ProjectNotFound(ProjectName),

    /// `publish` needs both a subdomain and a deployed port.
    #[error("project '{project}' is missing {missing} configuration")]
    MissingConfiguration {
        project: ProjectName,
        missing: &'static str,
    },

    /// Every candidate port drawn was already assigned.
    #[error("no free port found after {attempts} attempts")]
    AllocationExhausted { attempts: usize },

    /// git / npm / pm2 / cloudflared could not run or exited non-zero.
    #[error("external tool failure: {0}")]
    ExternalToolFailure(#[source] RunnerError),

    #[error("`{command}` timed out after {}s", .timeout.as_secs())]
    ExternalToolTimeout { command: String, timeout: Duration },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("registry error: {0}")]
    Registry(#[source] RegistryError),

    #[error("ingress error: {0}")]
    Ingress(#[from] IngressError),

    #[error("render error: {0}")]
    Render(#[from] RenderError),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl From<RunnerError> for DeployError {
    fn from(err: RunnerError) -> Self {
        match err {
            RunnerError::Timeout { command, timeout } => {
                DeployError::ExternalToolTimeout { command, timeout }
            }
            other => DeployError::ExternalToolFailure(other),
        }
    }
}

impl From<RegistryError> for DeployError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::Conflict { existing } => DeployError::DuplicateProject { existing },
            RegistryError::NotFound(name) => DeployError::ProjectNotFound(name),
            RegistryError::InvalidName(name) => {
                DeployError::InvalidRequest(format!("invalid project name '{name}'"))
            }
            other => DeployError::Registry(other),
        }
    }
}

impl From<WriteError> for DeployError {
    fn from(err: WriteError) -> Self {
        io_err(err.path, err.source)
    }
}

/// Convenience constructor for [`DeployError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> DeployError {
    DeployError::Io {
        path: path.into(),
        source,
    }
}
