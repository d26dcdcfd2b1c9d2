//! Template context: serializable rendering payload built from a [`ProjectRecord`].

use std::path::Path;

use serde::{Deserialize, Serialize};

use skiff_core::ProjectRecord;

use crate::error::RenderError;

/// Everything the `start.js` launcher template needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchContext {
    pub project_name: String,
    /// Absolute path of the checkout the launcher `chdir`s into.
    pub project_dir: String,
    pub port: u16,
}

impl LaunchContext {
    /// Build the context for `record`, cloned at `project_dir`.
    ///
    /// Fails with [`RenderError::MissingPort`] if no port is assigned yet.
    pub fn from_record(record: &ProjectRecord, project_dir: &Path) -> Result<Self, RenderError> {
        let port = record
            .port
            .ok_or_else(|| RenderError::MissingPort(record.project_name.0.clone()))?;
        Ok(Self {
            project_name: record.project_name.0.clone(),
            project_dir: project_dir.display().to_string(),
            port,
        })
    }

    pub(crate) fn to_tera(&self) -> Result<tera::Context, RenderError> {
        Ok(tera::Context::from_serialize(self)?)
    }
}
