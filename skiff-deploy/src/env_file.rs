//! The per-project `.env` file.
//!
//! Format is plain `KEY=VALUE` lines with no quoting or escaping. Writing
//! replaces the whole file; reading skips lines without `=` and takes
//! everything after the first `=` as the value.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use skiff_core::fs::atomic_write;

use crate::error::{io_err, DeployError};

pub const ENV_FILE: &str = ".env";

/// One `KEY=VALUE` pair as sent by a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvVar {
    pub key: String,
    pub value: String,
}

impl EnvVar {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

pub fn env_path(project_dir: &Path) -> PathBuf {
    project_dir.join(ENV_FILE)
}

/// Render `vars` as file content. A repeated key keeps the position of its
/// first occurrence and the value of its last.
pub fn render(vars: &[EnvVar]) -> Result<String, DeployError> {
    let mut ordered: Vec<(&str, &str)> = Vec::with_capacity(vars.len());
    for var in vars {
        validate(var)?;
        match ordered.iter_mut().find(|(key, _)| *key == var.key) {
            Some(slot) => slot.1 = var.value.as_str(),
            None => ordered.push((var.key.as_str(), var.value.as_str())),
        }
    }
    Ok(ordered
        .into_iter()
        .map(|(key, value)| format!("{key}={value}\n"))
        .collect())
}

fn validate(var: &EnvVar) -> Result<(), DeployError> {
    let key = &var.key;
    if key.is_empty() || key.contains('=') || key.chars().any(char::is_whitespace) {
        return Err(DeployError::InvalidRequest(format!(
            "invalid environment variable name {:?}",
            var.key
        )));
    }
    if var.value.contains('\n') || var.value.contains('\r') {
        return Err(DeployError::InvalidRequest(format!(
            "value of {} must be a single line",
            var.key
        )));
    }
    Ok(())
}

/// Parse file content into a key → value map.
pub fn parse(content: &str) -> BTreeMap<String, String> {
    content
        .lines()
        .map(str::trim)
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect()
}

/// Overwrite `<project_dir>/.env` with `vars`.
pub fn write(project_dir: &Path, vars: &[EnvVar]) -> Result<PathBuf, DeployError> {
    let path = env_path(project_dir);
    atomic_write(&path, &render(vars)?)?;
    Ok(path)
}

/// Read `<project_dir>/.env`; a missing file is an empty map.
pub fn read(project_dir: &Path) -> Result<BTreeMap<String, String>, DeployError> {
    let path = env_path(project_dir);
    match std::fs::read_to_string(&path) {
        Ok(content) => Ok(parse(&content)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
        Err(e) => Err(io_err(path, e)),
    }
}
