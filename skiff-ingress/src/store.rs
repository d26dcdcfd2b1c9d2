//! Loading and atomically persisting the ingress config file.

use std::path::{Path, PathBuf};

use skiff_core::fs::atomic_write;

use crate::config::IngressConfig;
use crate::error::{io_err, IngressError};

/// Tunnel metadata written into a config file Skiff creates from scratch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TunnelSeed {
    pub tunnel_id: String,
    pub credentials_file: PathBuf,
}

/// Read the config at `path`; `None` if the file does not exist. An empty
/// file reads as an empty document.
pub fn load(path: &Path) -> Result<Option<IngressConfig>, IngressError> {
    if !path.exists() {
        return Ok(None);
    }
    let contents = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
    if contents.trim().is_empty() {
        return Ok(Some(IngressConfig::default()));
    }
    serde_yaml::from_str(&contents)
        .map(Some)
        .map_err(|e| IngressError::Parse {
            path: path.to_path_buf(),
            source: e,
        })
}

/// Read the config at `path`, or build a seeded first-run document.
///
/// The second element is `true` when the document was created in memory.
pub fn load_or_init(path: &Path, seed: &TunnelSeed) -> Result<(IngressConfig, bool), IngressError> {
    match load(path)? {
        Some(config) => Ok((config, false)),
        None => {
            tracing::info!(path = %path.display(), "ingress config missing, seeding a new one");
            Ok((
                IngressConfig::seeded(seed.tunnel_id.clone(), seed.credentials_file.clone()),
                true,
            ))
        }
    }
}

/// Atomically replace the config at `path`, creating parent directories.
pub fn save(path: &Path, config: &IngressConfig) -> Result<(), IngressError> {
    let yaml = serde_yaml::to_string(config)?;
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
        }
    }
    atomic_write(path, yaml)?;
    tracing::debug!(path = %path.display(), entries = config.ingress.len(), "ingress config written");
    Ok(())
}
