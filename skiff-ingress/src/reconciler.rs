//! Load → upsert → save → reload, serialised per config file.

use std::path::{Path, PathBuf};

use tokio::sync::Mutex;

use skiff_runner::Toolchain;

use crate::config::RouteChange;
use crate::error::IngressError;
use crate::store::{self, TunnelSeed};

/// Result of one reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteOutcome {
    pub change: RouteChange,
    /// `true` if the config file did not exist and was created.
    pub created: bool,
    /// `false` if the reload command failed; the config file is still
    /// authoritative.
    pub reloaded: bool,
}

/// Owns the ingress config file for the lifetime of the process.
pub struct IngressReconciler {
    path: PathBuf,
    seed: TunnelSeed,
    reload_command: Vec<String>,
    toolchain: Toolchain,
    file_lock: Mutex<()>,
}

impl IngressReconciler {
    pub fn new(
        path: impl Into<PathBuf>,
        seed: TunnelSeed,
        reload_command: Vec<String>,
        toolchain: Toolchain,
    ) -> Self {
        Self {
            path: path.into(),
            seed,
            reload_command,
            toolchain,
            file_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Route `hostname` to `localhost:<port>` in the config file, then ask
    /// the tunnel to reload. Reload failures are logged and reported in
    /// [`RouteOutcome::reloaded`], never returned as errors.
    pub async fn upsert_route(&self, hostname: &str, port: u16) -> Result<RouteOutcome, IngressError> {
        let (change, created) = {
            // Read-modify-write of a shared file: publishes for different
            // projects must not interleave here.
            let _guard = self.file_lock.lock().await;
            let (mut config, created) = store::load_or_init(&self.path, &self.seed)?;
            let change = config.upsert_route(hostname, port);
            store::save(&self.path, &config)?;
            (change, created)
        };
        tracing::info!(
            hostname,
            port,
            change = ?change,
            path = %self.path.display(),
            "ingress route written",
        );

        let reloaded = match self.toolchain.reload_tunnel(&self.reload_command).await {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(
                    error = %err,
                    path = %self.path.display(),
                    "tunnel reload failed; restart it manually to pick up the new config",
                );
                false
            }
        };

        Ok(RouteOutcome {
            change,
            created,
            reloaded,
        })
    }
}
