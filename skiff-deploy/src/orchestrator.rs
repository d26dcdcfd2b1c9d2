//! Project lifecycle: init → (pull, build, env) → deploy → publish.
//!
//! Every operation that touches one project holds that project's lock for
//! its whole duration. `init` also holds the registration lock so the
//! uniqueness check and the insert cannot interleave with another `init`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use skiff_core::fs::atomic_write;
use skiff_core::registry::validate_name;
use skiff_core::{Config, NewProject, ProjectName, ProjectRecord, ProjectStore};
use skiff_ingress::{IngressReconciler, TunnelSeed};
use skiff_renderer::{LaunchContext, Renderer};
use skiff_runner::{CommandRunner, Toolchain, START_SCRIPT};

use crate::env_file::{self, EnvVar};
use crate::error::{io_err, DeployError};
use crate::locks::ProjectLocks;
use crate::ports::PortAllocator;

pub const DEFAULT_BRANCH: &str = "main";

// ---------------------------------------------------------------------------
// Operation results
// ---------------------------------------------------------------------------

/// Result of a successful `deploy`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deployment {
    pub message: String,
    pub port: u16,
}

/// Result of a successful `publish`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Publication {
    /// `https://<subdomain>.<domain_suffix>`.
    pub domain: String,
    pub port: u16,
    /// `false` if the tunnel reload command failed; the route is written
    /// regardless.
    pub reloaded: bool,
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

pub struct Orchestrator {
    config: Arc<Config>,
    store: Arc<dyn ProjectStore>,
    toolchain: Toolchain,
    ports: PortAllocator,
    renderer: Renderer,
    ingress: IngressReconciler,
    locks: ProjectLocks,
    registration: Mutex<()>,
}

impl Orchestrator {
    pub fn new(
        config: Arc<Config>,
        store: Arc<dyn ProjectStore>,
        runner: Arc<dyn CommandRunner>,
    ) -> Result<Self, DeployError> {
        let toolchain = Toolchain::new(runner, config.tool_timeout, config.build_timeout);
        let ingress = IngressReconciler::new(
            config.tunnel.config_path.clone(),
            TunnelSeed {
                tunnel_id: config.tunnel.tunnel_id.clone(),
                credentials_file: config.tunnel.credentials_file.clone(),
            },
            config.tunnel.reload_command.clone(),
            toolchain.clone(),
        );
        Ok(Self {
            ports: PortAllocator::new(config.port_range.clone()),
            renderer: Renderer::new()?,
            config,
            store,
            toolchain,
            ingress,
            locks: ProjectLocks::new(),
            registration: Mutex::new(()),
        })
    }

    /// Replace the port allocator (tests use a seeded one).
    pub fn with_port_allocator(mut self, ports: PortAllocator) -> Self {
        self.ports = ports;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn project_dir(&self, name: &ProjectName) -> PathBuf {
        self.config.project_dir(name)
    }

    fn require(&self, name: &ProjectName) -> Result<ProjectRecord, DeployError> {
        validate_name(name)?;
        self.store
            .find_by_name(name)?
            .ok_or_else(|| DeployError::ProjectNotFound(name.clone()))
    }

    // -- init ---------------------------------------------------------------

    /// Register a project and clone its repository into
    /// `<base_dir>/<project_name>`.
    ///
    /// If the clone fails the record is removed again, along with the
    /// project directory when this call created it.
    pub async fn init(&self, project: NewProject) -> Result<ProjectRecord, DeployError> {
        validate_name(&project.project_name)?;
        validate_field("github_url", &project.github_url)?;
        validate_subdomain(&project.subdomain)?;

        let _registration = self.registration.lock().await;
        let _project = self.locks.acquire(&project.project_name).await;

        if let Some(existing) = self
            .store
            .find_by_unique_fields(&project.subdomain, &project.github_url)?
        {
            return Err(DeployError::DuplicateProject {
                existing: existing.project_name,
            });
        }

        let record = ProjectRecord::new(project);
        self.store.insert_if_absent(record.clone())?;
        tracing::info!(
            project = %record.project_name,
            subdomain = %record.subdomain,
            github_url = %record.github_url,
            "project registered",
        );

        let dir = self.project_dir(&record.project_name);
        let created_dir = !dir.exists();
        if let Err(err) = self.clone_into(&record, &dir).await {
            self.undo_registration(&record.project_name, &dir, created_dir);
            return Err(err);
        }

        tracing::info!(project = %record.project_name, dir = %dir.display(), "repository cloned");
        Ok(record)
    }

    async fn clone_into(&self, record: &ProjectRecord, dir: &Path) -> Result<(), DeployError> {
        std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;
        self.toolchain.git_clone(&record.github_url, dir).await?;
        Ok(())
    }

    fn undo_registration(&self, name: &ProjectName, dir: &Path, created_dir: bool) {
        tracing::warn!(project = %name, "clone failed, rolling back registration");
        if let Err(err) = self.store.remove(name) {
            tracing::error!(project = %name, error = %err, "failed to remove registry record");
        }
        if created_dir && dir.exists() {
            if let Err(err) = std::fs::remove_dir_all(dir) {
                tracing::error!(dir = %dir.display(), error = %err, "failed to remove project directory");
            }
        }
    }

    // -- git / npm ----------------------------------------------------------

    /// Remote branches of the project checkout; empty for an unknown project.
    pub async fn list_branches(&self, name: &ProjectName) -> Result<Vec<String>, DeployError> {
        validate_name(name)?;
        let _project = self.locks.acquire(name).await;
        if self.store.find_by_name(name)?.is_none() {
            return Ok(Vec::new());
        }
        let branches = self
            .toolchain
            .git_remote_branches(&self.project_dir(name))
            .await?;
        tracing::debug!(project = %name, count = branches.len(), "listed remote branches");
        Ok(branches)
    }

    pub async fn pull_latest(&self, name: &ProjectName, branch: &str) -> Result<String, DeployError> {
        validate_field("branch", branch)?;
        let _project = self.locks.acquire(name).await;
        self.require(name)?;
        self.toolchain.git_pull(&self.project_dir(name), branch).await?;
        tracing::info!(project = %name, branch, "pulled latest changes");
        Ok(format!("Pulled latest changes for {name} on branch {branch}"))
    }

    pub async fn build_app(&self, name: &ProjectName, branch: &str) -> Result<String, DeployError> {
        let _project = self.locks.acquire(name).await;
        self.require(name)?;
        self.toolchain.npm_build(&self.project_dir(name)).await?;
        tracing::info!(project = %name, branch, "build finished");
        Ok(format!("Built app for project {name} on branch {branch}"))
    }

    // -- env ----------------------------------------------------------------

    pub async fn set_env_vars(&self, name: &ProjectName, vars: &[EnvVar]) -> Result<String, DeployError> {
        let _project = self.locks.acquire(name).await;
        self.require(name)?;
        let path = env_file::write(&self.project_dir(name), vars)?;
        tracing::info!(project = %name, count = vars.len(), path = %path.display(), "environment written");
        Ok(format!(
            "Set environment variables for project {name} in {}",
            path.display()
        ))
    }

    /// Current `.env` contents; empty when the file (or the project) does
    /// not exist.
    pub async fn get_env_vars(&self, name: &ProjectName) -> Result<BTreeMap<String, String>, DeployError> {
        validate_name(name)?;
        let _project = self.locks.acquire(name).await;
        env_file::read(&self.project_dir(name))
    }

    // -- deploy -------------------------------------------------------------

    /// Ensure a port, regenerate `start.js`, and (re)start the pm2 process.
    pub async fn deploy(&self, name: &ProjectName) -> Result<Deployment, DeployError> {
        let _project = self.locks.acquire(name).await;
        let mut record = self.require(name)?;

        let port = self.ports.ensure_port(self.store.as_ref(), &record)?;
        record.port = Some(port);

        let dir = self.project_dir(name);
        let launcher = self
            .renderer
            .render_launcher(&LaunchContext::from_record(&record, &dir)?)?;
        atomic_write(&dir.join(START_SCRIPT), &launcher)?;

        let removed = self.toolchain.pm2_delete(name.as_str(), &dir).await?;
        tracing::debug!(project = %name, removed, "cleared previous pm2 entry");
        self.toolchain.pm2_start(name.as_str(), &dir).await?;
        self.toolchain.pm2_save().await?;

        tracing::info!(project = %name, port, "deployed");
        Ok(Deployment {
            message: format!("Deployed {name} with PM2 on port {port}"),
            port,
        })
    }

    // -- publish ------------------------------------------------------------

    /// Route `<subdomain>.<domain_suffix>` through the tunnel to the
    /// project's port.
    pub async fn publish(&self, name: &ProjectName) -> Result<Publication, DeployError> {
        let _project = self.locks.acquire(name).await;
        let record = self.require(name)?;

        if record.subdomain.trim().is_empty() {
            return Err(DeployError::MissingConfiguration {
                project: name.clone(),
                missing: "subdomain",
            });
        }
        let port = record.port.ok_or_else(|| DeployError::MissingConfiguration {
            project: name.clone(),
            missing: "port",
        })?;

        let hostname = self.config.hostname_for(&record.subdomain);
        self.toolchain
            .route_dns(&self.config.tunnel.tunnel_name, &hostname)
            .await?;
        let outcome = self.ingress.upsert_route(&hostname, port).await?;

        tracing::info!(project = %name, hostname = %hostname, port, change = ?outcome.change, "published");
        Ok(Publication {
            domain: format!("https://{hostname}"),
            port,
            reloaded: outcome.reloaded,
        })
    }

    // -- queries ------------------------------------------------------------

    /// Every registered project, sorted by name.
    pub fn projects(&self) -> Result<Vec<ProjectRecord>, DeployError> {
        Ok(self.store.list()?)
    }
}

/// Values passed to git as positional arguments: non-empty and never an option.
fn validate_field(field: &str, value: &str) -> Result<(), DeployError> {
    if value.trim().is_empty() {
        return Err(DeployError::InvalidRequest(format!("{field} must not be empty")));
    }
    if value.starts_with('-') {
        return Err(DeployError::InvalidRequest(format!(
            "{field} must not start with '-': {value}"
        )));
    }
    Ok(())
}

/// A subdomain is one or more DNS labels: `[a-z0-9-]`, dot separated.
fn validate_subdomain(subdomain: &str) -> Result<(), DeployError> {
    let ok = !subdomain.is_empty()
        && subdomain.split('.').all(|label| {
            !label.is_empty()
                && label.len() <= 63
                && !label.starts_with('-')
                && !label.ends_with('-')
                && label
                    .chars()
                    .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        });
    if ok {
        Ok(())
    } else {
        Err(DeployError::InvalidRequest(format!(
            "invalid subdomain '{subdomain}': expected lowercase DNS labels"
        )))
    }
}
