//! Project registry: the [`ProjectStore`] capability and its two backends.
//!
//! # Storage layout ([`YamlStore`])
//!
//! ```text
//! <registry_dir>/
//!   <project_name>.yaml   (one document per project, mode 0600)
//! ```
//!
//! Documents are written through [`crate::fs::atomic_write_with_mode`] with
//! mode 0600.
//!
//! [`MemoryStore`] keeps records in a `BTreeMap` and is what the orchestrator
//! tests run against.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;

use crate::error::{io_err, RegistryError};
use crate::fs::atomic_write_with_mode;
use crate::types::{ProjectName, ProjectRecord};

// ---------------------------------------------------------------------------
// 1. Capability
// ---------------------------------------------------------------------------

/// CRUD-style access to project records.
///
/// Implementations guarantee atomicity per single-document operation only.
pub trait ProjectStore: Send + Sync {
    /// Look up a record by its project name.
    fn find_by_name(&self, name: &ProjectName) -> Result<Option<ProjectRecord>, RegistryError>;

    /// Return the first record whose `subdomain` OR `github_url` matches.
    fn find_by_unique_fields(
        &self,
        subdomain: &str,
        github_url: &str,
    ) -> Result<Option<ProjectRecord>, RegistryError>;

    /// Insert `record` unless another record shares its name, subdomain or
    /// repository URL, in which case [`RegistryError::Conflict`] is returned.
    fn insert_if_absent(&self, record: ProjectRecord) -> Result<(), RegistryError>;

    /// Set the assigned port of an existing record.
    fn set_port(&self, name: &ProjectName, port: u16) -> Result<(), RegistryError>;

    /// All records, sorted by project name.
    fn list(&self) -> Result<Vec<ProjectRecord>, RegistryError>;

    /// Delete a record. Returns `true` if it existed.
    ///
    /// Only used to undo a registration whose clone failed.
    fn remove(&self, name: &ProjectName) -> Result<bool, RegistryError>;
}

/// Project names become file and directory names, so keep them boring.
pub fn validate_name(name: &ProjectName) -> Result<(), RegistryError> {
    let ok = !name.0.is_empty()
        && name.0 != "."
        && name.0 != ".."
        && name
            .0
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if ok {
        Ok(())
    } else {
        Err(RegistryError::InvalidName(name.0.clone()))
    }
}

fn find_collision<'a>(
    records: impl IntoIterator<Item = &'a ProjectRecord>,
    candidate: &ProjectRecord,
) -> Option<ProjectName> {
    records
        .into_iter()
        .find(|existing| existing.collides_with(candidate))
        .map(|existing| existing.project_name.clone())
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ---------------------------------------------------------------------------
// 2. YAML document store
// ---------------------------------------------------------------------------

/// File-backed store: one YAML document per project under `dir`.
#[derive(Debug)]
pub struct YamlStore {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl YamlStore {
    /// Create a store rooted at `dir`. The directory is created lazily on
    /// first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `<dir>/<project>.yaml`; pure, no I/O.
    pub fn record_path(&self, name: &ProjectName) -> PathBuf {
        self.dir.join(format!("{}.yaml", name.0))
    }

    fn ensure_dir(&self) -> Result<(), RegistryError> {
        if !self.dir.exists() {
            std::fs::create_dir_all(&self.dir).map_err(|e| io_err(&self.dir, e))?;
            set_dir_permissions(&self.dir)?;
        }
        Ok(())
    }

    fn load_path(path: &Path) -> Result<ProjectRecord, RegistryError> {
        let contents = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
        serde_yaml::from_str(&contents).map_err(|e| RegistryError::Parse {
            path: path.to_path_buf(),
            source: e,
        })
    }

    fn load(&self, name: &ProjectName) -> Result<Option<ProjectRecord>, RegistryError> {
        validate_name(name)?;
        let path = self.record_path(name);
        if !path.exists() {
            return Ok(None);
        }
        Self::load_path(&path).map(Some)
    }

    fn load_all(&self) -> Result<Vec<ProjectRecord>, RegistryError> {
        if !self.dir.exists() {
            return Ok(vec![]);
        }
        let mut entries: Vec<_> = std::fs::read_dir(&self.dir)
            .map_err(|e| io_err(&self.dir, e))?
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
            .filter(|e| e.file_name().to_string_lossy().ends_with(".yaml"))
            .collect();
        entries.sort_by_key(|e| e.file_name());

        entries
            .into_iter()
            .map(|entry| Self::load_path(&entry.path()))
            .collect()
    }

    /// Atomically write `record` to its document path.
    fn save(&self, record: &ProjectRecord) -> Result<(), RegistryError> {
        self.ensure_dir()?;
        let path = self.record_path(&record.project_name);
        let yaml = serde_yaml::to_string(record)?;
        atomic_write_with_mode(&path, yaml, 0o600)?;
        Ok(())
    }
}

impl ProjectStore for YamlStore {
    fn find_by_name(&self, name: &ProjectName) -> Result<Option<ProjectRecord>, RegistryError> {
        self.load(name)
    }

    fn find_by_unique_fields(
        &self,
        subdomain: &str,
        github_url: &str,
    ) -> Result<Option<ProjectRecord>, RegistryError> {
        Ok(self
            .load_all()?
            .into_iter()
            .find(|r| r.subdomain == subdomain || r.github_url == github_url))
    }

    fn insert_if_absent(&self, record: ProjectRecord) -> Result<(), RegistryError> {
        validate_name(&record.project_name)?;
        let _guard = lock(&self.write_lock);
        let existing = self.load_all()?;
        if let Some(existing) = find_collision(&existing, &record) {
            return Err(RegistryError::Conflict { existing });
        }
        self.save(&record)?;
        tracing::debug!(project = %record.project_name, "registry document created");
        Ok(())
    }

    fn set_port(&self, name: &ProjectName, port: u16) -> Result<(), RegistryError> {
        let _guard = lock(&self.write_lock);
        let mut record = self
            .load(name)?
            .ok_or_else(|| RegistryError::NotFound(name.clone()))?;
        record.port = Some(port);
        record.updated_at = Utc::now();
        self.save(&record)
    }

    fn list(&self) -> Result<Vec<ProjectRecord>, RegistryError> {
        let mut records = self.load_all()?;
        records.sort_by(|a, b| a.project_name.cmp(&b.project_name));
        Ok(records)
    }

    fn remove(&self, name: &ProjectName) -> Result<bool, RegistryError> {
        validate_name(name)?;
        let _guard = lock(&self.write_lock);
        let path = self.record_path(name);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(io_err(&path, e)),
        }
    }
}

// ---------------------------------------------------------------------------
// 3. In-memory store
// ---------------------------------------------------------------------------

/// Process-local store, keyed by project name.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<BTreeMap<ProjectName, ProjectRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProjectStore for MemoryStore {
    fn find_by_name(&self, name: &ProjectName) -> Result<Option<ProjectRecord>, RegistryError> {
        Ok(lock(&self.records).get(name).cloned())
    }

    fn find_by_unique_fields(
        &self,
        subdomain: &str,
        github_url: &str,
    ) -> Result<Option<ProjectRecord>, RegistryError> {
        Ok(lock(&self.records)
            .values()
            .find(|r| r.subdomain == subdomain || r.github_url == github_url)
            .cloned())
    }

    fn insert_if_absent(&self, record: ProjectRecord) -> Result<(), RegistryError> {
        validate_name(&record.project_name)?;
        let mut records = lock(&self.records);
        if let Some(existing) = find_collision(records.values(), &record) {
            return Err(RegistryError::Conflict { existing });
        }
        records.insert(record.project_name.clone(), record);
        Ok(())
    }

    fn set_port(&self, name: &ProjectName, port: u16) -> Result<(), RegistryError> {
        let mut records = lock(&self.records);
        let record = records
            .get_mut(name)
            .ok_or_else(|| RegistryError::NotFound(name.clone()))?;
        record.port = Some(port);
        record.updated_at = Utc::now();
        Ok(())
    }

    fn list(&self) -> Result<Vec<ProjectRecord>, RegistryError> {
        Ok(lock(&self.records).values().cloned().collect())
    }

    fn remove(&self, name: &ProjectName) -> Result<bool, RegistryError> {
        Ok(lock(&self.records).remove(name).is_some())
    }
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

#[cfg(unix)]
fn set_dir_permissions(path: &Path) -> Result<(), RegistryError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))
        .map_err(|e| io_err(path, e))
}
#[cfg(not(unix))]
fn set_dir_permissions(_path: &Path) -> Result<(), RegistryError> {
    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
