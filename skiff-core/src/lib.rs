//! Skiff core library: domain types, registry stores, configuration, errors.
//!
//! - [`types`]: [`ProjectName`] and [`ProjectRecord`]
//! - [`registry`]: the [`ProjectStore`] capability, [`YamlStore`], [`MemoryStore`]
//! - [`config`]: [`Config`], resolved once at process start
//! - [`fs`]: atomic file replacement shared by every writer
//! - [`error`]: [`RegistryError`], [`ConfigError`], [`WriteError`]

pub mod config;
pub mod error;
pub mod fs;
pub mod registry;
pub mod types;

pub use config::{Config, TunnelConfig};
pub use error::{ConfigError, RegistryError, WriteError};
pub use registry::{MemoryStore, ProjectStore, YamlStore};
pub use types::{NewProject, ProjectName, ProjectRecord};
