//! # skiff-deploy
//!
//! The project lifecycle orchestrator and the pieces it owns: port
//! allocation, the per-project `.env` file, and per-project locking.
//!
//! All external effects go through [`skiff_runner::Toolchain`], the
//! registry through [`skiff_core::ProjectStore`], and the tunnel config
//! through [`skiff_ingress::IngressReconciler`].

pub mod env_file;
pub mod error;
pub mod locks;
pub mod orchestrator;
pub mod ports;

pub use env_file::EnvVar;
pub use error::DeployError;
pub use locks::ProjectLocks;
pub use orchestrator::{Deployment, Orchestrator, Publication, DEFAULT_BRANCH};
pub use ports::{PortAllocator, MAX_ATTEMPTS};
