//! # skiff-ingress
//!
//! Keeps the tunnel's ingress list in step with published projects.
//!
//! [`IngressConfig::upsert_route`] is the pure list transformation;
//! [`store`] loads and atomically saves the file; [`IngressReconciler`]
//! combines both under a lock and then asks the tunnel to reload.

pub mod config;
pub mod error;
pub mod reconciler;
pub mod store;

pub use config::{IngressConfig, IngressEntry, RouteChange, CATCH_ALL_SERVICE};
pub use error::IngressError;
pub use reconciler::{IngressReconciler, RouteOutcome};
pub use store::TunnelSeed;
