//! Ingress configuration document and the route-upsert transformation.
//!
//! The document is the tunnel's own config file:
//!
//! ```yaml
//! tunnel: <id>
//! credentials-file: /home/me/.cloudflared/credentials.json
//! ingress:
//!   - hostname: shop.example.dev
//!     service: http://localhost:31337
//!   - service: http_status:404
//! ```
//!
//! Keys Skiff does not model are carried through untouched, both at the top
//! level and on individual entries.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_yaml::Value;

/// Service of the fallback entry Skiff appends when none exists.
pub const CATCH_ALL_SERVICE: &str = "http_status:404";

const PATH_KEY: &str = "path";

/// One ingress rule. An entry matching neither a hostname nor a path is the
/// catch-all.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngressEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    pub service: String,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl IngressEntry {
    /// `{hostname, service: "http://localhost:<port>"}`.
    pub fn route(hostname: impl Into<String>, port: u16) -> Self {
        Self {
            hostname: Some(hostname.into()),
            service: local_service(port),
            extra: BTreeMap::new(),
        }
    }

    /// `{service: "http_status:404"}`.
    pub fn catch_all() -> Self {
        Self {
            hostname: None,
            service: CATCH_ALL_SERVICE.to_string(),
            extra: BTreeMap::new(),
        }
    }

    /// Path-only rules (`{path: ^/static/, service: ...}`) are not catch-alls.
    pub fn is_catch_all(&self) -> bool {
        self.hostname.is_none() && !self.extra.contains_key(PATH_KEY)
    }
}

/// `http://localhost:<port>`.
pub fn local_service(port: u16) -> String {
    format!("http://localhost:{port}")
}

/// Whole tunnel config document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IngressConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tunnel: Option<String>,
    #[serde(
        rename = "credentials-file",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub credentials_file: Option<PathBuf>,
    #[serde(default)]
    pub ingress: Vec<IngressEntry>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// What [`IngressConfig::upsert_route`] did to the hostname's entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteChange {
    /// No entry existed for the hostname.
    Added,
    /// An entry existed (possibly pointing elsewhere) and was replaced.
    Replaced { previous_service: String },
}

impl IngressConfig {
    /// A first-run document: tunnel metadata plus the catch-all only.
    pub fn seeded(tunnel_id: impl Into<String>, credentials_file: impl Into<PathBuf>) -> Self {
        Self {
            tunnel: Some(tunnel_id.into()),
            credentials_file: Some(credentials_file.into()),
            ingress: vec![IngressEntry::catch_all()],
            extra: BTreeMap::new(),
        }
    }

    /// Route `hostname` to `localhost:<port>`.
    ///
    /// 1. drop every entry for `hostname`;
    /// 2. insert the new entry at the head, so the latest publish wins over
    ///    overlapping (e.g. wildcard) rules further down;
    /// 3. keep exactly one catch-all, last.
    pub fn upsert_route(&mut self, hostname: &str, port: u16) -> RouteChange {
        let mut previous = None;
        self.ingress.retain(|entry| {
            if entry.hostname.as_deref() == Some(hostname) {
                previous.get_or_insert_with(|| entry.service.clone());
                false
            } else {
                true
            }
        });

        self.ingress.insert(0, IngressEntry::route(hostname, port));
        self.normalize_catch_all();

        match previous {
            Some(previous_service) => RouteChange::Replaced { previous_service },
            None => RouteChange::Added,
        }
    }

    /// Collapse catch-all entries to one (the first seen, or a fresh
    /// `http_status:404` if there was none) and move it to the end. Every
    /// other rule keeps its relative order.
    pub fn normalize_catch_all(&mut self) {
        let mut fallback = None;
        self.ingress.retain(|entry| {
            if entry.is_catch_all() {
                fallback.get_or_insert_with(|| entry.clone());
                false
            } else {
                true
            }
        });
        self.ingress
            .push(fallback.unwrap_or_else(IngressEntry::catch_all));
    }

    /// The entry currently serving `hostname`, if any.
    pub fn route_for(&self, hostname: &str) -> Option<&IngressEntry> {
        self.ingress
            .iter()
            .find(|entry| entry.hostname.as_deref() == Some(hostname))
    }
}
