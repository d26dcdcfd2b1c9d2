//! Domain types for the Skiff project registry.
//!
//! All types are serializable/deserializable via serde + serde_yaml.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// A strongly-typed project name. Unique across the registry and immutable
/// once the record exists.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectName(pub String);

impl ProjectName {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProjectName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for ProjectName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ProjectName {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Domain structs
// ---------------------------------------------------------------------------

/// Registration payload accepted by `init`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProject {
    pub project_name: ProjectName,
    pub github_url: String,
    pub subdomain: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// One managed project. The only entity persisted in the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectRecord {
    pub project_name: ProjectName,
    pub github_url: String,
    pub subdomain: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Assigned lazily on first deploy; stable afterwards.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProjectRecord {
    /// Build a fresh record (no port yet) from a registration payload.
    pub fn new(project: NewProject) -> Self {
        let now = Utc::now();
        Self {
            project_name: project.project_name,
            github_url: project.github_url,
            subdomain: project.subdomain,
            description: project.description,
            port: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// `true` if this record shares any unique field with `other`.
    pub fn collides_with(&self, other: &ProjectRecord) -> bool {
        self.project_name == other.project_name
            || self.subdomain == other.subdomain
            || self.github_url == other.github_url
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn new_project(name: &str, url: &str, sub: &str) -> NewProject {
        NewProject {
            project_name: ProjectName::from(name),
            github_url: url.to_string(),
            subdomain: sub.to_string(),
            description: None,
        }
    }

    #[test]
    fn newtype_display() {
        assert_eq!(ProjectName::from("demo").to_string(), "demo");
        assert_eq!(ProjectName::from(String::from("x")).as_str(), "x");
    }

    #[test]
    fn new_record_has_no_port() {
        let record = ProjectRecord::new(new_project("demo", "https://x/y.git", "demo-sub"));
        assert_eq!(record.port, None);
        assert_eq!(record.created_at, record.updated_at);
    }

    #[test]
    fn collision_on_any_unique_field() {
        let a = ProjectRecord::new(new_project("a", "https://x/a.git", "a"));
        let same_sub = ProjectRecord::new(new_project("b", "https://x/b.git", "a"));
        let same_url = ProjectRecord::new(new_project("c", "https://x/a.git", "c"));
        let distinct = ProjectRecord::new(new_project("d", "https://x/d.git", "d"));
        assert!(a.collides_with(&same_sub));
        assert!(a.collides_with(&same_url));
        assert!(!a.collides_with(&distinct));
    }

    #[test]
    fn record_yaml_omits_absent_optionals() {
        let record = ProjectRecord::new(new_project("demo", "https://x/y.git", "demo-sub"));
        let yaml = serde_yaml::to_string(&record).expect("serialize");
        assert!(yaml.contains("project_name: demo"));
        assert!(!yaml.contains("port"));
        assert!(!yaml.contains("description"));
    }
}
