//! Process-wide configuration, resolved once at start-up.
//!
//! [`Config::from_env`] reads the process environment (after loading a `.env`
//! file, if present) and delegates to [`Config::from_vars`], which takes the
//! variables and the home directory explicitly. Tests must call `from_vars`.

use std::collections::HashMap;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;

pub const DEFAULT_PORT_MIN: u16 = 30000;
pub const DEFAULT_PORT_MAX: u16 = 65535;
pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(120);
pub const DEFAULT_BUILD_TIMEOUT: Duration = Duration::from_secs(900);

/// Tunnel identity and ingress config location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TunnelConfig {
    /// Seeded into a freshly created ingress config as `tunnel:`.
    pub tunnel_id: String,
    /// Tunnel name passed to `cloudflared tunnel route dns`.
    pub tunnel_name: String,
    /// Public suffix; a project is published at `<subdomain>.<domain_suffix>`.
    pub domain_suffix: String,
    /// Ingress configuration file.
    pub config_path: PathBuf,
    /// Seeded into a freshly created ingress config as `credentials-file:`.
    pub credentials_file: PathBuf,
    /// argv used to make the running tunnel pick up a rewritten config.
    ///
    /// Parsed from `SKIFF_TUNNEL_RELOAD_CMD` by splitting on whitespace.
    /// Quotes are not interpreted, so no argument can contain a space; wrap
    /// such a command in a script and point the variable at the script.
    pub reload_command: Vec<String>,
}

/// Everything Skiff needs from its environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Directory holding one registry document per project.
    pub registry_dir: PathBuf,
    /// Working storage: each project is cloned into `<base_dir>/<project_name>`.
    pub base_dir: PathBuf,
    pub tunnel: TunnelConfig,
    pub port_range: RangeInclusive<u16>,
    /// Timeout for short tool invocations (git metadata, pm2, cloudflared).
    pub tool_timeout: Duration,
    /// Timeout for clone and npm install/build.
    pub build_timeout: Duration,
}

impl Config {
    /// Resolve configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!(path = %path.display(), "loaded .env file");
        }
        let home = dirs::home_dir().ok_or(ConfigError::HomeNotFound)?;
        Self::from_vars(std::env::vars(), &home)
    }

    /// Resolve configuration from explicit variables; `home` anchors every
    /// default path.
    pub fn from_vars<I, K, V>(vars: I, home: &Path) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let vars: HashMap<String, String> = vars
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .filter(|(_, v)| !v.trim().is_empty())
            .collect();
        let get = |key: &str| vars.get(key).map(String::as_str);
        let path_or = |key: &str, default: PathBuf| get(key).map(PathBuf::from).unwrap_or(default);

        let skiff_root = home.join(".skiff");
        let cloudflared_root = home.join(".cloudflared");

        let port_min = parse_or(get("SKIFF_PORT_MIN"), "SKIFF_PORT_MIN", DEFAULT_PORT_MIN)?;
        let port_max = parse_or(get("SKIFF_PORT_MAX"), "SKIFF_PORT_MAX", DEFAULT_PORT_MAX)?;
        if port_min > port_max {
            return Err(ConfigError::Invalid {
                var: "SKIFF_PORT_MIN",
                message: format!("{port_min} is greater than SKIFF_PORT_MAX ({port_max})"),
            });
        }

        let reload_command: Vec<String> = get("SKIFF_TUNNEL_RELOAD_CMD")
            .unwrap_or("systemctl restart cloudflared")
            .split_whitespace()
            .map(str::to_string)
            .collect();

        Ok(Self {
            registry_dir: path_or("SKIFF_REGISTRY_DIR", skiff_root.join("registry")),
            base_dir: path_or("BASE_DIR", skiff_root.join("projects")),
            tunnel: TunnelConfig {
                tunnel_id: get("CLOUDFLARE_TUNNEL_ID")
                    .unwrap_or("your-tunnel-id")
                    .to_string(),
                tunnel_name: get("SKIFF_TUNNEL_NAME").unwrap_or("nusadeploy").to_string(),
                domain_suffix: get("SKIFF_DOMAIN_SUFFIX")
                    .unwrap_or("nusarithm.id")
                    .trim_start_matches('.')
                    .to_string(),
                config_path: path_or("SKIFF_TUNNEL_CONFIG", cloudflared_root.join("config.yml")),
                credentials_file: path_or(
                    "SKIFF_TUNNEL_CREDENTIALS",
                    cloudflared_root.join("credentials.json"),
                ),
                reload_command,
            },
            port_range: port_min..=port_max,
            tool_timeout: parse_secs_or(
                get("SKIFF_TOOL_TIMEOUT_SECS"),
                "SKIFF_TOOL_TIMEOUT_SECS",
                DEFAULT_TOOL_TIMEOUT,
            )?,
            build_timeout: parse_secs_or(
                get("SKIFF_BUILD_TIMEOUT_SECS"),
                "SKIFF_BUILD_TIMEOUT_SECS",
                DEFAULT_BUILD_TIMEOUT,
            )?,
        })
    }

    /// `<base_dir>/<project>`; pure, no I/O.
    pub fn project_dir(&self, project: &crate::types::ProjectName) -> PathBuf {
        self.base_dir.join(&project.0)
    }

    /// Public hostname for a subdomain.
    pub fn hostname_for(&self, subdomain: &str) -> String {
        format!("{subdomain}.{}", self.tunnel.domain_suffix)
    }
}

fn parse_or<T: FromStr>(raw: Option<&str>, var: &'static str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match raw {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            var,
            message: e.to_string(),
        }),
    }
}

fn parse_secs_or(
    raw: Option<&str>,
    var: &'static str,
    default: Duration,
) -> Result<Duration, ConfigError> {
    let secs = parse_or(raw, var, default.as_secs())?;
    if secs == 0 {
        return Err(ConfigError::Invalid {
            var,
            message: "timeout must be at least one second".to_string(),
        });
    }
    Ok(Duration::from_secs(secs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ProjectName;

    fn home() -> PathBuf {
        PathBuf::from("/home/deployer")
    }

    fn no_vars() -> Vec<(String, String)> {
        vec![]
    }

    #[test]
    fn defaults_are_anchored_at_home() {
        let config = Config::from_vars(no_vars(), &home()).expect("config");
        assert_eq!(config.registry_dir, home().join(".skiff/registry"));
        assert_eq!(config.base_dir, home().join(".skiff/projects"));
        assert_eq!(config.tunnel.config_path, home().join(".cloudflared/config.yml"));
        assert_eq!(config.tunnel.tunnel_name, "nusadeploy");
        assert_eq!(config.port_range, 30000..=65535);
        assert_eq!(config.tool_timeout, DEFAULT_TOOL_TIMEOUT);
        assert_eq!(
            config.tunnel.reload_command,
            vec!["systemctl", "restart", "cloudflared"]
        );
    }

    #[test]
    fn variables_override_defaults() {
        let config = Config::from_vars(
            [
                ("BASE_DIR", "/srv/apps"),
                ("CLOUDFLARE_TUNNEL_ID", "abc-123"),
                ("SKIFF_DOMAIN_SUFFIX", ".example.dev"),
                ("SKIFF_PORT_MIN", "40000"),
                ("SKIFF_PORT_MAX", "40010"),
                ("SKIFF_BUILD_TIMEOUT_SECS", "30"),
                ("SKIFF_TUNNEL_RELOAD_CMD", "pm2 restart tunnel"),
            ],
            &home(),
        )
        .expect("config");
        assert_eq!(config.base_dir, PathBuf::from("/srv/apps"));
        assert_eq!(config.tunnel.tunnel_id, "abc-123");
        assert_eq!(config.hostname_for("demo"), "demo.example.dev");
        assert_eq!(config.port_range, 40000..=40010);
        assert_eq!(config.build_timeout, Duration::from_secs(30));
        assert_eq!(config.tunnel.reload_command, vec!["pm2", "restart", "tunnel"]);
        assert_eq!(
            config.project_dir(&ProjectName::from("demo")),
            PathBuf::from("/srv/apps/demo")
        );
    }

    #[test]
    fn empty_values_fall_back_to_defaults() {
        let config = Config::from_vars([("BASE_DIR", "  ")], &home()).expect("config");
        assert_eq!(config.base_dir, home().join(".skiff/projects"));
    }

    #[test]
    fn reload_command_splits_on_whitespace_only() {
        let config = Config::from_vars(
            [("SKIFF_TUNNEL_RELOAD_CMD", "cloudflared --config \"/etc/my tunnel.yml\"")],
            &home(),
        )
        .expect("config");
        assert_eq!(
            config.tunnel.reload_command,
            vec!["cloudflared", "--config", "\"/etc/my", "tunnel.yml\""]
        );
    }

    #[test]
    fn invalid_port_names_the_variable() {
        let err = Config::from_vars([("SKIFF_PORT_MAX", "90000")], &home()).unwrap_err();
        assert!(err.to_string().contains("SKIFF_PORT_MAX"), "got: {err}");
    }

    #[test]
    fn inverted_port_range_is_rejected() {
        let err = Config::from_vars(
            [("SKIFF_PORT_MIN", "50000"), ("SKIFF_PORT_MAX", "40000")],
            &home(),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: "SKIFF_PORT_MIN", .. }));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let err = Config::from_vars([("SKIFF_TOOL_TIMEOUT_SECS", "0")], &home()).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }
}
