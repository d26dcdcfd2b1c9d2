//! `skiff daemon`: run the daemon in the foreground or talk to a running one.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Subcommand;
use serde_json::Value;

use skiff_core::Config;
use skiff_daemon::paths::socket_path;
use skiff_daemon::{request_status, request_stop, start_blocking, DaemonError};

use super::home;

#[derive(Subcommand, Debug)]
pub enum DaemonCommand {
    /// Run the daemon in the foreground.
    Start,
    /// Ask a running daemon to shut down.
    Stop,
    /// Print daemon runtime status as JSON.
    Status,
}

pub fn run(command: DaemonCommand) -> Result<()> {
    let home = home()?;

    match command {
        DaemonCommand::Start => {
            let config = Config::from_env().context("invalid configuration")?;
            start_blocking(&home, config).context("daemon exited with error")?;
        }
        DaemonCommand::Stop => match request_stop(&home) {
            Ok(()) => println!("daemon stop requested"),
            Err(DaemonError::DaemonNotRunning { .. }) => {
                println!("daemon is not running");
            }
            Err(err) => return Err(err).context("failed to stop daemon"),
        },
        DaemonCommand::Status => {
            let status = match request_status(&home) {
                Ok(status) => with_started_at(status),
                Err(DaemonError::DaemonNotRunning { .. }) => serde_json::json!({
                    "running": false,
                    "socket": socket_path(&home).display().to_string(),
                }),
                Err(err) => return Err(err).context("failed to query daemon status"),
            };
            println!(
                "{}",
                serde_json::to_string_pretty(&status)
                    .context("failed to render daemon status JSON")?
            );
        }
    }

    Ok(())
}

/// Add an RFC 3339 `started_at` next to the daemon's unix timestamp.
fn with_started_at(mut status: Value) -> Value {
    let started = status
        .get("started_at_unix")
        .and_then(Value::as_i64)
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0));
    if let (Some(started), Some(object)) = (started, status.as_object_mut()) {
        object.insert("started_at".to_string(), Value::String(started.to_rfc3339()));
    }
    status
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn started_at_is_rendered_from_unix_seconds() {
        let status = with_started_at(json!({"running": true, "started_at_unix": 0}));
        assert_eq!(status["started_at"], "1970-01-01T00:00:00+00:00");
    }

    #[test]
    fn status_without_timestamp_is_unchanged() {
        let status = with_started_at(json!({"running": false}));
        assert!(status.get("started_at").is_none());
    }
}
