pub mod daemon;
pub mod env;
pub mod project;
pub mod projects;

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use serde_json::Value;

use skiff_daemon::{request, DaemonError, DaemonRequest};

pub fn home() -> Result<PathBuf> {
    dirs::home_dir().context("could not determine home directory")
}

/// Send one request to the daemon and return its `data`.
pub fn send(req: DaemonRequest) -> Result<Value> {
    let home = home()?;
    let cmd = req.name();
    match request(&home, &req) {
        Ok(data) => Ok(data),
        Err(DaemonError::DaemonNotRunning { socket }) => bail!(
            "daemon is not running (no socket at {}); start it with `skiff daemon start`",
            socket.display()
        ),
        Err(err) => Err(err).with_context(|| format!("`{cmd}` failed")),
    }
}

/// Print the `message` field of a response, if any.
pub fn print_message(data: &Value) {
    if let Some(message) = data.get("message").and_then(Value::as_str) {
        println!("{message}");
    }
}
