//! Newline-delimited JSON over the daemon's Unix socket.
//!
//! One request object per line, tagged by `cmd`; one response object per
//! line in reply:
//!
//! ```text
//! → {"cmd":"deploy","project_name":"demo"}
//! ← {"ok":true,"status":200,"data":{"message":"Deployed demo with PM2 on port 31337","port":31337}}
//! ```

use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::UnixStream;
use std::path::Path;
use std::thread::sleep;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use skiff_core::ProjectName;
use skiff_deploy::{DeployError, EnvVar, DEFAULT_BRANCH};

use crate::error::{io_err, DaemonError};
use crate::paths::socket_path;

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum DaemonRequest {
    Init {
        project_name: ProjectName,
        github_url: String,
        subdomain: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },
    ListBranches {
        project_name: ProjectName,
    },
    PullLatest {
        project_name: ProjectName,
        #[serde(default = "default_branch")]
        branch: String,
    },
    BuildApp {
        project_name: ProjectName,
        #[serde(default = "default_branch")]
        branch: String,
    },
    SetEnvVars {
        project_name: ProjectName,
        env_vars: Vec<EnvVar>,
    },
    GetEnvVars {
        project_name: ProjectName,
    },
    Deploy {
        project_name: ProjectName,
    },
    Publish {
        project_name: ProjectName,
    },
    Projects,
    Status,
    Stop,
}

fn default_branch() -> String {
    DEFAULT_BRANCH.to_string()
}

impl DaemonRequest {
    /// Wire name of the command, for logs.
    pub fn name(&self) -> &'static str {
        match self {
            DaemonRequest::Init { .. } => "init",
            DaemonRequest::ListBranches { .. } => "list_branches",
            DaemonRequest::PullLatest { .. } => "pull_latest",
            DaemonRequest::BuildApp { .. } => "build_app",
            DaemonRequest::SetEnvVars { .. } => "set_env_vars",
            DaemonRequest::GetEnvVars { .. } => "get_env_vars",
            DaemonRequest::Deploy { .. } => "deploy",
            DaemonRequest::Publish { .. } => "publish",
            DaemonRequest::Projects => "projects",
            DaemonRequest::Status => "status",
            DaemonRequest::Stop => "stop",
        }
    }

    pub fn project(&self) -> Option<&ProjectName> {
        match self {
            DaemonRequest::Init { project_name, .. }
            | DaemonRequest::ListBranches { project_name }
            | DaemonRequest::PullLatest { project_name, .. }
            | DaemonRequest::BuildApp { project_name, .. }
            | DaemonRequest::SetEnvVars { project_name, .. }
            | DaemonRequest::GetEnvVars { project_name }
            | DaemonRequest::Deploy { project_name }
            | DaemonRequest::Publish { project_name } => Some(project_name),
            DaemonRequest::Projects | DaemonRequest::Status | DaemonRequest::Stop => None,
        }
    }
}

pub const STATUS_OK: u16 = 200;
pub const STATUS_BAD_REQUEST: u16 = 400;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DaemonResponse {
    pub ok: bool,
    pub status: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DaemonResponse {
    pub fn ok(data: Value) -> Self {
        Self {
            ok: true,
            status: STATUS_OK,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(status: u16, message: impl Into<String>) -> Self {
        Self {
            ok: false,
            status,
            data: None,
            error: Some(message.into()),
        }
    }

    pub fn from_deploy_error(err: &DeployError) -> Self {
        Self::error(status_for(err), err.to_string())
    }
}

/// HTTP-style status code reported for an orchestrator failure.
pub fn status_for(err: &DeployError) -> u16 {
    match err {
        DeployError::DuplicateProject { .. } | DeployError::InvalidRequest(_) => 400,
        DeployError::ProjectNotFound(_) => 404,
        DeployError::MissingConfiguration { .. } => 409,
        DeployError::ExternalToolFailure(_) => 502,
        DeployError::AllocationExhausted { .. } => 503,
        DeployError::ExternalToolTimeout { .. } => 504,
        DeployError::Registry(_)
        | DeployError::Ingress(_)
        | DeployError::Render(_)
        | DeployError::Io { .. } => 500,
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Send one JSON request to the daemon socket and return one response.
pub fn send_request(home: &Path, request: &DaemonRequest) -> Result<DaemonResponse, DaemonError> {
    let socket = socket_path(home);
    if !socket.exists() {
        return Err(DaemonError::DaemonNotRunning { socket });
    }

    let mut stream = UnixStream::connect(&socket).map_err(|err| {
        if matches!(
            err.kind(),
            std::io::ErrorKind::NotFound
                | std::io::ErrorKind::ConnectionRefused
                | std::io::ErrorKind::ConnectionReset
        ) {
            DaemonError::DaemonNotRunning {
                socket: socket.clone(),
            }
        } else {
            io_err(&socket, err)
        }
    })?;

    let payload = serde_json::to_string(request)?;
    stream
        .write_all(payload.as_bytes())
        .map_err(|e| io_err(&socket, e))?;
    stream.write_all(b"\n").map_err(|e| io_err(&socket, e))?;
    stream.flush().map_err(|e| io_err(&socket, e))?;

    let mut reader = BufReader::new(stream);
    let mut line = String::new();
    let read = reader
        .read_line(&mut line)
        .map_err(|e| io_err(&socket, e))?;
    if read == 0 {
        return Err(DaemonError::Protocol(
            "daemon closed connection before responding".to_string(),
        ));
    }

    let response: DaemonResponse = serde_json::from_str(line.trim_end())?;
    Ok(response)
}

/// Send `request` and unwrap the response's `data`, turning `ok: false`
/// into [`DaemonError::Rejected`].
pub fn request(home: &Path, request: &DaemonRequest) -> Result<Value, DaemonError> {
    response_into_data(send_request(home, request)?)
}

/// `status`, retried briefly so it can follow a fresh `daemon start`.
pub fn request_status(home: &Path) -> Result<Value, DaemonError> {
    let mut last_not_running: Option<DaemonError> = None;
    for attempt in 0..5 {
        match request(home, &DaemonRequest::Status) {
            Ok(data) => return Ok(data),
            Err(err @ DaemonError::DaemonNotRunning { .. }) => {
                last_not_running = Some(err);
                if attempt < 4 {
                    sleep(Duration::from_millis(100));
                    continue;
                }
            }
            Err(err) => return Err(err),
        }
    }

    Err(last_not_running.unwrap_or_else(|| {
        DaemonError::Protocol("daemon status retry loop exited unexpectedly".to_string())
    }))
}

pub fn request_stop(home: &Path) -> Result<(), DaemonError> {
    request(home, &DaemonRequest::Stop).map(|_| ())
}

fn response_into_data(response: DaemonResponse) -> Result<Value, DaemonError> {
    if response.ok {
        Ok(response.data.unwrap_or(Value::Null))
    } else {
        Err(DaemonError::Rejected {
            status: response.status,
            message: response
                .error
                .unwrap_or_else(|| "unknown daemon error".to_string()),
        })
    }
}
