use std::fs;
use std::io::ErrorKind;
use std::os::unix::net::UnixStream as StdUnixStream;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::unix::OwnedWriteHalf;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::broadcast;

use skiff_core::{Config, NewProject, YamlStore};
use skiff_deploy::Orchestrator;
use skiff_runner::ProcessRunner;

use crate::error::{io_err, DaemonError};
use crate::paths::{skiff_root, socket_path};
use crate::protocol::{DaemonRequest, DaemonResponse, STATUS_BAD_REQUEST};

/// Start the daemon runtime and block the current thread until it exits.
pub fn start_blocking(home: &Path, config: Config) -> Result<(), DaemonError> {
    init_tracing();
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    runtime.block_on(run(home.to_path_buf(), config))
}

/// Build the production orchestrator (YAML registry, real processes) and
/// serve it until `stop` or ctrl-c.
pub async fn run(home: PathBuf, config: Config) -> Result<(), DaemonError> {
    tracing::info!(
        registry = %config.registry_dir.display(),
        base_dir = %config.base_dir.display(),
        ingress = %config.tunnel.config_path.display(),
        ports = ?config.port_range,
        "starting skiff daemon",
    );
    let store = Arc::new(YamlStore::new(config.registry_dir.clone()));
    let orchestrator = Orchestrator::new(Arc::new(config), store, Arc::new(ProcessRunner))?;
    serve(home, Arc::new(orchestrator)).await
}

/// Serve `orchestrator` on `~/.skiff/skiff.sock` until shutdown.
pub async fn serve(home: PathBuf, orchestrator: Arc<Orchestrator>) -> Result<(), DaemonError> {
    ensure_runtime_dirs(&home)?;
    let started_at_unix = unix_seconds_now();
    let (shutdown_tx, _) = broadcast::channel::<()>(16);

    // Bind before spawning so a second daemon fails fast.
    let socket = socket_path(&home);
    prepare_socket_for_bind(&socket)?;
    let listener = UnixListener::bind(&socket).map_err(|e| io_err(&socket, e))?;
    set_socket_permissions(&socket)?;
    tracing::info!(socket = %socket.display(), "listening");

    let socket_handle = {
        let shutdown = shutdown_tx.clone();
        tokio::spawn(async move {
            let result = socket_server_task(
                listener,
                socket,
                orchestrator,
                shutdown.clone(),
                shutdown.subscribe(),
                started_at_unix,
            )
            .await;
            let _ = shutdown.send(());
            result
        })
    };

    let signal_handle = {
        let shutdown = shutdown_tx.clone();
        tokio::spawn(async move {
            let mut shutdown_rx = shutdown.subscribe();
            tokio::select! {
                _ = shutdown_rx.recv() => Ok(()),
                signal = tokio::signal::ctrl_c() => {
                    match signal {
                        Ok(()) => {
                            tracing::info!("received ctrl-c, shutting down daemon");
                            let _ = shutdown.send(());
                            Ok(())
                        }
                        Err(err) => Err(DaemonError::Protocol(format!("ctrl-c handler failed: {err}"))),
                    }
                }
            }
        })
    };

    let (socket_result, signal_result) = tokio::join!(socket_handle, signal_handle);
    handle_join("socket_server", socket_result)?;
    handle_join("signal_handler", signal_result)?;
    tracing::info!("daemon stopped");
    Ok(())
}

async fn socket_server_task(
    listener: UnixListener,
    socket: PathBuf,
    orchestrator: Arc<Orchestrator>,
    shutdown_tx: broadcast::Sender<()>,
    mut shutdown_rx: broadcast::Receiver<()>,
    started_at_unix: u64,
) -> Result<(), DaemonError> {
    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            accepted = listener.accept() => {
                let (stream, _) = accepted.map_err(|e| io_err(&socket, e))?;
                let orchestrator = orchestrator.clone();
                let shutdown_tx = shutdown_tx.clone();
                tokio::spawn(async move {
                    if let Err(err) = handle_socket_client(
                        stream,
                        orchestrator,
                        shutdown_tx,
                        started_at_unix,
                    ).await {
                        tracing::error!(error = %err, "socket client error");
                    }
                });
            }
        }
    }

    if socket.exists() {
        let _ = fs::remove_file(&socket);
    }
    Ok(())
}

async fn handle_socket_client(
    stream: UnixStream,
    orchestrator: Arc<Orchestrator>,
    shutdown_tx: broadcast::Sender<()>,
    started_at_unix: u64,
) -> Result<(), DaemonError> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    while let Some(line) = lines
        .next_line()
        .await
        .map_err(|e| io_err("daemon socket read", e))?
    {
        if line.trim().is_empty() {
            continue;
        }

        let request = match serde_json::from_str::<DaemonRequest>(&line) {
            Ok(request) => request,
            Err(err) => {
                write_response(
                    &mut writer,
                    &DaemonResponse::error(STATUS_BAD_REQUEST, format!("invalid request: {err}")),
                )
                .await?;
                continue;
            }
        };

        let stop = matches!(request, DaemonRequest::Stop);
        let response = dispatch(&orchestrator, request, &shutdown_tx, started_at_unix).await;
        write_response(&mut writer, &response).await?;
        if stop {
            break;
        }
    }

    Ok(())
}

/// Run one request against the orchestrator.
pub(crate) async fn dispatch(
    orchestrator: &Orchestrator,
    request: DaemonRequest,
    shutdown_tx: &broadcast::Sender<()>,
    started_at_unix: u64,
) -> DaemonResponse {
    let cmd = request.name();
    let project = request.project().map(ToString::to_string);
    tracing::info!(cmd, project = project.as_deref().unwrap_or("-"), "request");

    let result = match request {
        DaemonRequest::Init {
            project_name,
            github_url,
            subdomain,
            description,
        } => orchestrator
            .init(NewProject {
                project_name,
                github_url,
                subdomain,
                description,
            })
            .await
            .map(|record| json!({ "message": "Initialization successful", "project": record })),
        DaemonRequest::ListBranches { project_name } => orchestrator
            .list_branches(&project_name)
            .await
            .map(|branches| json!(branches)),
        DaemonRequest::PullLatest {
            project_name,
            branch,
        } => orchestrator
            .pull_latest(&project_name, &branch)
            .await
            .map(|message| json!({ "message": message })),
        DaemonRequest::BuildApp {
            project_name,
            branch,
        } => orchestrator
            .build_app(&project_name, &branch)
            .await
            .map(|message| json!({ "message": message })),
        DaemonRequest::SetEnvVars {
            project_name,
            env_vars,
        } => orchestrator
            .set_env_vars(&project_name, &env_vars)
            .await
            .map(|message| json!({ "message": message })),
        DaemonRequest::GetEnvVars { project_name } => orchestrator
            .get_env_vars(&project_name)
            .await
            .map(|vars| json!(vars)),
        DaemonRequest::Deploy { project_name } => orchestrator
            .deploy(&project_name)
            .await
            .map(|deployment| json!(deployment)),
        DaemonRequest::Publish { project_name } => orchestrator
            .publish(&project_name)
            .await
            .map(|publication| json!(publication)),
        DaemonRequest::Projects => orchestrator.projects().map(|records| json!(records)),
        DaemonRequest::Status => {
            return DaemonResponse::ok(build_status_payload(orchestrator, started_at_unix));
        }
        DaemonRequest::Stop => {
            let _ = shutdown_tx.send(());
            return DaemonResponse::ok(json!({ "stopping": true }));
        }
    };

    match result {
        Ok(data) => DaemonResponse::ok(data),
        Err(err) => {
            tracing::warn!(cmd, project = project.as_deref().unwrap_or("-"), error = %err, "request failed");
            DaemonResponse::from_deploy_error(&err)
        }
    }
}

fn build_status_payload(orchestrator: &Orchestrator, started_at_unix: u64) -> Value {
    let config = orchestrator.config();
    let projects = match orchestrator.projects() {
        Ok(records) => json!(records.len()),
        Err(err) => {
            tracing::warn!(error = %err, "failed to count projects for status");
            Value::Null
        }
    };
    json!({
        "running": true,
        "pid": std::process::id(),
        "started_at_unix": started_at_unix,
        "projects": projects,
        "registry_dir": config.registry_dir,
        "base_dir": config.base_dir,
        "ingress_config": config.tunnel.config_path,
    })
}

fn prepare_socket_for_bind(socket: &Path) -> Result<(), DaemonError> {
    if !socket.exists() {
        return Ok(());
    }

    match StdUnixStream::connect(socket) {
        Ok(_) => {
            return Err(DaemonError::Protocol(format!(
                "daemon socket already in use: {}",
                socket.display()
            )));
        }
        Err(err) => {
            tracing::warn!(
                socket = %socket.display(),
                error = %err,
                "removing stale daemon socket before bind",
            );
        }
    }

    match fs::remove_file(socket) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(io_err(socket, err)),
    }
}

fn ensure_runtime_dirs(home: &Path) -> Result<(), DaemonError> {
    let root = skiff_root(home);
    if !root.exists() {
        fs::create_dir_all(&root).map_err(|e| io_err(&root, e))?;
        set_dir_permissions(&root)?;
    }
    Ok(())
}

async fn write_response(
    writer: &mut OwnedWriteHalf,
    response: &DaemonResponse,
) -> Result<(), DaemonError> {
    let payload = serde_json::to_string(response)?;
    writer
        .write_all(payload.as_bytes())
        .await
        .map_err(|e| io_err("daemon socket write", e))?;
    writer
        .write_all(b"\n")
        .await
        .map_err(|e| io_err("daemon socket write", e))?;
    writer
        .flush()
        .await
        .map_err(|e| io_err("daemon socket flush", e))?;
    Ok(())
}

fn handle_join(
    task: &str,
    result: Result<Result<(), DaemonError>, tokio::task::JoinError>,
) -> Result<(), DaemonError> {
    match result {
        Ok(inner) => inner,
        Err(err) => Err(DaemonError::Protocol(format!(
            "{task} task join failure: {err}"
        ))),
    }
}

fn unix_seconds_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Install the `tracing` subscriber (`RUST_LOG`, default `info`).
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}

#[cfg(unix)]
fn set_socket_permissions(path: &Path) -> Result<(), DaemonError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600)).map_err(|e| io_err(path, e))
}

#[cfg(unix)]
fn set_dir_permissions(path: &Path) -> Result<(), DaemonError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o700)).map_err(|e| io_err(path, e))
}
