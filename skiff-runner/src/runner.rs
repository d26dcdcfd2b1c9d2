//! The [`CommandRunner`] seam and its tokio-backed implementation.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tokio::time::timeout;

use crate::error::RunnerError;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// One external command: program, arguments, working directory and deadline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub timeout: Duration,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Build a spec from an argv vector (`argv[0]` is the program).
    pub fn from_argv(argv: &[String]) -> Result<Self, RunnerError> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| RunnerError::InvalidCommand("empty argv".to_string()))?;
        Ok(Self::new(program.clone()).args(args.iter().cloned()))
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.cwd = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Captured result of a finished command.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandOutput {
    /// `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// A successful run that printed `stdout`.
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            exit_code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// A failed run with the given exit code and stderr.
    pub fn failed(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            exit_code: Some(exit_code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Runs external commands. Non-zero exits are reported in [`CommandOutput`],
/// not as errors; see [`run_checked`].
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, RunnerError>;
}

/// Run `spec` and turn a non-zero exit into [`RunnerError::Failed`].
pub async fn run_checked(
    runner: &dyn CommandRunner,
    spec: &CommandSpec,
) -> Result<CommandOutput, RunnerError> {
    let output = runner.run(spec).await?;
    if output.success() {
        return Ok(output);
    }
    Err(RunnerError::Failed {
        command: spec.to_string(),
        exit_code: output.exit_code,
        stderr: output.stderr.trim().to_string(),
    })
}

/// Spawns real child processes via `tokio::process`.
///
/// stdin is closed; stdout and stderr are captured. A child that outlives its
/// deadline is killed (`kill_on_drop`) and [`RunnerError::Timeout`] returned.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessRunner;

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, RunnerError> {
        let mut command = Command::new(&spec.program);
        command
            .args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(cwd) = &spec.cwd {
            command.current_dir(cwd);
        }

        tracing::debug!(command = %spec, cwd = ?spec.cwd, "spawning external tool");
        let child = command.spawn().map_err(|source| RunnerError::Spawn {
            command: spec.to_string(),
            source,
        })?;

        let output = match timeout(spec.timeout, child.wait_with_output()).await {
            Ok(result) => result.map_err(|source| RunnerError::Spawn {
                command: spec.to_string(),
                source,
            })?,
            Err(_) => {
                tracing::warn!(command = %spec, timeout_secs = spec.timeout.as_secs(), "external tool timed out");
                return Err(RunnerError::Timeout {
                    command: spec.to_string(),
                    timeout: spec.timeout,
                });
            }
        };

        let output = CommandOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };
        tracing::debug!(command = %spec, exit_code = ?output.exit_code, "external tool finished");
        Ok(output)
    }
}
