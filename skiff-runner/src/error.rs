use std::time::Duration;

use thiserror::Error;

/// Failures of an external tool invocation.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// The program could not be started at all (missing binary, bad cwd, ...).
    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// The program ran but exited unsuccessfully.
    #[error("`{command}` failed ({}): {stderr}", exit_label(.exit_code))]
    Failed {
        command: String,
        exit_code: Option<i32>,
        stderr: String,
    },

    /// The program exceeded its deadline and was killed.
    #[error("`{command}` timed out after {}s", .timeout.as_secs())]
    Timeout { command: String, timeout: Duration },

    /// A command line was empty or otherwise unusable.
    #[error("invalid command: {0}")]
    InvalidCommand(String),
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {code}"),
        None => "terminated by signal".to_string(),
    }
}
