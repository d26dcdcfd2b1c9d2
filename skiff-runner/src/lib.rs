//! # skiff-runner
//!
//! The narrow seam between Skiff and the external CLIs it drives.
//!
//! [`CommandRunner`] runs one [`CommandSpec`] with an explicit deadline and
//! reports `{exit code, stdout, stderr}`. [`ProcessRunner`] is the real
//! implementation; [`Toolchain`] wraps the git / npm / pm2 / cloudflared
//! invocations the orchestrator needs.

pub mod error;
pub mod runner;
#[cfg(feature = "test-support")]
pub mod scripted;
pub mod tools;

pub use error::RunnerError;
pub use runner::{run_checked, CommandOutput, CommandRunner, CommandSpec, ProcessRunner};
#[cfg(feature = "test-support")]
pub use scripted::ScriptedRunner;
pub use tools::{parse_remote_branches, Toolchain, START_SCRIPT};
