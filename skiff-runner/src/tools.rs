//! Thin wrappers over the external CLIs Skiff drives: git, npm, pm2 and
//! cloudflared. Every method is one (or two) [`CommandSpec`]s; none of them
//! interpret tool output beyond what the caller needs.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::error::RunnerError;
use crate::runner::{run_checked, CommandOutput, CommandRunner, CommandSpec};

/// Launcher file pm2 is pointed at, relative to the project directory.
pub const START_SCRIPT: &str = "start.js";

/// External tool façade shared by every orchestrator operation.
#[derive(Clone)]
pub struct Toolchain {
    runner: Arc<dyn CommandRunner>,
    tool_timeout: Duration,
    build_timeout: Duration,
}

impl Toolchain {
    pub fn new(runner: Arc<dyn CommandRunner>, tool_timeout: Duration, build_timeout: Duration) -> Self {
        Self {
            runner,
            tool_timeout,
            build_timeout,
        }
    }

    async fn checked(&self, spec: CommandSpec) -> Result<CommandOutput, RunnerError> {
        run_checked(self.runner.as_ref(), &spec).await
    }

    // -- git ----------------------------------------------------------------

    /// `git clone -- <url> <dest>`; `dest` may already exist as an empty directory.
    pub async fn git_clone(&self, url: &str, dest: &Path) -> Result<(), RunnerError> {
        self.checked(
            CommandSpec::new("git")
                .arg("clone")
                .arg("--")
                .arg(url)
                .arg(dest.display().to_string())
                .timeout(self.build_timeout),
        )
        .await
        .map(drop)
    }

    /// Remote branch names of the checkout at `dir`.
    pub async fn git_remote_branches(&self, dir: &Path) -> Result<Vec<String>, RunnerError> {
        let dir = dir.display().to_string();
        let output = self
            .checked(
                CommandSpec::new("git")
                    .args(["-C", dir.as_str(), "branch", "-r"])
                    .timeout(self.tool_timeout),
            )
            .await?;
        Ok(parse_remote_branches(&output.stdout))
    }

    /// `git checkout <branch>` followed by `git pull origin <branch>`.
    pub async fn git_pull(&self, dir: &Path, branch: &str) -> Result<(), RunnerError> {
        let dir = dir.display().to_string();
        self.checked(
            CommandSpec::new("git")
                .args(["-C", dir.as_str(), "checkout", branch])
                .timeout(self.tool_timeout),
        )
        .await?;
        self.checked(
            CommandSpec::new("git")
                .args(["-C", dir.as_str(), "pull", "origin", branch])
                .timeout(self.build_timeout),
        )
        .await
        .map(drop)
    }

    // -- npm ----------------------------------------------------------------

    /// `npm install` then `npm run build` inside `dir`.
    pub async fn npm_build(&self, dir: &Path) -> Result<(), RunnerError> {
        self.checked(
            CommandSpec::new("npm")
                .arg("install")
                .current_dir(dir)
                .timeout(self.build_timeout),
        )
        .await?;
        tracing::info!(dir = %dir.display(), "dependencies installed, running build");
        self.checked(
            CommandSpec::new("npm")
                .args(["run", "build"])
                .current_dir(dir)
                .timeout(self.build_timeout),
        )
        .await
        .map(drop)
    }

    // -- pm2 ----------------------------------------------------------------

    /// `pm2 delete <name>`. Returns whether an entry was removed; a missing
    /// entry is not an error.
    pub async fn pm2_delete(&self, name: &str, dir: &Path) -> Result<bool, RunnerError> {
        let spec = CommandSpec::new("pm2")
            .args(["delete", name])
            .current_dir(dir)
            .timeout(self.tool_timeout);
        let output = self.runner.run(&spec).await?;
        Ok(output.success())
    }

    /// `pm2 start start.js --name <name>` inside `dir`.
    pub async fn pm2_start(&self, name: &str, dir: &Path) -> Result<(), RunnerError> {
        self.checked(
            CommandSpec::new("pm2")
                .args(["start", START_SCRIPT, "--name", name])
                .current_dir(dir)
                .timeout(self.tool_timeout),
        )
        .await
        .map(drop)
    }

    /// `pm2 save`: persist the process list across reboots.
    pub async fn pm2_save(&self) -> Result<(), RunnerError> {
        self.checked(CommandSpec::new("pm2").arg("save").timeout(self.tool_timeout))
            .await
            .map(drop)
    }

    // -- cloudflared --------------------------------------------------------

    /// `cloudflared tunnel route dns <tunnel> <hostname>`.
    pub async fn route_dns(&self, tunnel: &str, hostname: &str) -> Result<(), RunnerError> {
        self.checked(
            CommandSpec::new("cloudflared")
                .args(["tunnel", "route", "dns", tunnel, hostname])
                .timeout(self.tool_timeout),
        )
        .await
        .map(drop)
    }

    /// Run the configured reload command so the tunnel re-reads its config.
    pub async fn reload_tunnel(&self, argv: &[String]) -> Result<(), RunnerError> {
        let spec = CommandSpec::from_argv(argv)?.timeout(self.tool_timeout);
        self.checked(spec).await.map(drop)
    }
}

/// Parse `git branch -r` output: trim, drop symbolic refs (`origin/HEAD -> ...`),
/// strip the `origin/` prefix.
pub fn parse_remote_branches(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.contains("->"))
        .map(|line| line.strip_prefix("origin/").unwrap_or(line).to_string())
        .collect()
}
