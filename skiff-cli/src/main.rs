//! Skiff: deploy Node web apps behind a Cloudflare tunnel.
//!
//! # Usage
//!
//! ```text
//! skiff daemon start|stop|status
//! skiff init <name> <github-url> <subdomain> [--description <text>]
//! skiff branches <name>
//! skiff pull <name> [--branch <branch>]
//! skiff build <name> [--branch <branch>]
//! skiff env set <name> KEY=VALUE...
//! skiff env get <name> [--json]
//! skiff deploy <name>
//! skiff publish <name>
//! skiff projects [--json]
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{
    daemon::DaemonCommand,
    env::EnvCommand,
    project::{BranchArgs, InitArgs, ProjectArgs},
    projects::ProjectsArgs,
};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "skiff",
    version,
    about = "Clone, build, run and publish web apps through a tunnel",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run or control the Skiff daemon.
    Daemon {
        #[command(subcommand)]
        command: DaemonCommand,
    },

    /// Register a project and clone its repository.
    Init(InitArgs),

    /// List remote branches of a project.
    Branches(ProjectArgs),

    /// Check out a branch and pull the latest changes.
    Pull(BranchArgs),

    /// Install dependencies and build a project.
    Build(BranchArgs),

    /// Read or replace a project's .env file.
    Env {
        #[command(subcommand)]
        command: EnvCommand,
    },

    /// Start (or restart) a project under pm2 on its assigned port.
    Deploy(ProjectArgs),

    /// Route the project's subdomain through the tunnel.
    Publish(ProjectArgs),

    /// List registered projects.
    Projects(ProjectsArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Daemon { command } => commands::daemon::run(command),
        Commands::Init(args) => args.run(),
        Commands::Branches(args) => commands::project::branches(args),
        Commands::Pull(args) => commands::project::pull(args),
        Commands::Build(args) => commands::project::build(args),
        Commands::Env { command } => commands::env::run(command),
        Commands::Deploy(args) => commands::project::deploy(args),
        Commands::Publish(args) => commands::project::publish(args),
        Commands::Projects(args) => args.run(),
    }
}
