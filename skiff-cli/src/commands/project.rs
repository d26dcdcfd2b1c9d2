//! Per-project subcommands: `init`, `branches`, `pull`, `build`, `deploy`,
//! `publish`.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde_json::Value;

use skiff_core::ProjectName;
use skiff_daemon::DaemonRequest;
use skiff_deploy::{Deployment, Publication, DEFAULT_BRANCH};

use super::{print_message, send};

/// Register a project and clone its repository.
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Project name; also the checkout directory under BASE_DIR.
    pub name: String,

    /// Repository to clone.
    pub github_url: String,

    /// Public subdomain (published at `<subdomain>.<domain suffix>`).
    pub subdomain: String,

    #[arg(long, short = 'd')]
    pub description: Option<String>,
}

impl InitArgs {
    pub fn run(self) -> Result<()> {
        let name = self.name.clone();
        let data = send(DaemonRequest::Init {
            project_name: ProjectName::from(self.name),
            github_url: self.github_url,
            subdomain: self.subdomain,
            description: self.description,
        })
        .with_context(|| format!("failed to initialize '{name}'"))?;
        print_message(&data);
        Ok(())
    }
}

#[derive(Args, Debug)]
pub struct ProjectArgs {
    /// Registered project name.
    pub name: String,
}

#[derive(Args, Debug)]
pub struct BranchArgs {
    /// Registered project name.
    pub name: String,

    #[arg(long, short = 'b', default_value = DEFAULT_BRANCH)]
    pub branch: String,
}

pub fn branches(args: ProjectArgs) -> Result<()> {
    let data = send(DaemonRequest::ListBranches {
        project_name: ProjectName::from(args.name),
    })?;
    let branches: Vec<String> =
        serde_json::from_value(data).context("unexpected branch list from daemon")?;
    for branch in branches {
        println!("{branch}");
    }
    Ok(())
}

pub fn pull(args: BranchArgs) -> Result<()> {
    let data = send(DaemonRequest::PullLatest {
        project_name: ProjectName::from(args.name),
        branch: args.branch,
    })?;
    print_message(&data);
    Ok(())
}

pub fn build(args: BranchArgs) -> Result<()> {
    let data = send(DaemonRequest::BuildApp {
        project_name: ProjectName::from(args.name),
        branch: args.branch,
    })?;
    print_message(&data);
    Ok(())
}

pub fn deploy(args: ProjectArgs) -> Result<()> {
    let data = send(DaemonRequest::Deploy {
        project_name: ProjectName::from(args.name),
    })?;
    let deployment: Deployment =
        serde_json::from_value(data).context("unexpected deploy result from daemon")?;
    println!("✓ {}", deployment.message);
    Ok(())
}

pub fn publish(args: ProjectArgs) -> Result<()> {
    let name = args.name.clone();
    let data: Value = send(DaemonRequest::Publish {
        project_name: ProjectName::from(args.name),
    })?;
    let publication: Publication =
        serde_json::from_value(data).context("unexpected publish result from daemon")?;
    println!(
        "✓ Published {name} at {} (port {})",
        publication.domain.bold(),
        publication.port
    );
    if !publication.reloaded {
        println!(
            "{}",
            "  tunnel reload failed; restart cloudflared to pick up the new route".yellow()
        );
    }
    Ok(())
}
