//! `skiff env set|get`

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};

use skiff_core::ProjectName;
use skiff_daemon::DaemonRequest;
use skiff_deploy::EnvVar;

use super::{print_message, send};

#[derive(Subcommand, Debug)]
pub enum EnvCommand {
    /// Replace the project's .env with the given pairs.
    Set(SetArgs),
    /// Print the project's .env.
    Get(GetArgs),
}

#[derive(Args, Debug)]
pub struct SetArgs {
    pub name: String,

    /// `KEY=VALUE` pairs; a repeated key keeps its last value.
    #[arg(value_name = "KEY=VALUE", required = true, value_parser = parse_pair)]
    pub vars: Vec<EnvVar>,
}

#[derive(Args, Debug)]
pub struct GetArgs {
    pub name: String,

    /// Emit a JSON object instead of KEY=VALUE lines.
    #[arg(long)]
    pub json: bool,
}

fn parse_pair(raw: &str) -> std::result::Result<EnvVar, String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok(EnvVar::new(key, value)),
        _ => Err(format!("expected KEY=VALUE, got '{raw}'")),
    }
}

pub fn run(command: EnvCommand) -> Result<()> {
    match command {
        EnvCommand::Set(args) => {
            let data = send(DaemonRequest::SetEnvVars {
                project_name: ProjectName::from(args.name),
                env_vars: args.vars,
            })?;
            print_message(&data);
        }
        EnvCommand::Get(args) => {
            let data = send(DaemonRequest::GetEnvVars {
                project_name: ProjectName::from(args.name),
            })?;
            if args.json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&data).context("failed to render env JSON")?
                );
                return Ok(());
            }
            let vars: BTreeMap<String, String> =
                serde_json::from_value(data).context("unexpected env payload from daemon")?;
            for (key, value) in vars {
                println!("{key}={value}");
            }
        }
    }
    Ok(())
}
