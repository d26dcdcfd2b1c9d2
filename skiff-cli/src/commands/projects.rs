//! `skiff projects`: registered projects as a table or JSON.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use skiff_core::ProjectRecord;
use skiff_daemon::DaemonRequest;

use super::send;

#[derive(Args, Debug)]
pub struct ProjectsArgs {
    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Tabled)]
struct ProjectRow {
    #[tabled(rename = "project")]
    name: String,
    #[tabled(rename = "subdomain")]
    subdomain: String,
    #[tabled(rename = "port")]
    port: String,
    #[tabled(rename = "repository")]
    github_url: String,
    #[tabled(rename = "registered")]
    created: String,
}

impl ProjectsArgs {
    pub fn run(self) -> Result<()> {
        let data = send(DaemonRequest::Projects)?;
        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&data).context("failed to render projects JSON")?
            );
            return Ok(());
        }

        let records: Vec<ProjectRecord> =
            serde_json::from_value(data).context("unexpected project list from daemon")?;
        print_table(records);
        Ok(())
    }
}

fn print_table(records: Vec<ProjectRecord>) {
    if records.is_empty() {
        println!("No projects registered.");
        println!("Run: skiff init <name> <github-url> <subdomain>");
        return;
    }

    let rows: Vec<ProjectRow> = records
        .into_iter()
        .map(|record| ProjectRow {
            name: record.project_name.0,
            subdomain: record.subdomain,
            port: record
                .port
                .map(|p| p.to_string())
                .unwrap_or_else(|| "-".dimmed().to_string()),
            github_url: record.github_url,
            created: record.created_at.format("%Y-%m-%d %H:%M").to_string(),
        })
        .collect();

    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
}
