//! `pathsync jobs list` and `pathsync jobs history <path>`

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use pathsync_core::{JobRecord, JobState};

use super::ConnectionArgs;

#[derive(Subcommand, Debug)]
pub enum JobsCommand {
    /// Latest job per working directory.
    List {
        /// Lookback window in days (default: configured lookback).
        #[arg(long)]
        days: Option<u32>,

        /// Include directories whose latest job was cancelled.
        #[arg(long)]
        all: bool,

        #[arg(long)]
        json: bool,
    },

    /// Every job submitted from one directory, oldest first.
    History {
        path: PathBuf,

        #[arg(long)]
        days: Option<u32>,

        #[arg(long)]
        json: bool,
    },
}

#[derive(Tabled)]
struct JobRow {
    #[tabled(rename = "workdir")]
    workdir: String,
    #[tabled(rename = "name")]
    name: String,
    #[tabled(rename = "job id")]
    job_id: String,
    #[tabled(rename = "state")]
    state: String,
    #[tabled(rename = "elapsed")]
    elapsed: String,
}

impl From<&JobRecord> for JobRow {
    fn from(record: &JobRecord) -> Self {
        Self {
            workdir: record.workdir.clone(),
            name: record.job_name.clone(),
            job_id: record.job_id.to_string(),
            state: record.state.to_string(),
            elapsed: record.elapsed.clone(),
        }
    }
}

pub fn run(cmd: JobsCommand, connection: &ConnectionArgs) -> Result<()> {
    let mut session = connection.connect()?;
    match cmd {
        JobsCommand::List { days, all, json } => {
            let window = days.unwrap_or(session.config().lookback_days);
            let jobs = session
                .latest_jobs(window, !all)
                .context("failed to query scheduler history")?;
            let records: Vec<&JobRecord> = jobs.values().collect();
            if json {
                println!("{}", serde_json::to_string_pretty(&records)?);
                return Ok(());
            }
            print_table(&format!("last {window} day(s)"), &records);
        }
        JobsCommand::History { path, days, json } => {
            let window = days.unwrap_or(session.config().lookback_days);
            let history = session
                .job_history(&path, window)
                .with_context(|| format!("failed to query history of {}", path.display()))?;
            if json {
                println!("{}", serde_json::to_string_pretty(&history)?);
                return Ok(());
            }
            let records: Vec<&JobRecord> = history.iter().collect();
            print_table(&path.display().to_string(), &records);
        }
    }
    Ok(())
}

fn print_table(title: &str, records: &[&JobRecord]) {
    let running = count(records, &JobState::Running);
    let pending = count(records, &JobState::Pending);
    println!(
        "{} | {} jobs | {} {} running  {} {} pending",
        title.bold(),
        records.len(),
        "■".green().bold(),
        running,
        "■".yellow().bold(),
        pending,
    );
    if records.is_empty() {
        println!("No jobs found.");
        return;
    }
    let rows: Vec<JobRow> = records.iter().map(|r| JobRow::from(*r)).collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
}

fn count(records: &[&JobRecord], state: &JobState) -> usize {
    records.iter().filter(|r| &r.state == state).count()
}
