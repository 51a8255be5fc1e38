//! Quillforge CLI - submit and control batch jobs on a running engine

mod rpc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use rpc::RpcClient;
use serde::Deserialize;
use serde_json::json;
use std::path::{Path, PathBuf};
use tabled::{Table, Tabled};

const DEFAULT_RPC_URL: &str = "http://127.0.0.1:9530";

#[derive(Parser)]
#[command(name = "quillforge")]
#[command(about = "Quillforge batch engine CLI", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// RPC server URL
    #[arg(long, env = "QUILLFORGE_RPC_URL", default_value = DEFAULT_RPC_URL)]
    rpc_url: String,
}

#[derive(Clone, Copy, ValueEnum)]
enum JobTypeArg {
    /// One keyword per line
    Keywords,
    /// `keyword|url` per line
    Source,
}

impl JobTypeArg {
    fn wire_name(self) -> &'static str {
        match self {
            JobTypeArg::Keywords => "keywords-batch",
            JobTypeArg::Source => "source-batch",
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Submit a new batch job
    Submit {
        /// Owner of the job
        #[arg(short, long)]
        user: String,

        #[arg(short = 't', long, value_enum, default_value = "keywords")]
        job_type: JobTypeArg,

        /// File with one input line per line ("-" for stdin)
        #[arg(short, long, conflicts_with = "line")]
        file: Option<PathBuf>,

        /// Input line; repeatable
        #[arg(short, long)]
        line: Vec<String>,

        #[arg(long)]
        model: Option<String>,

        #[arg(long)]
        language: Option<String>,

        #[arg(long)]
        tone: Option<String>,

        /// short, medium or long
        #[arg(long)]
        length: Option<String>,

        /// Write an outline before the body
        #[arg(long)]
        outline: bool,
    },

    /// Show a job's progress
    Status { job_id: String },

    /// Cancel a job
    Cancel { job_id: String },

    /// Pause a job after its current line
    Pause { job_id: String },

    /// Resume a paused job from its checkpoint
    Resume { job_id: String },

    /// Show engine statistics
    Stats,
}

#[derive(Deserialize, Tabled)]
struct CreatedRow {
    job_id: String,
    status: String,
    total_items: i64,
}

#[derive(Deserialize)]
struct ControlResult {
    job_id: String,
    status: String,
}

#[derive(Deserialize)]
struct JobStatus {
    job_id: String,
    user_id: String,
    job_type: String,
    status: String,
    total_items: i64,
    completed_items: i64,
    failed_items: i64,
    progress_percent: u8,
    tokens_used: i64,
    tokens_at_start: i64,
    produced_ids: Vec<String>,
    error_message: Option<String>,
}

#[derive(Tabled)]
struct Field {
    field: &'static str,
    value: String,
}

#[derive(Deserialize)]
struct Stats {
    total_jobs: i64,
    pending_jobs: i64,
    processing_jobs: i64,
    paused_jobs: i64,
    completed_jobs: i64,
    failed_jobs: i64,
    cancelled_jobs: i64,
    active_users: usize,
    uptime_seconds: i64,
}

/// Non-blank lines of `path`, or stdin for "-"
fn read_lines(path: &Path) -> Result<Vec<String>> {
    let content = if path == Path::new("-") {
        std::io::read_to_string(std::io::stdin()).context("Failed to read stdin")?
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?
    };
    Ok(split_lines(&content))
}

fn split_lines(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

fn colored_status(status: &str) -> String {
    match status {
        "completed" => status.green().to_string(),
        "failed" | "cancelled" => status.red().to_string(),
        "paused" => status.yellow().to_string(),
        "processing" => status.cyan().to_string(),
        _ => status.to_string(),
    }
}

async fn control(client: &RpcClient, method: &str, verb: &str, job_id: String) -> Result<()> {
    let result: ControlResult = client.call(method, json!({ "job_id": job_id })).await?;
    println!(
        "{} (now {})",
        format!("✓ Job {} {}", result.job_id, verb).green().bold(),
        colored_status(&result.status)
    );
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let client = RpcClient::new(cli.rpc_url);

    match cli.command {
        Commands::Submit {
            user,
            job_type,
            file,
            line,
            model,
            language,
            tone,
            length,
            outline,
        } => {
            let lines = match file {
                Some(path) => read_lines(&path)?,
                None => line,
            };
            if lines.is_empty() {
                anyhow::bail!("No input lines; pass --file or --line");
            }

            let mut settings = serde_json::Map::new();
            for (key, value) in [
                ("model", model),
                ("language", language),
                ("tone", tone),
                ("length", length),
            ] {
                if let Some(value) = value {
                    settings.insert(key.to_string(), json!(value));
                }
            }
            settings.insert("outline_mode".to_string(), json!(outline));

            let params = json!({
                "user_id": user,
                "job_type": job_type.wire_name(),
                "lines": lines,
                "settings": settings,
            });
            let created: CreatedRow = client.call("batch.create.v1", params).await?;

            println!("{}", "✓ Job submitted".green().bold());
            println!();
            println!("{}", Table::new(vec![created]));
        }

        Commands::Status { job_id } => {
            let job: JobStatus = client
                .call("batch.status.v1", json!({ "job_id": job_id }))
                .await?;

            let mut rows = vec![
                Field { field: "Job", value: job.job_id },
                Field { field: "User", value: job.user_id },
                Field { field: "Type", value: job.job_type },
                Field { field: "Status", value: colored_status(&job.status) },
                Field {
                    field: "Progress",
                    value: format!(
                        "{}% ({} done, {} failed, {} total)",
                        job.progress_percent,
                        job.completed_items,
                        job.failed_items,
                        job.total_items
                    ),
                },
                Field {
                    field: "Tokens",
                    value: format!("{} used ({} at start)", job.tokens_used, job.tokens_at_start),
                },
                Field {
                    field: "Records",
                    value: job.produced_ids.len().to_string(),
                },
            ];
            if let Some(message) = job.error_message {
                rows.push(Field { field: "Error", value: message.red().to_string() });
            }
            println!("{}", Table::new(rows));
        }

        Commands::Cancel { job_id } => {
            control(&client, "batch.cancel.v1", "cancelled", job_id).await?
        }
        Commands::Pause { job_id } => control(&client, "batch.pause.v1", "paused", job_id).await?,
        Commands::Resume { job_id } => {
            control(&client, "batch.resume.v1", "resumed", job_id).await?
        }

        Commands::Stats => {
            println!("{}", "Engine Status".cyan().bold());
            println!();

            match client.call::<Stats>("admin.stats.v1", json!({})).await {
                Ok(stats) => {
                    println!("  {} {}", "RPC URL:".bold(), client.url());
                    println!("  {} {}", "Status:".bold(), "ONLINE".green());
                    println!();
                    println!("  {} {}", "Total Jobs:".bold(), stats.total_jobs);
                    println!("  {} {}", "Pending:".bold(), stats.pending_jobs);
                    println!("  {} {}", "Processing:".bold(), stats.processing_jobs);
                    println!("  {} {}", "Paused:".bold(), stats.paused_jobs);
                    println!("  {} {}", "Completed:".bold(), stats.completed_jobs);
                    println!("  {} {}", "Failed:".bold(), stats.failed_jobs);
                    println!("  {} {}", "Cancelled:".bold(), stats.cancelled_jobs);
                    println!();
                    println!("  {} {}", "Active Users:".bold(), stats.active_users);
                    println!("  {} {} seconds", "Uptime:".bold(), stats.uptime_seconds);
                }
                Err(e) => {
                    println!("  {} {}", "Status:".bold(), "ERROR".red());
                    println!("  {} {}", "Error:".bold(), e);
                }
            }
        }
    }

    Ok(())
}
