//! Enrich CLI - Command-line interface for the enrichment daemon

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tabled::{Table, Tabled};

const DEFAULT_RPC_URL: &str = "http://127.0.0.1:9531";
const PROGRESS_BAR_WIDTH: usize = 30;

#[derive(Parser)]
#[command(name = "enrich")]
#[command(about = "Job enrichment pipeline CLI", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// RPC server URL
    #[arg(long, env = "ENRICH_RPC_URL", default_value = DEFAULT_RPC_URL)]
    rpc_url: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a pipeline run
    Start,

    /// Show pipeline state, phases and progress
    Status,

    /// Show the per-item status table
    Items,

    /// Show recent alerts
    Alerts {
        /// Number of alerts to show
        #[arg(short = 'n', long, default_value = "50")]
        limit: usize,
    },

    /// Follow progress until the run ends
    Watch {
        /// Poll interval in milliseconds
        #[arg(long, default_value = "1000")]
        interval_ms: u64,
    },
}

#[derive(Serialize)]
struct JsonRpcRequest {
    jsonrpc: String,
    method: String,
    params: serde_json::Value,
    id: u64,
}

#[derive(Deserialize)]
struct JsonRpcResponse {
    #[allow(dead_code)]
    jsonrpc: String,
    #[allow(dead_code)]
    id: u64,
    result: Option<serde_json::Value>,
    error: Option<JsonRpcError>,
}

#[derive(Deserialize)]
struct JsonRpcError {
    code: i32,
    message: String,
}

#[derive(Deserialize)]
struct Progress {
    completed_steps: u32,
    total_steps: u32,
    percent: u8,
}

#[derive(Deserialize)]
struct Phases {
    ingestion: String,
    loading: String,
    initialization: String,
    data_enrichment: String,
    ai_enrichment: String,
}

#[derive(Deserialize)]
struct Status {
    run_id: Option<String>,
    running: bool,
    state: String,
    phases: Phases,
    progress: Progress,
    current_item_id: Option<String>,
    item_count: usize,
    error: Option<String>,
}

#[derive(Deserialize)]
struct Item {
    job_id: String,
    title: String,
    data_status: Option<String>,
    ai_status: Option<String>,
    outdated: bool,
}

#[derive(Tabled)]
struct ItemRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Title")]
    title: String,
    #[tabled(rename = "Data")]
    data: String,
    #[tabled(rename = "AI")]
    ai: String,
    #[tabled(rename = "Outdated")]
    outdated: String,
}

#[derive(Deserialize)]
struct Alert {
    message: String,
    severity: String,
    timestamp: i64,
    job_id: Option<String>,
}

#[derive(Tabled)]
struct AlertRow {
    #[tabled(rename = "Time (ms)")]
    timestamp: i64,
    #[tabled(rename = "Severity")]
    severity: String,
    #[tabled(rename = "Job")]
    job: String,
    #[tabled(rename = "Message")]
    message: String,
}

async fn call_rpc(url: &str, method: &str, params: serde_json::Value) -> Result<serde_json::Value> {
    let request = JsonRpcRequest {
        jsonrpc: "2.0".to_string(),
        method: method.to_string(),
        params,
        id: 1,
    };

    let client = reqwest::Client::new();
    let response: JsonRpcResponse = client
        .post(url)
        .json(&request)
        .send()
        .await
        .context("Failed to connect to daemon")?
        .json()
        .await
        .context("Failed to parse response")?;

    if let Some(error) = response.error {
        anyhow::bail!("RPC error ({}): {}", error.code, error.message);
    }

    response
        .result
        .ok_or_else(|| anyhow::anyhow!("No result in response"))
}

async fn fetch_status(url: &str) -> Result<Status> {
    let result = call_rpc(url, "pipeline.status.v1", json!({})).await?;
    serde_json::from_value(result).context("Unexpected status payload")
}

/// Status cell for the item table; absent statuses render as a dash
fn status_cell(status: Option<&str>) -> String {
    match status {
        Some("ok") => "ok".green().to_string(),
        Some("error") => "error".red().to_string(),
        Some("skipped") => "skipped".yellow().to_string(),
        Some("processing") => "processing".cyan().to_string(),
        Some(other) => other.to_string(),
        None => "-".dimmed().to_string(),
    }
}

fn phase_cell(state: &str) -> String {
    match state {
        "DONE" => state.green().to_string(),
        "RUNNING" => state.cyan().to_string(),
        "ERROR" => state.red().to_string(),
        _ => state.dimmed().to_string(),
    }
}

fn severity_cell(severity: &str) -> String {
    match severity {
        "critical" => severity.red().bold().to_string(),
        "error" => severity.red().to_string(),
        "warning" => severity.yellow().to_string(),
        _ => severity.to_string(),
    }
}

fn progress_bar(percent: u8) -> String {
    let filled = (percent.min(100) as usize * PROGRESS_BAR_WIDTH) / 100;
    format!(
        "[{}{}] {:>3}%",
        "#".repeat(filled),
        "-".repeat(PROGRESS_BAR_WIDTH - filled),
        percent
    )
}

fn is_terminal_state(state: &str) -> bool {
    matches!(state, "COMPLETE" | "ERROR")
}

fn print_status(status: &Status, rpc_url: &str) {
    println!("{}", "Pipeline Status".cyan().bold());
    println!();
    println!("  {} {}", "RPC URL:".bold(), rpc_url);
    println!(
        "  {} {}",
        "Run:".bold(),
        status.run_id.as_deref().unwrap_or("(none yet)")
    );
    let state = if status.state == "ERROR" {
        status.state.red().to_string()
    } else if status.running {
        status.state.cyan().to_string()
    } else {
        status.state.green().to_string()
    };
    println!("  {} {}", "State:".bold(), state);
    println!();
    println!("  {} {}", "Ingestion:".bold(), phase_cell(&status.phases.ingestion));
    println!("  {} {}", "Loading:".bold(), phase_cell(&status.phases.loading));
    println!(
        "  {} {}",
        "Initialization:".bold(),
        phase_cell(&status.phases.initialization)
    );
    println!(
        "  {} {}",
        "Data enrichment:".bold(),
        phase_cell(&status.phases.data_enrichment)
    );
    println!(
        "  {} {}",
        "AI enrichment:".bold(),
        phase_cell(&status.phases.ai_enrichment)
    );
    println!();
    println!(
        "  {} {} ({}/{} steps, {} items)",
        "Progress:".bold(),
        progress_bar(status.progress.percent),
        status.progress.completed_steps,
        status.progress.total_steps,
        status.item_count
    );
    if let Some(item) = &status.current_item_id {
        println!("  {} {}", "Current item:".bold(), item);
    }
    if let Some(error) = &status.error {
        println!("  {} {}", "Error:".bold(), error.red());
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Start => {
            call_rpc(&cli.rpc_url, "pipeline.start.v1", json!({})).await?;
            println!("{}", "✓ Pipeline run started".green().bold());
            println!("  Follow it with: enrich watch");
        }

        Commands::Status => match fetch_status(&cli.rpc_url).await {
            Ok(status) => print_status(&status, &cli.rpc_url),
            Err(e) => {
                println!("  {} {}", "Status:".bold(), "ERROR".red());
                println!("  {} {}", "Error:".bold(), e);
            }
        },

        Commands::Items => {
            let result = call_rpc(&cli.rpc_url, "pipeline.items.v1", json!({})).await?;
            let items: Vec<Item> = serde_json::from_value(result["items"].clone())
                .context("Unexpected items payload")?;

            if items.is_empty() {
                println!("{}", "No items in the current run".yellow());
                return Ok(());
            }

            let rows: Vec<ItemRow> = items
                .into_iter()
                .map(|item| ItemRow {
                    id: item.job_id,
                    title: item.title,
                    data: status_cell(item.data_status.as_deref()),
                    ai: status_cell(item.ai_status.as_deref()),
                    outdated: if item.outdated { "yes".into() } else { "".into() },
                })
                .collect();
            println!("{}", Table::new(rows));
        }

        Commands::Alerts { limit } => {
            let result =
                call_rpc(&cli.rpc_url, "alerts.recent.v1", json!({ "limit": limit })).await?;
            let alerts: Vec<Alert> = serde_json::from_value(result["alerts"].clone())
                .context("Unexpected alerts payload")?;

            if alerts.is_empty() {
                println!("{}", "No alerts".green());
                return Ok(());
            }

            let rows: Vec<AlertRow> = alerts
                .into_iter()
                .map(|alert| AlertRow {
                    timestamp: alert.timestamp,
                    severity: severity_cell(&alert.severity),
                    job: alert.job_id.unwrap_or_default(),
                    message: alert.message,
                })
                .collect();
            println!("{}", Table::new(rows));
        }

        Commands::Watch { interval_ms } => {
            let interval = Duration::from_millis(interval_ms.max(100));
            loop {
                let status = fetch_status(&cli.rpc_url).await?;
                println!(
                    "{} {} {}",
                    progress_bar(status.progress.percent),
                    status.state.bold(),
                    status.current_item_id.as_deref().unwrap_or("")
                );

                if !status.running && (is_terminal_state(&status.state) || status.run_id.is_none())
                {
                    println!();
                    print_status(&status, &cli.rpc_url);
                    break;
                }
                tokio::time::sleep(interval).await;
            }
        }
    }

    Ok(())
}
