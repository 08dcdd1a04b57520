//! Queue Server CLI - Command-line interface for the Queue Server daemon

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tabled::{Table, Tabled};

const DEFAULT_RPC_URL: &str = "http://127.0.0.1:9530";

#[derive(Parser)]
#[command(name = "queueserver-cli")]
#[command(about = "Queue Server CLI", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// RPC server URL
    #[arg(long, env = "QUEUESERVER_RPC_URL", default_value = DEFAULT_RPC_URL)]
    rpc_url: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Enqueue a new job
    Enqueue {
        /// Worker type (e.g., shell, echo)
        #[arg(short, long)]
        worker: String,

        /// Priority (higher = more urgent)
        #[arg(short, long, default_value = "1")]
        priority: i32,

        /// Delete the job once it finishes successfully
        #[arg(long)]
        delete_on_finish: bool,

        /// Payload as JSON string
        #[arg(long, default_value = "{}")]
        payload: String,
    },

    /// Cancel (delete) a job that is not running
    Cancel {
        /// Job ID
        job_id: i64,
    },

    /// Copy a job into a new queued job
    Clone {
        /// Source job ID
        job_id: i64,

        /// Priority of the copy
        #[arg(short, long)]
        priority: Option<i32>,
    },

    /// Show job details
    Show {
        /// Job ID
        job_id: i64,
    },

    /// List jobs
    List {
        /// Filter by status (QUEUED, RUNNING, FINISHED, ERROR)
        #[arg(short, long)]
        status: Option<String>,

        /// Filter by worker type
        #[arg(short, long)]
        worker: Option<String>,

        /// Sort column (id, worker_type, priority, status, create_time, last_update_time)
        #[arg(long, default_value = "id")]
        sort: String,

        /// Sort ascending instead of descending
        #[arg(long)]
        asc: bool,

        #[arg(long, default_value = "1")]
        page: u32,

        #[arg(long, default_value = "20")]
        page_size: u32,
    },

    /// Print a job's log
    Log {
        /// Job ID
        job_id: i64,
    },

    /// Fetch the result of a finished or failed job
    Result {
        /// Job ID
        job_id: i64,

        /// Keep the job after reading its result
        #[arg(long)]
        keep: bool,
    },

    /// Run the next queued job now
    RunNext,

    /// Run queued jobs until none are left
    Drain,

    /// Delete old finished/failed jobs
    Cleanup {
        /// Age threshold in days (daemon default when omitted)
        #[arg(long)]
        max_age_days: Option<i64>,
    },

    /// Show system status
    Status,
}

#[derive(Serialize)]
struct JsonRpcRequest {
    jsonrpc: String,
    method: String,
    params: Value,
    id: u64,
}

#[derive(Deserialize)]
struct JsonRpcResponse {
    #[allow(dead_code)]
    jsonrpc: String,
    #[allow(dead_code)]
    id: u64,
    result: Option<Value>,
    error: Option<JsonRpcError>,
}

#[derive(Deserialize)]
struct JsonRpcError {
    code: i32,
    message: String,
}

#[derive(Deserialize, Tabled)]
struct JobRow {
    id: i64,
    worker_type: String,
    status: String,
    priority: i32,
    create_time: i64,
    last_update_time: i64,
}

#[derive(Deserialize)]
struct ListResult {
    jobs: Vec<JobRow>,
    total: i64,
    page: u32,
    page_size: u32,
}

async fn call_rpc(url: &str, method: &str, params: Value) -> Result<Value> {
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

fn parse_payload(raw: &str) -> Result<Value> {
    serde_json::from_str(raw).context("Invalid JSON payload")
}

fn list_params(
    status: Option<String>,
    worker: Option<String>,
    sort: String,
    asc: bool,
    page: u32,
    page_size: u32,
) -> Value {
    json!({
        "status": status.map(|s| s.to_ascii_uppercase()),
        "worker_type": worker,
        "sort_field": sort,
        "sort_direction": if asc { "asc" } else { "desc" },
        "page": page,
        "page_size": page_size,
    })
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let url = cli.rpc_url.as_str();

    match cli.command {
        Commands::Enqueue {
            worker,
            priority,
            delete_on_finish,
            payload,
        } => {
            let params = json!({
                "worker_type": worker,
                "priority": priority,
                "delete_on_finish": delete_on_finish,
                "payload": parse_payload(&payload)?,
            });

            let result = call_rpc(url, "job.enqueue.v1", params).await?;

            println!("{}", "✓ Job enqueued successfully".green().bold());
            println!("  {} {}", "Job ID:".bold(), result["job_id"]);
            println!("  {} {}", "Status:".bold(), result["status"]);
        }

        Commands::Cancel { job_id } => {
            call_rpc(url, "job.cancel.v1", json!({ "job_id": job_id })).await?;
            println!("{}", format!("✓ Job {} cancelled", job_id).green().bold());
        }

        Commands::Clone { job_id, priority } => {
            let params = json!({ "job_id": job_id, "priority": priority });
            let result = call_rpc(url, "job.clone.v1", params).await?;
            println!(
                "{}",
                format!("✓ Job {} cloned as {}", job_id, result["job_id"])
                    .green()
                    .bold()
            );
        }

        Commands::Show { job_id } => {
            let job = call_rpc(url, "job.get.v1", json!({ "job_id": job_id })).await?;
            println!("{}", format!("Job {}", job_id).cyan().bold());
            println!("  {} {}", "Worker:".bold(), job["worker_type"]);
            println!("  {} {}", "Status:".bold(), job["status"]);
            println!("  {} {}", "Priority:".bold(), job["priority"]);
            println!("  {} {}", "Delete on finish:".bold(), job["delete_on_finish"]);
            println!("  {} {}", "Created:".bold(), job["create_time"]);
            println!("  {} {}", "Updated:".bold(), job["last_update_time"]);
            println!("  {} {}", "Log entries:".bold(), job["log_entries"]);
            println!("  {}", "Payload:".bold());
            println!("{}", pretty(&job["payload"]));
            if !job["result"].is_null() {
                println!("  {}", "Result:".bold());
                println!("{}", pretty(&job["result"]));
            }
        }

        Commands::List {
            status,
            worker,
            sort,
            asc,
            page,
            page_size,
        } => {
            let params = list_params(status, worker, sort, asc, page, page_size);
            let result = call_rpc(url, "job.list.v1", params).await?;
            let list: ListResult = serde_json::from_value(result)?;

            if list.jobs.is_empty() {
                println!("{}", "No jobs".yellow());
            } else {
                println!("{}", Table::new(list.jobs));
            }
            println!(
                "Page {} ({} per page), {} jobs total",
                list.page, list.page_size, list.total
            );
        }

        Commands::Log { job_id } => {
            let result = call_rpc(url, "job.log.v1", json!({ "job_id": job_id })).await?;
            let entries = result["entries"].as_array().cloned().unwrap_or_default();

            if entries.is_empty() {
                println!("{}", "No log entries".yellow());
            } else {
                println!("{}", format!("Log for job {}:", job_id).cyan().bold());
                for entry in entries {
                    println!(
                        "  [{}] {}",
                        entry["timestamp"],
                        entry["message"].as_str().unwrap_or_default()
                    );
                }
            }
        }

        Commands::Result { job_id, keep } => {
            let params = json!({ "job_id": job_id, "delete_job": !keep });
            let result = call_rpc(url, "job.result.v1", params).await?;
            println!("  {} {}", "Status:".bold(), result["status"]);
            println!("{}", pretty(&result["result"]));
        }

        Commands::RunNext => {
            let result = call_rpc(url, "queue.execute_next.v1", json!({})).await?;
            match result["outcome"].as_str() {
                Some("idle") => println!("{}", "Queue is empty".yellow()),
                Some("failed") => println!(
                    "{}",
                    format!("✗ Job {} failed", result["job_id"]).red().bold()
                ),
                Some(outcome) => println!(
                    "{}",
                    format!("✓ Job {} {}", result["job_id"], outcome)
                        .green()
                        .bold()
                ),
                None => println!("{}", pretty(&result)),
            }
        }

        Commands::Drain => {
            let result = call_rpc(url, "queue.drain.v1", json!({})).await?;
            println!("{}", "✓ Queue drained".green().bold());
            println!("  {} {}", "Finished:".bold(), result["finished"]);
            println!("  {} {}", "Deleted:".bold(), result["deleted"]);
            println!("  {} {}", "Failed:".bold(), result["failed"]);
            println!("  {} {}", "Errors:".bold(), result["errors"]);
        }

        Commands::Cleanup { max_age_days } => {
            println!("{}", "Running cleanup...".cyan().bold());
            let params = json!({ "max_age_days": max_age_days });

            match call_rpc(url, "admin.cleanup.v1", params).await {
                Ok(result) => {
                    println!("  {} {} jobs deleted", "✓".green(), result["deleted_jobs"]);
                    if result["compacted"].as_bool().unwrap_or(false) {
                        println!(
                            "  {} VACUUM executed ({:.2} MB reclaimed)",
                            "✓".green(),
                            result["reclaimed_mb"].as_f64().unwrap_or(0.0)
                        );
                    } else {
                        println!("  ○ VACUUM skipped (nothing deleted)");
                    }
                }
                Err(e) => {
                    println!("  {} Cleanup failed: {}", "✗".red(), e);
                }
            }
        }

        Commands::Status => {
            println!("{}", "System Status".cyan().bold());
            println!();

            match call_rpc(url, "admin.stats.v1", json!({})).await {
                Ok(stats) => {
                    println!("  {} {}", "RPC URL:".bold(), url);
                    println!("  {} {}", "Status:".bold(), "ONLINE".green());
                    println!();
                    println!("  {} {}", "Total Jobs:".bold(), stats["total_jobs"]);
                    println!("  {} {}", "Queued:".bold(), stats["queued_jobs"]);
                    println!("  {} {}", "Running:".bold(), stats["running_jobs"]);
                    println!("  {} {}", "Finished:".bold(), stats["finished_jobs"]);
                    println!("  {} {}", "Error:".bold(), stats["error_jobs"]);
                    println!("  {} {}", "Workers:".bold(), stats["worker_types"]);
                    println!();
                    let db_mb =
                        stats["db_size_bytes"].as_i64().unwrap_or(0) as f64 / (1024.0 * 1024.0);
                    println!("  {} {:.2} MB", "DB Size:".bold(), db_mb);
                    println!("  {} {} seconds", "Uptime:".bold(), stats["uptime_seconds"]);
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enqueue_args() {
        let cli = Cli::try_parse_from([
            "queueserver-cli",
            "enqueue",
            "--worker",
            "shell",
            "--payload",
            r#"{"command":"ls"}"#,
        ])
        .unwrap();
        match cli.command {
            Commands::Enqueue {
                worker,
                priority,
                delete_on_finish,
                payload,
            } => {
                assert_eq!(worker, "shell");
                assert_eq!(priority, 1);
                assert!(!delete_on_finish);
                assert_eq!(parse_payload(&payload).unwrap(), json!({"command": "ls"}));
            }
            _ => panic!("expected enqueue"),
        }
    }

    #[test]
    fn test_invalid_payload_rejected() {
        assert!(parse_payload("{not json").is_err());
    }

    #[test]
    fn test_list_params_shape() {
        let params = list_params(Some("queued".into()), None, "priority".into(), true, 2, 10);
        assert_eq!(params["status"], "QUEUED");
        assert!(params["worker_type"].is_null());
        assert_eq!(params["sort_field"], "priority");
        assert_eq!(params["sort_direction"], "asc");
        assert_eq!(params["page"], 2);
    }

    #[test]
    fn test_result_deletes_by_default() {
        let cli = Cli::try_parse_from(["queueserver-cli", "result", "7"]).unwrap();
        assert!(matches!(cli.command, Commands::Result { job_id: 7, keep: false }));
    }
}
