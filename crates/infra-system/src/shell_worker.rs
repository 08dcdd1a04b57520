// Shell worker: runs a child process described by the job payload
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{info, warn};

use queueserver_core::domain::{JobId, JobPayload};
use queueserver_core::port::{JobOutput, JobWorker, TimeProvider, WorkerError};

/// Environment variables a payload may set by default
pub const DEFAULT_ENV_ALLOWLIST: &[&str] = &["PATH", "HOME", "USER", "LANG", "TMPDIR"];

/// Keep failure messages readable in the job log
const MAX_STDERR_IN_ERROR: usize = 2048;

/// Payload accepted by the shell worker
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct ShellPayload {
    command: String,
    #[serde(default)]
    args: Vec<String>,
    #[serde(default)]
    env: HashMap<String, String>,
    #[serde(default)]
    working_dir: Option<String>,
    #[serde(default)]
    timeout_ms: Option<u64>,
}

/// Result stored for a successful shell job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShellOutput {
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub duration_ms: i64,
}

/// Spawns isolated child processes with environment allowlisting
pub struct ShellWorker {
    time_provider: Arc<dyn TimeProvider>,
    env_allowlist: Vec<String>,
}

impl ShellWorker {
    /// Create a new shell worker
    ///
    /// # Arguments
    /// * `time_provider` - Time provider for duration tracking
    /// * `env_allowlist` - Variables a payload is allowed to set
    pub fn new(time_provider: Arc<dyn TimeProvider>, env_allowlist: Vec<String>) -> Self {
        Self {
            time_provider,
            env_allowlist,
        }
    }

    /// Filter environment variables to allowlist only
    fn filter_env(&self, env: &HashMap<String, String>) -> HashMap<String, String> {
        env.iter()
            .filter(|(k, _)| self.env_allowlist.contains(k))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    fn parse_payload(payload: &JobPayload) -> Result<ShellPayload, WorkerError> {
        let parsed: ShellPayload = serde_json::from_value(payload.as_value().clone())
            .map_err(|e| WorkerError::InvalidPayload(e.to_string()))?;
        if parsed.command.trim().is_empty() {
            return Err(WorkerError::InvalidPayload(
                "'command' must not be empty".to_string(),
            ));
        }
        Ok(parsed)
    }

    /// Spawn child process and wait for output
    async fn spawn_and_wait(
        &self,
        request: &ShellPayload,
    ) -> Result<std::process::Output, WorkerError> {
        let filtered_env = self.filter_env(&request.env);
        if filtered_env.len() < request.env.len() {
            warn!(
                requested = request.env.len(),
                allowed = filtered_env.len(),
                "Dropped environment variables outside the allowlist"
            );
        }

        let mut command = Command::new(&request.command);
        command
            .args(&request.args)
            .envs(&filtered_env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &request.working_dir {
            command.current_dir(dir);
        }

        let child = command
            .spawn()
            .map_err(|e| WorkerError::SpawnFailed(format!("{}: {}", request.command, e)))?;

        match request.timeout_ms {
            // Dropping the future drops the child, which kills it
            Some(limit) => {
                let waited = timeout(Duration::from_millis(limit), child.wait_with_output()).await;
                match waited {
                    Ok(Ok(output)) => Ok(output),
                    Ok(Err(e)) => Err(WorkerError::Io(e.to_string())),
                    Err(_) => Err(WorkerError::Timeout(limit as i64)),
                }
            }
            None => child
                .wait_with_output()
                .await
                .map_err(|e| WorkerError::Io(e.to_string())),
        }
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &s[..end])
}

#[async_trait]
impl JobWorker for ShellWorker {
    async fn execute(
        &self,
        job_id: JobId,
        payload: &JobPayload,
    ) -> Result<Box<dyn JobOutput>, WorkerError> {
        let request = Self::parse_payload(payload)?;
        let start_time = self.time_provider.now_millis();

        info!(
            job_id = %job_id,
            command = %request.command,
            args = ?request.args,
            working_dir = ?request.working_dir,
            timeout_ms = ?request.timeout_ms,
            "Starting shell command"
        );

        let output = self.spawn_and_wait(&request).await?;
        let duration_ms = self.time_provider.now_millis() - start_time;

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        info!(
            job_id = %job_id,
            duration_ms = duration_ms,
            exit_code = ?output.status.code(),
            "Shell command completed"
        );

        if !output.status.success() {
            return Err(WorkerError::NonZeroExit {
                code: output.status.code(),
                stderr: truncate(stderr.trim_end(), MAX_STDERR_IN_ERROR),
            });
        }

        Ok(Box::new(ShellOutput {
            exit_code: output.status.code(),
            stdout,
            stderr,
            duration_ms,
        }))
    }
}
