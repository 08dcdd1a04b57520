//! Daemon configuration from `QUEUESERVER_*` environment variables

use queueserver_core::application::MAX_CLEANUP_INTERVAL_HOURS;
use queueserver_core::domain::DequeueOrder;
use queueserver_core::error::{AppError, Result};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_DB_PATH: &str = "~/.queueserver/queue.db";
const DEFAULT_RPC_PORT: u16 = 9530;
const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;
const DEFAULT_RETENTION_DAYS: i64 = 7;
const DEFAULT_CLEANUP_INTERVAL_HOURS: u64 = 24;
const MAX_POLL_INTERVAL_MS: u64 = 60 * 60 * 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(AppError::Config(format!(
                "QUEUESERVER_LOG_FORMAT must be 'pretty' or 'json' (got '{}')",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DaemonConfig {
    pub db_path: PathBuf,
    pub rpc_port: u16,
    pub dequeue_order: DequeueOrder,
    pub poll_interval: Duration,
    pub retention_days: i64,
    pub cleanup_interval_hours: u64,
    pub log_format: LogFormat,
    /// Run the in-process polling consumer (otherwise only external triggers run jobs)
    pub consumer_enabled: bool,
}

impl DaemonConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source; unset keys take defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let db_path = lookup("QUEUESERVER_DB_PATH").unwrap_or_else(|| DEFAULT_DB_PATH.to_string());
        let db_path = PathBuf::from(shellexpand::tilde(&db_path).into_owned());

        let retention_days = parse(&lookup, "QUEUESERVER_RETENTION_DAYS", DEFAULT_RETENTION_DAYS)?;
        if retention_days < 0 {
            return Err(AppError::Config(format!(
                "QUEUESERVER_RETENTION_DAYS must not be negative (got {})",
                retention_days
            )));
        }

        let dequeue_order = match lookup("QUEUESERVER_DEQUEUE_ORDER") {
            Some(raw) => raw
                .parse::<DequeueOrder>()
                .map_err(|e| AppError::Config(format!("QUEUESERVER_DEQUEUE_ORDER: {}", e)))?,
            None => DequeueOrder::default(),
        };

        let log_format = match lookup("QUEUESERVER_LOG_FORMAT") {
            Some(raw) => raw.parse()?,
            None => LogFormat::Pretty,
        };

        Ok(Self {
            db_path,
            rpc_port: parse(&lookup, "QUEUESERVER_RPC_PORT", DEFAULT_RPC_PORT)?,
            dequeue_order,
            poll_interval: Duration::from_millis(parse_in_range(
                &lookup,
                "QUEUESERVER_POLL_INTERVAL_MS",
                DEFAULT_POLL_INTERVAL_MS,
                1,
                MAX_POLL_INTERVAL_MS,
            )?),
            retention_days,
            cleanup_interval_hours: parse_in_range(
                &lookup,
                "QUEUESERVER_CLEANUP_INTERVAL_HOURS",
                DEFAULT_CLEANUP_INTERVAL_HOURS,
                1,
                MAX_CLEANUP_INTERVAL_HOURS,
            )?,
            log_format,
            consumer_enabled: parse(&lookup, "QUEUESERVER_CONSUMER", true)?,
        })
    }

    pub fn database_url(&self) -> String {
        queueserver_infra_sqlite::database_url(&self.db_path)
    }
}

fn parse<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| AppError::Config(format!("{}='{}': {}", key, raw, e))),
        None => Ok(default),
    }
}

fn parse_in_range<F>(lookup: &F, key: &str, default: u64, min: u64, max: u64) -> Result<u64>
where
    F: Fn(&str) -> Option<String>,
{
    let value = parse(lookup, key, default)?;
    if !(min..=max).contains(&value) {
        return Err(AppError::Config(format!(
            "{} must be between {} and {} (got {})",
            key, min, max, value
        )));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<DaemonConfig> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        DaemonConfig::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn test_defaults() {
        let cfg = config(&[]).unwrap();
        assert!(cfg.db_path.ends_with(".queueserver/queue.db"));
        assert!(!cfg.db_path.starts_with("~"));
        assert_eq!(cfg.rpc_port, 9530);
        assert_eq!(cfg.dequeue_order, DequeueOrder::PriorityFirst);
        assert_eq!(cfg.poll_interval, Duration::from_secs(1));
        assert_eq!(cfg.retention_days, 7);
        assert_eq!(cfg.cleanup_interval_hours, 24);
        assert_eq!(cfg.log_format, LogFormat::Pretty);
        assert!(cfg.consumer_enabled);
    }

    #[test]
    fn test_overrides() {
        let cfg = config(&[
            ("QUEUESERVER_DB_PATH", "/tmp/q.db"),
            ("QUEUESERVER_RPC_PORT", "9999"),
            ("QUEUESERVER_DEQUEUE_ORDER", "fifo"),
            ("QUEUESERVER_POLL_INTERVAL_MS", "250"),
            ("QUEUESERVER_LOG_FORMAT", "JSON"),
            ("QUEUESERVER_CONSUMER", "false"),
        ])
        .unwrap();
        assert_eq!(cfg.db_path, PathBuf::from("/tmp/q.db"));
        assert_eq!(cfg.database_url(), "sqlite:///tmp/q.db");
        assert_eq!(cfg.rpc_port, 9999);
        assert_eq!(cfg.dequeue_order, DequeueOrder::Fifo);
        assert_eq!(cfg.poll_interval, Duration::from_millis(250));
        assert_eq!(cfg.log_format, LogFormat::Json);
        assert!(!cfg.consumer_enabled);
    }

    #[test]
    fn test_invalid_values_are_config_errors() {
        for vars in [
            [("QUEUESERVER_RPC_PORT", "not-a-port")],
            [("QUEUESERVER_DEQUEUE_ORDER", "random")],
            [("QUEUESERVER_RETENTION_DAYS", "-1")],
            [("QUEUESERVER_LOG_FORMAT", "xml")],
            [("QUEUESERVER_POLL_INTERVAL_MS", "0")],
            [("QUEUESERVER_POLL_INTERVAL_MS", "18446744073709551615")],
            [("QUEUESERVER_CLEANUP_INTERVAL_HOURS", "0")],
            [("QUEUESERVER_CLEANUP_INTERVAL_HOURS", "5124095576030432")],
        ] {
            let err = config(&vars).unwrap_err();
            assert_eq!(err.kind(), queueserver_core::ErrorKind::Config, "{:?}", vars);
        }
    }

    #[test]
    fn test_interval_bounds_are_inclusive() {
        let cfg = config(&[
            ("QUEUESERVER_POLL_INTERVAL_MS", "1"),
            ("QUEUESERVER_CLEANUP_INTERVAL_HOURS", "8760"),
        ])
        .unwrap();
        assert_eq!(cfg.poll_interval, Duration::from_millis(1));
        assert_eq!(cfg.cleanup_interval_hours, 8760);
    }
}
