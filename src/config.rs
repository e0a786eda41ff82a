use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::db::SqlIdent;

/// Application configuration loaded from environment variables
///
/// Built once at startup and handed to every component that needs it.
#[derive(Clone, Debug)]
pub struct Config {
    /// SQLite database file, created if missing
    pub database_path: String,

    /// Table holding queued processing requests
    pub queue_table: SqlIdent,

    /// Append-only table receiving one row per completed job
    pub result_table: SqlIdent,

    /// Wait between polls when the queue is empty
    pub poll_interval: Duration,

    /// Retries granted to a job whose processor reports failure
    pub max_retries: i64,

    /// Output folder used when a request does not name one
    pub default_output_dir: PathBuf,

    /// PROCESSING rows untouched for this long are requeued at worker startup
    pub stale_processing_after: Duration,

    /// HTTP listen address
    pub bind_address: String,

    /// Maximum payload size for all requests (in bytes)
    /// Default: 10MB (10 * 1024 * 1024)
    pub max_payload_size: usize,

    pub max_db_connections: u32,

    pub log_dir: String,

    /// External processing program; the simulated processor is used when unset
    pub processor_command: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: "data.db".to_string(),
            queue_table: SqlIdent::from_static("miner_queue"),
            result_table: SqlIdent::from_static("speed_data"),
            poll_interval: Duration::from_millis(1000),
            max_retries: 3,
            default_output_dir: PathBuf::from("processed_data"),
            stale_processing_after: Duration::from_secs(300),
            bind_address: "127.0.0.1:5001".to_string(),
            max_payload_size: 10 * 1024 * 1024,
            max_db_connections: 5,
            log_dir: "logs".to_string(),
            processor_command: None,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// Every variable is optional:
    /// - DATABASE_PATH, QUEUE_TABLE, RESULT_TABLE
    /// - POLL_INTERVAL_MS, MAX_RETRIES, STALE_PROCESSING_SECS
    /// - OUTPUT_DIR, BIND_ADDRESS, MAX_PAYLOAD_SIZE, MAX_DB_CONNECTIONS, LOG_DIR
    /// - PROCESSOR_COMMAND
    ///
    /// Table names must be valid identifiers; anything else is rejected here
    /// rather than at the first query.
    pub fn from_env() -> Result<Self, String> {
        // Load .env file if it exists
        dotenv::dotenv().ok();

        let defaults = Config::default();

        let queue_table = match env::var("QUEUE_TABLE") {
            Ok(name) => SqlIdent::parse(&name).map_err(|e| format!("QUEUE_TABLE: {}", e))?,
            Err(_) => defaults.queue_table,
        };
        let result_table = match env::var("RESULT_TABLE") {
            Ok(name) => SqlIdent::parse(&name).map_err(|e| format!("RESULT_TABLE: {}", e))?,
            Err(_) => defaults.result_table,
        };

        Ok(Config {
            database_path: env::var("DATABASE_PATH").unwrap_or(defaults.database_path),
            queue_table,
            result_table,
            poll_interval: parsed("POLL_INTERVAL_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.poll_interval),
            max_retries: parsed("MAX_RETRIES").unwrap_or(defaults.max_retries),
            default_output_dir: env::var("OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.default_output_dir),
            stale_processing_after: parsed("STALE_PROCESSING_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.stale_processing_after),
            bind_address: env::var("BIND_ADDRESS").unwrap_or(defaults.bind_address),
            max_payload_size: parsed("MAX_PAYLOAD_SIZE").unwrap_or(defaults.max_payload_size),
            max_db_connections: parsed("MAX_DB_CONNECTIONS")
                .unwrap_or(defaults.max_db_connections),
            log_dir: env::var("LOG_DIR").unwrap_or(defaults.log_dir),
            processor_command: env::var("PROCESSOR_COMMAND")
                .ok()
                .filter(|c| !c.trim().is_empty()),
        })
    }
}

/// Parse an environment variable, treating absent or malformed values as unset
fn parsed<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|s| s.trim().parse().ok())
}
