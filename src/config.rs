use crate::monitor::{CollectorSettings, FlushPolicy, RetentionPolicy};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub collector: CollectorConfig,
    #[serde(default)]
    pub retention: RetentionConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub api: ApiConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// "text" or "json"
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            log_format: default_log_format(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_log_format() -> String {
    "text".to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// SQLite database path (default: "./data/query_monitor.db")
    #[serde(default = "default_database_path")]
    pub path: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            max_connections: default_max_connections(),
        }
    }
}

impl DatabaseConfig {
    pub fn url(&self) -> String {
        format!("sqlite:{}", self.path)
    }
}

fn default_database_path() -> String {
    "./data/query_monitor.db".to_string()
}

fn default_max_connections() -> u32 {
    5
}

/// Initial collector settings; the runtime values can be changed via the API
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CollectorConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub log_to_console: bool,
    #[serde(default = "default_slow_query_threshold_ms")]
    pub slow_query_threshold_ms: u64,
    /// Delay before a scheduled flush in milliseconds (default: 5000)
    #[serde(default = "default_flush_delay_ms")]
    pub flush_delay_ms: u64,
    /// Pending observations that trigger an immediate flush (default: 50)
    #[serde(default = "default_flush_batch_size")]
    pub flush_batch_size: usize,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            log_to_console: false,
            slow_query_threshold_ms: default_slow_query_threshold_ms(),
            flush_delay_ms: default_flush_delay_ms(),
            flush_batch_size: default_flush_batch_size(),
        }
    }
}

impl CollectorConfig {
    pub fn settings(&self) -> CollectorSettings {
        CollectorSettings {
            enabled: self.enabled,
            log_to_console: self.log_to_console,
            slow_query_threshold_ms: self.slow_query_threshold_ms,
        }
    }

    pub fn flush_policy(&self) -> FlushPolicy {
        FlushPolicy {
            flush_delay: Duration::from_millis(self.flush_delay_ms),
            batch_size: self.flush_batch_size,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_slow_query_threshold_ms() -> u64 {
    100
}

fn default_flush_delay_ms() -> u64 {
    5000
}

fn default_flush_batch_size() -> usize {
    50
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetentionConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Raw log retention in days (default: 1)
    #[serde(default = "default_logs_days")]
    pub logs_days: u32,
    /// Hour of day to run cleanup (0-23, default: 3 for 3am)
    #[serde(default = "default_cleanup_hour")]
    pub cleanup_hour: u32,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            logs_days: default_logs_days(),
            cleanup_hour: default_cleanup_hour(),
        }
    }
}

impl RetentionConfig {
    pub fn policy(&self) -> RetentionPolicy {
        RetentionPolicy {
            logs_days: self.logs_days,
            cleanup_hour: self.cleanup_hour,
            ..RetentionPolicy::default()
        }
    }
}

fn default_logs_days() -> u32 {
    1
}

fn default_cleanup_hour() -> u32 {
    3
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MetricsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_metrics_endpoint")]
    pub endpoint: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: default_metrics_endpoint(),
        }
    }
}

fn default_metrics_endpoint() -> String {
    "/metrics".to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
    /// Path prefix the monitoring routes are nested under
    #[serde(default = "default_api_prefix")]
    pub prefix: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            prefix: default_api_prefix(),
        }
    }
}

fn default_api_prefix() -> String {
    "/api/monitoring/queries".to_string()
}

/// Load configuration from a TOML file layered with `QUERY_MONITOR__*` env vars
///
/// A missing file is not an error; every field has a default.
pub fn load_config(path: &Path) -> anyhow::Result<Config> {
    let config = config::Config::builder()
        .add_source(config::File::from(path).required(false))
        .add_source(config::Environment::with_prefix("QUERY_MONITOR").separator("__"))
        .build()?;

    let cfg: Config = config.try_deserialize()?;
    validate_config(&cfg)?;

    Ok(cfg)
}

pub fn validate_config(cfg: &Config) -> anyhow::Result<()> {
    if cfg.collector.flush_batch_size == 0 {
        anyhow::bail!("collector.flush_batch_size must be at least 1");
    }

    if cfg.collector.flush_delay_ms == 0 {
        anyhow::bail!("collector.flush_delay_ms must be greater than 0");
    }

    if cfg.retention.cleanup_hour > 23 {
        anyhow::bail!(
            "retention.cleanup_hour must be between 0 and 23, got {}",
            cfg.retention.cleanup_hour
        );
    }

    if cfg.database.path.trim().is_empty() {
        anyhow::bail!("database.path cannot be empty");
    }

    let prefix = &cfg.api.prefix;
    if !prefix.starts_with('/') || prefix.len() < 2 || prefix.ends_with('/') {
        anyhow::bail!(
            "api.prefix must start with '/' and must not end with '/', got '{}'",
            prefix
        );
    }

    if cfg.metrics.enabled && !cfg.metrics.endpoint.starts_with('/') {
        anyhow::bail!("metrics.endpoint must start with '/'");
    }

    Ok(())
}
