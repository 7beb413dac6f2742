//! Configuration structures for the fanlog pipeline.

use serde::Deserialize;
use std::time::Duration;

// --- Default value helpers for configuration fields ---
fn default_false() -> bool {
    false
}
fn default_min_severity() -> String {
    "INFO".to_string()
}
fn default_max_batch_size() -> usize {
    100
}
fn default_linger_interval_ms() -> u64 {
    1000
}
fn default_max_queue_capacity() -> usize {
    1000
}
fn default_max_retry_attempts() -> u32 {
    3
}
fn default_retry_initial_backoff_ms() -> u64 {
    200
}
fn default_enqueue_block_timeout_ms() -> u64 {
    1000
}
fn default_export_timeout_ms() -> u64 {
    30000
}
fn default_shutdown_deadline_ms() -> u64 {
    30000
}
fn default_remote_endpoint() -> String {
    String::new()
}

/// Producer behavior when the live buffer is at capacity.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum BackpressurePolicy {
    /// Wait up to `enqueue_block_timeout` for space, then drop the record.
    Block,
    /// Discard the incoming record.
    DropNewest,
    /// Evict the oldest buffered record to make room.
    #[default]
    DropOldest,
}

/// Top-level configuration for a fanlog pipeline.
///
/// Durations are expressed in milliseconds in the serialized form; the
/// accessor methods convert to [`Duration`].
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    /// Address of the remote collector. May include an explicit scheme;
    /// otherwise one is chosen from `insecure_transport`.
    #[serde(default = "default_remote_endpoint")]
    pub remote_endpoint: String,
    /// Use plaintext HTTP instead of HTTPS when the endpoint has no scheme.
    #[serde(default = "default_false")]
    pub insecure_transport: bool,
    /// Records below this severity are discarded at emission.
    #[serde(default = "default_min_severity")]
    pub min_severity: String,
    /// Maximum records per exported batch.
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,
    /// Maximum time a non-empty buffer waits before being flushed.
    #[serde(default = "default_linger_interval_ms")]
    pub linger_interval_ms: u64,
    /// Capacity of the live buffer; the backpressure policy applies beyond it.
    #[serde(default = "default_max_queue_capacity")]
    pub max_queue_capacity: usize,
    #[serde(default)]
    pub backpressure_policy: BackpressurePolicy,
    /// Total send attempts per batch, including the first.
    #[serde(default = "default_max_retry_attempts")]
    pub max_retry_attempts: u32,
    /// First retry delay; doubles on each subsequent attempt.
    #[serde(default = "default_retry_initial_backoff_ms")]
    pub retry_initial_backoff_ms: u64,
    /// Upper bound on how long a `Block`-policy enqueue may wait.
    #[serde(default = "default_enqueue_block_timeout_ms")]
    pub enqueue_block_timeout_ms: u64,
    /// Per-attempt timeout on the export request.
    #[serde(default = "default_export_timeout_ms")]
    pub export_timeout_ms: u64,
    /// Default deadline for `shutdown`.
    #[serde(default = "default_shutdown_deadline_ms")]
    pub shutdown_deadline_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            remote_endpoint: default_remote_endpoint(),
            insecure_transport: default_false(),
            min_severity: default_min_severity(),
            max_batch_size: default_max_batch_size(),
            linger_interval_ms: default_linger_interval_ms(),
            max_queue_capacity: default_max_queue_capacity(),
            backpressure_policy: BackpressurePolicy::default(),
            max_retry_attempts: default_max_retry_attempts(),
            retry_initial_backoff_ms: default_retry_initial_backoff_ms(),
            enqueue_block_timeout_ms: default_enqueue_block_timeout_ms(),
            export_timeout_ms: default_export_timeout_ms(),
            shutdown_deadline_ms: default_shutdown_deadline_ms(),
        }
    }
}

impl PipelineConfig {
    pub fn linger_interval(&self) -> Duration {
        Duration::from_millis(self.linger_interval_ms)
    }

    pub fn retry_initial_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_initial_backoff_ms)
    }

    pub fn enqueue_block_timeout(&self) -> Duration {
        Duration::from_millis(self.enqueue_block_timeout_ms)
    }

    pub fn export_timeout(&self) -> Duration {
        Duration::from_millis(self.export_timeout_ms)
    }

    pub fn shutdown_deadline(&self) -> Duration {
        Duration::from_millis(self.shutdown_deadline_ms)
    }
}

/// Load a [`PipelineConfig`] from a TOML file.
pub fn load_config_from_file(path: &std::path::Path) -> crate::error::Result<PipelineConfig> {
    use crate::error::FanlogError;
    use std::fs;

    if !path.exists() {
        return Err(FanlogError::ConfigFileMissing(
            path.to_string_lossy().into_owned(),
        ));
    }

    let config_str = fs::read_to_string(path)?;
    load_config_from_str(&config_str)
}

/// Load a [`PipelineConfig`] from a TOML string.
pub fn load_config_from_str(config_str: &str) -> crate::error::Result<PipelineConfig> {
    use crate::error::FanlogError;

    let config: PipelineConfig = toml::from_str(config_str)
        .map_err(|e| FanlogError::ConfigError(format!("TOML parse failed: {}", e)))?;

    Ok(config)
}

/// Validate a configuration before wiring a pipeline from it.
pub fn validate_config(config: &PipelineConfig) -> crate::error::Result<()> {
    use crate::error::FanlogError;

    match config.min_severity.to_uppercase().as_str() {
        "DEBUG" | "INFO" | "WARN" | "ERROR" => {}
        _ => return Err(FanlogError::InvalidSeverity(config.min_severity.clone())),
    }

    if config.max_batch_size == 0 {
        return Err(FanlogError::ConfigError(
            "max_batch_size must be greater than 0".to_string(),
        ));
    }

    if config.max_queue_capacity == 0 {
        return Err(FanlogError::ConfigError(
            "max_queue_capacity must be greater than 0".to_string(),
        ));
    }

    if config.max_retry_attempts == 0 {
        return Err(FanlogError::ConfigError(
            "max_retry_attempts must be at least 1".to_string(),
        ));
    }

    if config.export_timeout_ms == 0 {
        return Err(FanlogError::ConfigError(
            "export_timeout_ms must be greater than 0".to_string(),
        ));
    }

    Ok(())
}
