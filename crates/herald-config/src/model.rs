// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Herald delivery pipeline.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};

/// Top-level Herald configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable
/// overrides. All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct HeraldConfig {
    /// Service identity and logging settings.
    #[serde(default)]
    pub service: ServiceConfig,

    /// Record store settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Delivery queue settings.
    #[serde(default)]
    pub queue: QueueConfig,

    /// Cron scheduler and one-shot processor settings.
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Change ingestion listener settings.
    #[serde(default)]
    pub listener: ListenerConfig,

    /// Supervisor lifecycle settings.
    #[serde(default)]
    pub supervisor: SupervisorConfig,

    /// HTTP gateway settings.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Delivery provider client settings.
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Prometheus metrics settings.
    #[serde(default)]
    pub prometheus: PrometheusConfig,
}

/// Service identity and logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    /// Display name of the service.
    #[serde(default = "default_service_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            log_level: default_log_level(),
        }
    }
}

fn default_service_name() -> String {
    "herald".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Record store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

fn default_database_path() -> String {
    "herald.db".to_string()
}

/// Delivery queue configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct QueueConfig {
    /// Maximum queued items; enqueues beyond this are dropped and counted.
    #[serde(default = "default_max_queue_size")]
    pub max_queue_size: usize,

    /// Maximum concurrently processing items.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    /// Maximum delivery attempts for a transiently failing record.
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,

    /// Base retry delay in milliseconds; attempt `n` waits
    /// `retry_delay_ms * 2^(n-1)` plus bounded jitter.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Sleep between loop iterations when idle or at capacity.
    #[serde(default = "default_idle_poll_ms")]
    pub idle_poll_ms: u64,

    /// How long `stop()` waits for in-flight deliveries before forcing.
    #[serde(default = "default_drain_timeout_secs")]
    pub drain_timeout_secs: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_queue_size: default_max_queue_size(),
            max_concurrent: default_max_concurrent(),
            retry_attempts: default_retry_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
            idle_poll_ms: default_idle_poll_ms(),
            drain_timeout_secs: default_drain_timeout_secs(),
        }
    }
}

fn default_max_queue_size() -> usize {
    1000
}

fn default_max_concurrent() -> usize {
    8
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    1000
}

fn default_idle_poll_ms() -> u64 {
    100
}

fn default_drain_timeout_secs() -> u64 {
    30
}

/// Cron scheduler and one-shot processor configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SchedulerConfig {
    /// One-shot processor poll interval in seconds.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Maximum due records fetched per poll tick.
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,

    /// Short-horizon window in hours: records due within this window get
    /// a delayed-enqueue task instead of waiting for the next poll.
    #[serde(default = "default_horizon_hours")]
    pub horizon_hours: u64,

    /// Fallback timezone for rules that do not name one.
    #[serde(default = "default_timezone")]
    pub default_timezone: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            batch_size: default_batch_size(),
            horizon_hours: default_horizon_hours(),
            default_timezone: default_timezone(),
        }
    }
}

fn default_poll_interval_secs() -> u64 {
    60
}

fn default_batch_size() -> u32 {
    50
}

fn default_horizon_hours() -> u64 {
    24
}

fn default_timezone() -> String {
    "UTC".to_string()
}

/// Change ingestion listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ListenerConfig {
    /// Tenant filter. `None` accepts inserts from every enterprise.
    #[serde(default)]
    pub enterprise_id: Option<String>,

    /// Back-off in seconds after an infrastructure error before the
    /// listener retries its store operation.
    #[serde(default = "default_listener_backoff_secs")]
    pub backoff_secs: u64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            enterprise_id: None,
            backoff_secs: default_listener_backoff_secs(),
        }
    }
}

fn default_listener_backoff_secs() -> u64 {
    60
}

/// Supervisor lifecycle configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SupervisorConfig {
    /// Interval between child health polls, in seconds.
    #[serde(default = "default_health_interval_secs")]
    pub health_interval_secs: u64,

    /// Supervision loop recycle period in hours ("continue as new").
    #[serde(default = "default_recycle_interval_hours")]
    pub recycle_interval_hours: u64,

    /// Bounded wait for active deliveries during stop, in seconds.
    #[serde(default = "default_stop_timeout_secs")]
    pub stop_timeout_secs: u64,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            health_interval_secs: default_health_interval_secs(),
            recycle_interval_hours: default_recycle_interval_hours(),
            stop_timeout_secs: default_stop_timeout_secs(),
        }
    }
}

fn default_health_interval_secs() -> u64 {
    30
}

fn default_recycle_interval_hours() -> u64 {
    24
}

fn default_stop_timeout_secs() -> u64 {
    30
}

/// HTTP gateway configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    /// Enable the gateway.
    #[serde(default = "default_gateway_enabled")]
    pub enabled: bool,

    /// Host address to bind.
    #[serde(default = "default_gateway_host")]
    pub host: String,

    /// Port to bind.
    #[serde(default = "default_gateway_port")]
    pub port: u16,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            enabled: default_gateway_enabled(),
            host: default_gateway_host(),
            port: default_gateway_port(),
        }
    }
}

fn default_gateway_enabled() -> bool {
    true
}

fn default_gateway_host() -> String {
    "127.0.0.1".to_string()
}

fn default_gateway_port() -> u16 {
    8480
}

/// Delivery provider client configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderConfig {
    /// Base URL of the delivery provider API.
    #[serde(default = "default_provider_base_url")]
    pub base_url: String,

    /// API key for the provider. `None` requires the environment variable.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Per-request timeout in seconds.
    #[serde(default = "default_provider_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: default_provider_base_url(),
            api_key: None,
            timeout_secs: default_provider_timeout_secs(),
        }
    }
}

fn default_provider_base_url() -> String {
    "http://127.0.0.1:9700".to_string()
}

fn default_provider_timeout_secs() -> u64 {
    30
}

/// Prometheus metrics configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PrometheusConfig {
    /// Enable the Prometheus recorder and `/metrics` endpoint.
    #[serde(default = "default_prometheus_enabled")]
    pub enabled: bool,
}

impl Default for PrometheusConfig {
    fn default() -> Self {
        Self {
            enabled: default_prometheus_enabled(),
        }
    }
}

fn default_prometheus_enabled() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let config = HeraldConfig::default();
        assert_eq!(config.service.name, "herald");
        assert_eq!(config.queue.retry_attempts, 3);
        assert_eq!(config.queue.retry_delay_ms, 1000);
        assert_eq!(config.queue.idle_poll_ms, 100);
        assert_eq!(config.scheduler.poll_interval_secs, 60);
        assert_eq!(config.scheduler.horizon_hours, 24);
        assert_eq!(config.scheduler.default_timezone, "UTC");
        assert_eq!(config.supervisor.recycle_interval_hours, 24);
        assert_eq!(config.listener.backoff_secs, 60);
    }

    #[test]
    fn unknown_section_key_is_rejected() {
        let result: Result<QueueConfig, _> =
            toml::from_str("max_quue_size = 10\n");
        assert!(result.is_err(), "deny_unknown_fields must reject typos");
    }

    #[test]
    fn partial_section_fills_defaults() {
        let queue: QueueConfig = toml::from_str("max_concurrent = 2\n").unwrap();
        assert_eq!(queue.max_concurrent, 2);
        assert_eq!(queue.max_queue_size, 1000);
        assert_eq!(queue.retry_attempts, 3);
    }
}
