// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde
//! attributes, such as positive bounds and well-formed addresses.

use crate::diagnostic::ConfigError;
use crate::model::HeraldConfig;

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &HeraldConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    // Validate gateway.host is not empty and looks like an IP or hostname.
    let host = config.gateway.host.trim();
    if host.is_empty() {
        errors.push(ConfigError::Validation {
            message: "gateway.host must not be empty".to_string(),
        });
    } else {
        let is_valid_ip = host.parse::<std::net::IpAddr>().is_ok();
        let is_valid_hostname = host
            .chars()
            .all(|c| c.is_alphanumeric() || c == '.' || c == '-' || c == ':');
        if !is_valid_ip && !is_valid_hostname {
            errors.push(ConfigError::Validation {
                message: format!(
                    "gateway.host `{host}` is not a valid IP address or hostname"
                ),
            });
        }
    }

    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "storage.database_path must not be empty".to_string(),
        });
    }

    if config.queue.max_queue_size == 0 {
        errors.push(ConfigError::Validation {
            message: "queue.max_queue_size must be at least 1".to_string(),
        });
    }

    if config.queue.max_concurrent == 0 {
        errors.push(ConfigError::Validation {
            message: "queue.max_concurrent must be at least 1".to_string(),
        });
    }

    if config.queue.retry_delay_ms == 0 {
        errors.push(ConfigError::Validation {
            message: "queue.retry_delay_ms must be at least 1".to_string(),
        });
    }

    if config.scheduler.poll_interval_secs == 0 {
        errors.push(ConfigError::Validation {
            message: "scheduler.poll_interval_secs must be at least 1".to_string(),
        });
    }

    if config.scheduler.batch_size == 0 {
        errors.push(ConfigError::Validation {
            message: "scheduler.batch_size must be at least 1".to_string(),
        });
    }

    if config.supervisor.stop_timeout_secs == 0 {
        errors.push(ConfigError::Validation {
            message: "supervisor.stop_timeout_secs must be at least 1".to_string(),
        });
    }

    let base_url = config.provider.base_url.trim();
    if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
        errors.push(ConfigError::Validation {
            message: format!(
                "provider.base_url `{base_url}` must start with http:// or https://"
            ),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
