// SPDX-FileCopyrightText: 2026 Soporte Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation.
//!
//! Collects every violation instead of stopping at the first one.

use crate::diagnostic::ConfigError;
use crate::model::SoporteConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validates semantic constraints serde cannot express.
pub fn validate_config(config: &SoporteConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if !LOG_LEVELS.contains(&config.client.log_level.as_str()) {
        errors.push(ConfigError::validation(format!(
            "client.log_level `{}` is not one of {}",
            config.client.log_level,
            LOG_LEVELS.join(", ")
        )));
    }

    let base_url = config.api.base_url.trim();
    if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
        errors.push(ConfigError::validation(format!(
            "api.base_url `{base_url}` must start with http:// or https://"
        )));
    }

    let ws_url = config.realtime.url.trim();
    if !(ws_url.starts_with("ws://") || ws_url.starts_with("wss://")) {
        errors.push(ConfigError::validation(format!(
            "realtime.url `{ws_url}` must start with ws:// or wss://"
        )));
    }

    for (key, value) in [
        ("api.request_timeout_secs", config.api.request_timeout_secs),
        (
            "api.recommendation_timeout_secs",
            config.api.recommendation_timeout_secs,
        ),
        (
            "realtime.handshake_timeout_secs",
            config.realtime.handshake_timeout_secs,
        ),
    ] {
        if value == 0 {
            errors.push(ConfigError::validation(format!(
                "{key} must be greater than zero"
            )));
        }
    }

    if config.sync.polling_enabled && config.sync.poll_interval_secs == 0 {
        errors.push(ConfigError::validation(
            "sync.poll_interval_secs must be greater than zero when polling is enabled",
        ));
    }

    if config.store.notification_capacity == 0 {
        errors.push(ConfigError::validation(
            "store.notification_capacity must be at least 1",
        ));
    }

    if config.session.credential_dir.trim().is_empty() {
        errors.push(ConfigError::validation(
            "session.credential_dir must not be empty",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
