// SPDX-FileCopyrightText: 2026 Soporte Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs.
//!
//! All structs use `#[serde(deny_unknown_fields)]` so a mistyped key is an
//! error at startup instead of a silently ignored setting.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level Soporte configuration. Every section defaults.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SoporteConfig {
    /// Client-wide settings.
    #[serde(default)]
    pub client: ClientConfig,

    /// REST collaborator settings.
    #[serde(default)]
    pub api: ApiConfig,

    /// Real-time transport settings.
    #[serde(default)]
    pub realtime: RealtimeConfig,

    /// Refresh, polling, and optimistic reconciliation settings.
    #[serde(default)]
    pub sync: SyncConfig,

    /// Entity store settings.
    #[serde(default)]
    pub store: StoreConfig,

    /// Session credential persistence.
    #[serde(default)]
    pub session: SessionConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// REST collaborator configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ApiConfig {
    /// Backend origin, e.g. `https://soporte.example.com`. Paths start at `/api`.
    #[serde(default = "default_api_base_url")]
    pub base_url: String,

    /// Timeout for every REST call.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Timeout for recommendation lookups. Exceeding it skips the ticket.
    #[serde(default = "default_recommendation_timeout_secs")]
    pub recommendation_timeout_secs: u64,
}

impl ApiConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn recommendation_timeout(&self) -> Duration {
        Duration::from_secs(self.recommendation_timeout_secs)
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_api_base_url(),
            request_timeout_secs: default_request_timeout_secs(),
            recommendation_timeout_secs: default_recommendation_timeout_secs(),
        }
    }
}

fn default_api_base_url() -> String {
    "http://127.0.0.1:3001".to_string()
}

fn default_request_timeout_secs() -> u64 {
    15
}

fn default_recommendation_timeout_secs() -> u64 {
    8
}

/// Real-time transport configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RealtimeConfig {
    /// WebSocket endpoint of the pub/sub collaborator.
    #[serde(default = "default_realtime_url")]
    pub url: String,

    /// Upper bound on connect + authenticate.
    #[serde(default = "default_handshake_timeout_secs")]
    pub handshake_timeout_secs: u64,
}

impl RealtimeConfig {
    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_secs(self.handshake_timeout_secs)
    }
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            url: default_realtime_url(),
            handshake_timeout_secs: default_handshake_timeout_secs(),
        }
    }
}

fn default_realtime_url() -> String {
    "ws://127.0.0.1:3001/realtime".to_string()
}

fn default_handshake_timeout_secs() -> u64 {
    10
}

/// Sync orchestration configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SyncConfig {
    /// Enables the timer-based polling fallback.
    #[serde(default = "default_polling_enabled")]
    pub polling_enabled: bool,

    /// Polling interval.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Refresh a domain whenever an inbound event touches it.
    #[serde(default = "default_refresh_on_event")]
    pub refresh_on_event: bool,

    /// Delay before the reconciling re-fetch that follows a confirmed action.
    #[serde(default = "default_reconcile_debounce_ms")]
    pub reconcile_debounce_ms: u64,

    /// How long an optimistic comment may be matched against an inbound
    /// event for the persisted comment.
    #[serde(default = "default_optimistic_match_window_secs")]
    pub optimistic_match_window_secs: u64,
}

impl SyncConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn reconcile_debounce(&self) -> Duration {
        Duration::from_millis(self.reconcile_debounce_ms)
    }

    pub fn optimistic_match_window(&self) -> Duration {
        Duration::from_secs(self.optimistic_match_window_secs)
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            polling_enabled: default_polling_enabled(),
            poll_interval_secs: default_poll_interval_secs(),
            refresh_on_event: default_refresh_on_event(),
            reconcile_debounce_ms: default_reconcile_debounce_ms(),
            optimistic_match_window_secs: default_optimistic_match_window_secs(),
        }
    }
}

fn default_polling_enabled() -> bool {
    true
}

fn default_poll_interval_secs() -> u64 {
    30
}

fn default_refresh_on_event() -> bool {
    true
}

fn default_reconcile_debounce_ms() -> u64 {
    750
}

fn default_optimistic_match_window_secs() -> u64 {
    30
}

/// Entity store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    /// Maximum retained entries in the inbound notification log.
    #[serde(default = "default_notification_capacity")]
    pub notification_capacity: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            notification_capacity: default_notification_capacity(),
        }
    }
}

fn default_notification_capacity() -> usize {
    500
}

/// Credential persistence configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SessionConfig {
    /// Directory holding role-keyed credential files.
    #[serde(default = "default_credential_dir")]
    pub credential_dir: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            credential_dir: default_credential_dir(),
        }
    }
}

fn default_credential_dir() -> String {
    dirs::data_dir()
        .map(|p| p.join("soporte").join("session"))
        .unwrap_or_else(|| std::path::PathBuf::from(".soporte-session"))
        .to_string_lossy()
        .into_owned()
}
