// SPDX-FileCopyrightText: 2026 Soporte Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Layered configuration loading with Figment.
//!
//! `./soporte.toml` > `~/.config/soporte/soporte.toml` > `/etc/soporte/soporte.toml`,
//! with `SOPORTE_*` environment variables on top.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::SoporteConfig;

/// Top-level sections, used to turn `SOPORTE_API_BASE_URL` into `api.base_url`.
const SECTIONS: &[&str] = &["client", "api", "realtime", "sync", "store", "session"];

/// Loads configuration from the standard hierarchy plus environment.
pub fn load_config() -> Result<SoporteConfig, figment::Error> {
    build_figment().extract()
}

/// Loads configuration from a TOML string only. Used by tests.
pub fn load_config_from_str(toml_content: &str) -> Result<SoporteConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(SoporteConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Loads configuration from one file with environment overrides.
pub fn load_config_from_path(path: &Path) -> Result<SoporteConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(SoporteConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// The un-extracted Figment for the standard hierarchy.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(SoporteConfig::default()))
        .merge(Toml::file("/etc/soporte/soporte.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("soporte/soporte.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("soporte.toml"))
        .merge(env_provider())
}

/// Maps `SOPORTE_<SECTION>_<KEY>` to `<section>.<key>`.
///
/// Only the first underscore after a known section name becomes a dot, so
/// `SOPORTE_SYNC_POLL_INTERVAL_SECS` lands on `sync.poll_interval_secs`.
pub(crate) fn env_provider() -> Env {
    Env::prefixed("SOPORTE_").map(|key| map_env_key(key.as_str()).into())
}

pub(crate) fn map_env_key(key: &str) -> String {
    for section in SECTIONS {
        if let Some(rest) = key.strip_prefix(section)
            && let Some(field) = rest.strip_prefix('_')
        {
            return format!("{section}.{field}");
        }
    }
    key.to_string()
}
