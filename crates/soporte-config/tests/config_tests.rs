// SPDX-FileCopyrightText: 2026 Soporte Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the Soporte configuration system.

use std::path::Path;

use figment::Jail;
use soporte_config::diagnostic::ConfigError;
use soporte_config::{
    load_and_validate_path, load_and_validate_str, load_config_from_path, load_config_from_str,
};

#[test]
fn full_toml_deserializes() {
    let toml = r#"
[client]
log_level = "debug"

[api]
base_url = "https://soporte.example.com"
request_timeout_secs = 20
recommendation_timeout_secs = 3

[realtime]
url = "wss://soporte.example.com/realtime"
handshake_timeout_secs = 4

[sync]
polling_enabled = false
poll_interval_secs = 60
refresh_on_event = false
reconcile_debounce_ms = 100
optimistic_match_window_secs = 10

[store]
notification_capacity = 50

[session]
credential_dir = "/tmp/soporte-session"
"#;

    let config = load_config_from_str(toml).expect("valid TOML should deserialize");
    assert_eq!(config.client.log_level, "debug");
    assert_eq!(config.api.base_url, "https://soporte.example.com");
    assert_eq!(config.api.request_timeout().as_secs(), 20);
    assert_eq!(config.api.recommendation_timeout().as_secs(), 3);
    assert_eq!(config.realtime.url, "wss://soporte.example.com/realtime");
    assert_eq!(config.realtime.handshake_timeout().as_secs(), 4);
    assert!(!config.sync.polling_enabled);
    assert_eq!(config.sync.poll_interval().as_secs(), 60);
    assert!(!config.sync.refresh_on_event);
    assert_eq!(config.sync.reconcile_debounce().as_millis(), 100);
    assert_eq!(config.sync.optimistic_match_window().as_secs(), 10);
    assert_eq!(config.store.notification_capacity, 50);
    assert_eq!(config.session.credential_dir, "/tmp/soporte-session");
}

#[test]
fn empty_toml_uses_defaults() {
    let config = load_config_from_str("").expect("empty TOML should use defaults");
    assert_eq!(config.client.log_level, "info");
    assert_eq!(config.api.base_url, "http://127.0.0.1:3001");
    assert_eq!(config.api.request_timeout_secs, 15);
    assert_eq!(config.realtime.url, "ws://127.0.0.1:3001/realtime");
    assert!(config.sync.polling_enabled);
    assert_eq!(config.sync.poll_interval_secs, 30);
    assert!(config.sync.refresh_on_event);
    assert_eq!(config.store.notification_capacity, 500);
    assert!(!config.session.credential_dir.is_empty());
}

#[test]
fn unknown_key_is_rejected() {
    let err = load_config_from_str("[sync]\npol_interval_secs = 5\n")
        .expect_err("should reject unknown field");
    let msg = err.to_string();
    assert!(
        msg.contains("unknown field") || msg.contains("pol_interval_secs"),
        "got: {msg}"
    );
}

#[test]
fn unknown_key_produces_suggestion() {
    let errors = load_and_validate_str("[api]\nbase_ulr = \"http://x\"\n").unwrap_err();
    assert_eq!(errors.len(), 1);
    match &errors[0] {
        ConfigError::UnknownKey {
            key, suggestion, ..
        } => {
            assert_eq!(key, "base_ulr");
            assert_eq!(suggestion.as_deref(), Some("base_url"));
        }
        other => panic!("expected UnknownKey, got {other:?}"),
    }
}

#[test]
fn wrong_type_is_reported() {
    let errors = load_and_validate_str("[sync]\npoll_interval_secs = \"soon\"\n").unwrap_err();
    assert!(
        matches!(errors[0], ConfigError::InvalidType { .. }),
        "got {:?}",
        errors[0]
    );
}

#[test]
fn validation_runs_after_parse() {
    let errors = load_and_validate_str("[realtime]\nurl = \"http://nope\"\n").unwrap_err();
    assert!(matches!(errors[0], ConfigError::Validation { .. }));
}

#[test]
fn env_overrides_file() {
    Jail::expect_with(|jail| {
        jail.create_file(
            "soporte.toml",
            r#"
[api]
base_url = "http://from-file"

[sync]
poll_interval_secs = 12
"#,
        )?;
        jail.set_env("SOPORTE_API_BASE_URL", "https://from-env");
        jail.set_env("SOPORTE_SYNC_REFRESH_ON_EVENT", "false");

        let config = load_config_from_path(Path::new("soporte.toml"))?;
        assert_eq!(config.api.base_url, "https://from-env");
        assert_eq!(config.sync.poll_interval_secs, 12);
        assert!(!config.sync.refresh_on_event);
        Ok(())
    });
}

#[test]
fn file_diagnostics_carry_spans() {
    Jail::expect_with(|jail| {
        jail.create_file("soporte.toml", "[client]\nlog_levle = \"info\"\n")?;
        let errors = load_and_validate_path(Path::new("soporte.toml")).unwrap_err();
        match &errors[0] {
            ConfigError::UnknownKey {
                suggestion, span, ..
            } => {
                assert_eq!(suggestion.as_deref(), Some("log_level"));
                assert!(span.is_some());
            }
            other => panic!("expected UnknownKey, got {other:?}"),
        }
        Ok(())
    });
}
