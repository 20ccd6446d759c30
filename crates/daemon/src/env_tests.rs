// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serial_test::serial;

#[test]
#[serial]
fn intervals_fall_back_to_defaults() {
    std::env::remove_var("WORKER_METRICS_POLL_INTERVAL");
    std::env::remove_var("LABS_REFRESH_INTERVAL");
    assert_eq!(metrics_poll_interval(), Duration::from_secs(300));
    assert_eq!(labs_refresh_interval(), Duration::from_secs(1800));
    assert_eq!(activity_detection_interval(), Duration::from_secs(600));
    assert_eq!(worker_refresh_throttle(), Duration::from_secs(60));
    assert_eq!(shutdown_grace(), Duration::from_secs(30));
    assert_eq!(subscriber_queue(), 1024);
}

#[test]
#[serial]
fn interval_overrides_parse_seconds() {
    std::env::set_var("WORKER_METRICS_POLL_INTERVAL", "30");
    assert_eq!(metrics_poll_interval(), Duration::from_secs(30));
    std::env::set_var("WORKER_METRICS_POLL_INTERVAL", "junk");
    assert_eq!(metrics_poll_interval(), Duration::from_secs(300));
    std::env::remove_var("WORKER_METRICS_POLL_INTERVAL");
}

#[test]
#[serial]
fn auto_import_is_opt_in() {
    std::env::remove_var("AUTO_IMPORT_WORKERS_ENABLED");
    assert!(!auto_import_enabled());
    std::env::set_var("AUTO_IMPORT_WORKERS_ENABLED", "true");
    assert!(auto_import_enabled());
    std::env::set_var("AUTO_IMPORT_WORKERS_ENABLED", "0");
    assert!(!auto_import_enabled());
    std::env::remove_var("AUTO_IMPORT_WORKERS_ENABLED");
}

#[test]
#[serial]
fn auth_token_ignores_empty() {
    std::env::set_var("LABFLEET_AUTH_TOKEN", "");
    assert!(auth_token().is_none());
    std::env::set_var("LABFLEET_AUTH_TOKEN", "secret");
    assert_eq!(auth_token().as_deref(), Some("secret"));
    std::env::remove_var("LABFLEET_AUTH_TOKEN");
}

#[test]
#[serial]
fn tls_verify_defaults_on() {
    std::env::remove_var("LABFLEET_TLS_VERIFY");
    assert!(tls_verify());
    std::env::set_var("LABFLEET_TLS_VERIFY", "false");
    assert!(!tls_verify());
    std::env::remove_var("LABFLEET_TLS_VERIFY");
}

#[test]
#[serial]
fn state_dir_prefers_explicit_override() {
    std::env::set_var("LABFLEET_STATE_DIR", "/tmp/labfleet-test");
    assert_eq!(state_dir(), Some(PathBuf::from("/tmp/labfleet-test")));
    std::env::remove_var("LABFLEET_STATE_DIR");
}
