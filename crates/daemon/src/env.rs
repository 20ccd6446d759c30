// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the daemon crate.

use std::path::PathBuf;
use std::time::Duration;

fn secs(var: &str, default: u64) -> Duration {
    std::env::var(var)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(Duration::from_secs(default))
}

fn flag(var: &str) -> bool {
    std::env::var(var)
        .map(|s| matches!(s.as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}

/// Worker cloud-metrics poll interval (default 300 s).
pub fn metrics_poll_interval() -> Duration {
    secs("WORKER_METRICS_POLL_INTERVAL", 300)
}

/// Labs refresh interval (default 1800 s).
pub fn labs_refresh_interval() -> Duration {
    secs("LABS_REFRESH_INTERVAL", 1800)
}

/// Activity detection interval (default 600 s).
pub fn activity_detection_interval() -> Duration {
    secs("ACTIVITY_DETECTION_INTERVAL", 600)
}

/// Whether the auto-import job is registered at all.
pub fn auto_import_enabled() -> bool {
    flag("AUTO_IMPORT_WORKERS_ENABLED")
}

/// Auto-import sweep interval (default 3600 s).
pub fn auto_import_interval() -> Duration {
    secs("AUTO_IMPORT_WORKERS_INTERVAL", 3600)
}

pub fn auto_import_region() -> Option<String> {
    std::env::var("AUTO_IMPORT_WORKERS_REGION").ok().filter(|s| !s.is_empty())
}

pub fn auto_import_image_name() -> Option<String> {
    std::env::var("AUTO_IMPORT_WORKERS_IMAGE_NAME").ok().filter(|s| !s.is_empty())
}

/// Per-request Service API timeout (default 15 s).
pub fn service_api_timeout() -> Duration {
    secs("SERVICE_API_TIMEOUT", 15)
}

/// Service admin credentials. Loaded here; validation is the Service's job.
pub fn service_credentials() -> (String, String) {
    (
        std::env::var("SERVICE_API_USERNAME").unwrap_or_else(|_| "admin".to_string()),
        std::env::var("SERVICE_API_PASSWORD").unwrap_or_default(),
    )
}

/// Per-worker minimum interval between refreshes of one kind (default 60 s).
pub fn worker_refresh_throttle() -> Duration {
    secs("WORKER_REFRESH_THROTTLE", 60)
}

/// Idle window before auto-pause considers a worker idle (default 1800 s).
pub fn worker_idle_window() -> Duration {
    secs("WORKER_IDLE_WINDOW", 1800)
}

/// Shutdown drain grace (default 30 s).
pub fn shutdown_grace() -> Duration {
    secs("SHUTDOWN_GRACE", 30)
}

/// Per-subscriber envelope queue bound (default 1024).
pub fn subscriber_queue() -> usize {
    std::env::var("SUBSCRIBER_QUEUE")
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .filter(|n| *n > 0)
        .unwrap_or(1024)
}

/// Periodic snapshot interval (default 300 s).
pub fn snapshot_interval() -> Duration {
    secs("SNAPSHOT_INTERVAL", 300)
}

/// State directory: LABFLEET_STATE_DIR > XDG_STATE_HOME/labfleet >
/// ~/.local/state/labfleet
pub fn state_dir() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var("LABFLEET_STATE_DIR") {
        return Some(PathBuf::from(dir));
    }
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return Some(PathBuf::from(xdg).join("labfleet"));
    }
    std::env::var("HOME")
        .ok()
        .map(|home| PathBuf::from(home).join(".local/state/labfleet"))
}

/// HTTP bind address (default 127.0.0.1:8200).
pub fn http_addr() -> String {
    std::env::var("LABFLEET_HTTP_ADDR").unwrap_or_else(|_| "127.0.0.1:8200".to_string())
}

/// Static bearer token for the HTTP API. When unset the API is open, which
/// is only sensible for local development.
pub fn auth_token() -> Option<String> {
    std::env::var("LABFLEET_AUTH_TOKEN").ok().filter(|s| !s.is_empty())
}

/// TLS verification toggle for Service endpoints (default on).
pub fn tls_verify() -> bool {
    std::env::var("LABFLEET_TLS_VERIFY")
        .map(|s| !matches!(s.as_str(), "0" | "false" | "no"))
        .unwrap_or(true)
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
