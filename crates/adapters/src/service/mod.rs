// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Service HTTP client port.
//!
//! Each worker hosts its own Service instance behind an authenticated HTTPS
//! API; a factory pins a client to the worker's endpoint. Older Service
//! versions lack some endpoints, so the optional getters yield `None` on 404
//! instead of failing.

#[cfg(any(test, feature = "test-support"))]
pub mod fake;
mod http;
mod parse;

pub use http::HttpServiceClient;
pub use parse::{extract_labs_count, lab_observation};

use async_trait::async_trait;
use labfleet_core::LabObservation;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Error classification for Service calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntegrationErrorKind {
    Timeout,
    Connect,
    Auth,
    NotFound,
    Protocol,
    Other,
}

/// A failed Service call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("service {kind:?}: {message}")]
pub struct IntegrationError {
    pub kind: IntegrationErrorKind,
    pub message: String,
}

impl IntegrationError {
    pub fn new(kind: IntegrationErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(IntegrationErrorKind::Timeout, message)
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::new(IntegrationErrorKind::Auth, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(IntegrationErrorKind::NotFound, message)
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        Self::new(IntegrationErrorKind::Protocol, message)
    }
}

impl From<reqwest::Error> for IntegrationError {
    fn from(err: reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            IntegrationErrorKind::Timeout
        } else if err.is_connect() {
            IntegrationErrorKind::Connect
        } else {
            IntegrationErrorKind::Other
        };
        Self::new(kind, err.to_string())
    }
}

/// System identification reported by the Service.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SystemInformation {
    pub version: Option<String>,
    pub ready: bool,
    pub raw: serde_json::Value,
}

/// Credentials for the Service admin account.
#[derive(Debug, Clone, Default)]
pub struct ServiceCredentials {
    pub username: String,
    pub password: String,
}

/// The per-worker Service API.
#[async_trait]
pub trait ServiceApi: Send + Sync {
    /// Acquire (or refresh) a bearer token for this endpoint.
    async fn authenticate(&self) -> Result<(), IntegrationError>;

    /// Unauthenticated; works even before initial Service setup.
    async fn get_system_information(&self) -> Result<SystemInformation, IntegrationError>;

    async fn get_system_health(&self) -> Result<Option<serde_json::Value>, IntegrationError>;

    async fn get_system_stats(&self) -> Result<Option<serde_json::Value>, IntegrationError>;

    async fn get_licensing(&self) -> Result<Option<serde_json::Value>, IntegrationError>;

    async fn list_labs(&self) -> Result<Vec<LabObservation>, IntegrationError>;

    async fn delete_lab(&self, lab_id: &str) -> Result<(), IntegrationError>;
}

/// Produces a Service client pinned to a worker's endpoint.
pub trait ServiceClientFactory: Send + Sync {
    fn for_endpoint(&self, base_url: &str) -> Arc<dyn ServiceApi>;
}

/// Bearer tokens cached per endpoint, shared by all clients of a factory.
#[derive(Clone, Default)]
pub(crate) struct TokenCache {
    tokens: Arc<Mutex<HashMap<String, String>>>,
}

impl TokenCache {
    pub(crate) fn get(&self, endpoint: &str) -> Option<String> {
        self.tokens.lock().get(endpoint).cloned()
    }

    pub(crate) fn put(&self, endpoint: &str, token: String) {
        self.tokens.lock().insert(endpoint.to_string(), token);
    }

    pub(crate) fn invalidate(&self, endpoint: &str) {
        self.tokens.lock().remove(endpoint);
    }
}

/// Factory for [`HttpServiceClient`]s sharing one connection pool and token
/// cache.
pub struct HttpServiceFactory {
    http: reqwest::Client,
    credentials: ServiceCredentials,
    tokens: TokenCache,
}

impl HttpServiceFactory {
    pub fn new(
        credentials: ServiceCredentials,
        timeout: std::time::Duration,
        tls_verify: bool,
    ) -> Result<Self, IntegrationError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .danger_accept_invalid_certs(!tls_verify)
            .build()
            .map_err(|e| IntegrationError::new(IntegrationErrorKind::Other, e.to_string()))?;
        Ok(Self {
            http,
            credentials,
            tokens: TokenCache::default(),
        })
    }
}

impl ServiceClientFactory for HttpServiceFactory {
    fn for_endpoint(&self, base_url: &str) -> Arc<dyn ServiceApi> {
        Arc::new(HttpServiceClient::new(
            base_url,
            self.http.clone(),
            self.credentials.clone(),
            self.tokens.clone(),
        ))
    }
}
