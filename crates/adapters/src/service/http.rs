// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! reqwest-backed Service client.

use super::parse::lab_observation;
use super::{
    IntegrationError, ServiceApi, ServiceCredentials, SystemInformation, TokenCache,
};
use async_trait::async_trait;
use labfleet_core::LabObservation;
use reqwest::StatusCode;
use serde_json::json;

/// Client pinned to one worker's Service endpoint.
///
/// Token acquisition is lazy: the first authenticated call logs in, and a
/// 401 triggers exactly one re-auth followed by a single retry.
pub struct HttpServiceClient {
    base: String,
    http: reqwest::Client,
    credentials: ServiceCredentials,
    tokens: TokenCache,
}

impl HttpServiceClient {
    pub(crate) fn new(
        base_url: &str,
        http: reqwest::Client,
        credentials: ServiceCredentials,
        tokens: TokenCache,
    ) -> Self {
        Self {
            base: base_url.trim_end_matches('/').to_string(),
            http,
            credentials,
            tokens,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    async fn fetch_token(&self) -> Result<String, IntegrationError> {
        let resp = self
            .http
            .post(self.url("/api/v0/authenticate"))
            .json(&json!({
                "username": self.credentials.username,
                "password": self.credentials.password,
            }))
            .send()
            .await?;
        if resp.status() == StatusCode::FORBIDDEN || resp.status() == StatusCode::UNAUTHORIZED {
            return Err(IntegrationError::auth("authentication rejected"));
        }
        if !resp.status().is_success() {
            return Err(IntegrationError::protocol(format!(
                "authenticate returned {}",
                resp.status()
            )));
        }
        let token: String = resp
            .json()
            .await
            .map_err(|e| IntegrationError::protocol(format!("bad token body: {e}")))?;
        self.tokens.put(&self.base, token.clone());
        Ok(token)
    }

    async fn ensure_token(&self) -> Result<String, IntegrationError> {
        match self.tokens.get(&self.base) {
            Some(token) => Ok(token),
            None => self.fetch_token().await,
        }
    }

    /// GET with bearer auth; one re-auth + retry on 401.
    async fn authed_get(&self, path: &str) -> Result<reqwest::Response, IntegrationError> {
        let token = self.ensure_token().await?;
        let resp = self
            .http
            .get(self.url(path))
            .bearer_auth(&token)
            .send()
            .await?;
        if resp.status() != StatusCode::UNAUTHORIZED {
            return Ok(resp);
        }

        self.tokens.invalidate(&self.base);
        let token = self.fetch_token().await?;
        let resp = self
            .http
            .get(self.url(path))
            .bearer_auth(&token)
            .send()
            .await?;
        if resp.status() == StatusCode::UNAUTHORIZED {
            return Err(IntegrationError::auth(format!(
                "{path} rejected a fresh token"
            )));
        }
        Ok(resp)
    }

    /// Authenticated GET where a 404 means "endpoint not present on this
    /// Service version".
    async fn optional_get(
        &self,
        path: &str,
    ) -> Result<Option<serde_json::Value>, IntegrationError> {
        let resp = self.authed_get(path).await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !resp.status().is_success() {
            return Err(IntegrationError::protocol(format!(
                "{path} returned {}",
                resp.status()
            )));
        }
        let body = resp
            .json()
            .await
            .map_err(|e| IntegrationError::protocol(format!("{path}: {e}")))?;
        Ok(Some(body))
    }
}

#[async_trait]
impl ServiceApi for HttpServiceClient {
    async fn authenticate(&self) -> Result<(), IntegrationError> {
        self.fetch_token().await.map(|_| ())
    }

    async fn get_system_information(&self) -> Result<SystemInformation, IntegrationError> {
        let resp = self.http.get(self.url("/api/v0/system_information")).send().await?;
        if !resp.status().is_success() {
            return Err(IntegrationError::protocol(format!(
                "system_information returned {}",
                resp.status()
            )));
        }
        let raw: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| IntegrationError::protocol(format!("system_information: {e}")))?;
        Ok(SystemInformation {
            version: raw
                .get("version")
                .and_then(|v| v.as_str())
                .map(str::to_string),
            ready: raw.get("ready").and_then(|v| v.as_bool()).unwrap_or(false),
            raw,
        })
    }

    async fn get_system_health(&self) -> Result<Option<serde_json::Value>, IntegrationError> {
        self.optional_get("/api/v0/system_health").await
    }

    async fn get_system_stats(&self) -> Result<Option<serde_json::Value>, IntegrationError> {
        self.optional_get("/api/v0/system_stats").await
    }

    async fn get_licensing(&self) -> Result<Option<serde_json::Value>, IntegrationError> {
        self.optional_get("/api/v0/licensing").await
    }

    async fn list_labs(&self) -> Result<Vec<LabObservation>, IntegrationError> {
        let resp = self.authed_get("/api/v0/labs?show_all=true").await?;
        if !resp.status().is_success() {
            return Err(IntegrationError::protocol(format!(
                "labs returned {}",
                resp.status()
            )));
        }
        let body: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| IntegrationError::protocol(format!("labs: {e}")))?;
        let items = body
            .as_array()
            .ok_or_else(|| IntegrationError::protocol("labs: expected an array"))?;

        let mut labs = Vec::with_capacity(items.len());
        for item in items {
            match item {
                // Newer versions return lab objects directly
                serde_json::Value::Object(_) => {
                    if let Some(obs) = lab_observation(item) {
                        labs.push(obs);
                    }
                }
                // Older versions return ids; fetch each lab's detail
                serde_json::Value::String(id) => {
                    if let Some(detail) = self.optional_get(&format!("/api/v0/labs/{id}")).await? {
                        if let Some(obs) = lab_observation(&detail) {
                            labs.push(obs);
                        }
                    }
                }
                _ => {}
            }
        }
        Ok(labs)
    }

    async fn delete_lab(&self, lab_id: &str) -> Result<(), IntegrationError> {
        let token = self.ensure_token().await?;
        let path = format!("/api/v0/labs/{lab_id}");
        let resp = self
            .http
            .delete(self.url(&path))
            .bearer_auth(&token)
            .send()
            .await?;
        match resp.status() {
            s if s.is_success() => Ok(()),
            StatusCode::NOT_FOUND => Err(IntegrationError::not_found(format!(
                "lab {lab_id} not found"
            ))),
            StatusCode::UNAUTHORIZED => {
                self.tokens.invalidate(&self.base);
                let token = self.fetch_token().await?;
                let resp = self
                    .http
                    .delete(self.url(&path))
                    .bearer_auth(&token)
                    .send()
                    .await?;
                match resp.status() {
                    s if s.is_success() => Ok(()),
                    StatusCode::NOT_FOUND => Err(IntegrationError::not_found(format!(
                        "lab {lab_id} not found"
                    ))),
                    s => Err(IntegrationError::protocol(format!("delete returned {s}"))),
                }
            }
            s => Err(IntegrationError::protocol(format!("delete returned {s}"))),
        }
    }
}
