// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scripted in-memory Service for tests.

use super::{
    IntegrationError, ServiceApi, ServiceClientFactory, SystemInformation,
};
use async_trait::async_trait;
use labfleet_core::LabObservation;
use parking_lot::Mutex;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;

/// A recorded Service call, for assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceCall {
    Authenticate,
    SystemInformation,
    SystemHealth,
    SystemStats,
    Licensing,
    ListLabs,
    DeleteLab(String),
}

struct FakeServiceState {
    calls: Vec<ServiceCall>,
    info: Result<SystemInformation, IntegrationError>,
    health: Result<Option<serde_json::Value>, IntegrationError>,
    stats: Result<Option<serde_json::Value>, IntegrationError>,
    licensing: Result<Option<serde_json::Value>, IntegrationError>,
    labs: Result<Vec<LabObservation>, IntegrationError>,
    delete_results: HashMap<String, Result<(), IntegrationError>>,
}

impl Default for FakeServiceState {
    fn default() -> Self {
        Self {
            calls: Vec::new(),
            info: Ok(SystemInformation {
                version: Some("2.7.0".to_string()),
                ready: true,
                raw: json!({"version": "2.7.0", "ready": true}),
            }),
            health: Ok(Some(json!({"valid": true}))),
            stats: Ok(Some(json!({}))),
            licensing: Ok(Some(json!({}))),
            labs: Ok(Vec::new()),
            delete_results: HashMap::new(),
        }
    }
}

/// Fake Service with scripted responses and call recording.
#[derive(Clone, Default)]
pub struct FakeService {
    state: Arc<Mutex<FakeServiceState>>,
}

impl FakeService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<ServiceCall> {
        self.state.lock().calls.clone()
    }

    pub fn set_info(&self, result: Result<SystemInformation, IntegrationError>) {
        self.state.lock().info = result;
    }

    pub fn set_health(&self, result: Result<Option<serde_json::Value>, IntegrationError>) {
        self.state.lock().health = result;
    }

    pub fn set_stats(&self, result: Result<Option<serde_json::Value>, IntegrationError>) {
        self.state.lock().stats = result;
    }

    pub fn set_licensing(&self, result: Result<Option<serde_json::Value>, IntegrationError>) {
        self.state.lock().licensing = result;
    }

    pub fn set_labs(&self, result: Result<Vec<LabObservation>, IntegrationError>) {
        self.state.lock().labs = result;
    }

    pub fn set_delete_result(&self, lab_id: &str, result: Result<(), IntegrationError>) {
        self.state
            .lock()
            .delete_results
            .insert(lab_id.to_string(), result);
    }

    /// Script everything to fail the same way.
    pub fn fail_all(&self, error: IntegrationError) {
        let mut state = self.state.lock();
        state.info = Err(error.clone());
        state.health = Err(error.clone());
        state.stats = Err(error.clone());
        state.licensing = Err(error.clone());
        state.labs = Err(error);
    }
}

#[async_trait]
impl ServiceApi for FakeService {
    async fn authenticate(&self) -> Result<(), IntegrationError> {
        self.state.lock().calls.push(ServiceCall::Authenticate);
        Ok(())
    }

    async fn get_system_information(&self) -> Result<SystemInformation, IntegrationError> {
        let mut state = self.state.lock();
        state.calls.push(ServiceCall::SystemInformation);
        state.info.clone()
    }

    async fn get_system_health(&self) -> Result<Option<serde_json::Value>, IntegrationError> {
        let mut state = self.state.lock();
        state.calls.push(ServiceCall::SystemHealth);
        state.health.clone()
    }

    async fn get_system_stats(&self) -> Result<Option<serde_json::Value>, IntegrationError> {
        let mut state = self.state.lock();
        state.calls.push(ServiceCall::SystemStats);
        state.stats.clone()
    }

    async fn get_licensing(&self) -> Result<Option<serde_json::Value>, IntegrationError> {
        let mut state = self.state.lock();
        state.calls.push(ServiceCall::Licensing);
        state.licensing.clone()
    }

    async fn list_labs(&self) -> Result<Vec<LabObservation>, IntegrationError> {
        let mut state = self.state.lock();
        state.calls.push(ServiceCall::ListLabs);
        state.labs.clone()
    }

    async fn delete_lab(&self, lab_id: &str) -> Result<(), IntegrationError> {
        let mut state = self.state.lock();
        state.calls.push(ServiceCall::DeleteLab(lab_id.to_string()));
        state
            .delete_results
            .get(lab_id)
            .cloned()
            .unwrap_or(Ok(()))
    }
}

/// Factory handing out the same [`FakeService`] per endpoint; unknown
/// endpoints get the shared default instance.
#[derive(Clone, Default)]
pub struct FakeServiceFactory {
    default: FakeService,
    by_endpoint: Arc<Mutex<HashMap<String, FakeService>>>,
}

impl FakeServiceFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// The instance handed out for endpoints without an explicit register.
    pub fn default_service(&self) -> FakeService {
        self.default.clone()
    }

    pub fn register(&self, endpoint: &str, service: FakeService) {
        self.by_endpoint
            .lock()
            .insert(endpoint.to_string(), service);
    }
}

impl ServiceClientFactory for FakeServiceFactory {
    fn for_endpoint(&self, base_url: &str) -> Arc<dyn ServiceApi> {
        let service = self
            .by_endpoint
            .lock()
            .get(base_url)
            .cloned()
            .unwrap_or_else(|| self.default.clone());
        Arc::new(service)
    }
}
