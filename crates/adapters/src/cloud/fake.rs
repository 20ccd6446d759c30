// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scripted in-memory cloud for tests.

use super::{
    CloudCompute, CloudError, InstanceFilters, RunInstanceSpec, VmFacts, VmStatusDetail,
    VmUtilization,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

/// A recorded cloud call, for assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloudCall {
    DescribeImageIds { region: String, pattern: String },
    ListInstances { region: String },
    DescribeStatus { region: String, instance_id: String },
    RunInstance { region: String, image_id: String },
    Start { instance_id: String },
    Stop { instance_id: String },
    Terminate { instance_id: String },
    SetTags { instance_id: String },
    SetDetailedMonitoring { instance_id: String, enabled: bool },
    GetUtilization { instance_id: String },
}

#[derive(Default)]
struct FakeCloudState {
    calls: Vec<CloudCall>,
    image_ids: Vec<String>,
    instances: Vec<VmFacts>,
    run_results: VecDeque<Result<String, CloudError>>,
    statuses: HashMap<String, Result<VmStatusDetail, CloudError>>,
    utilization: HashMap<String, Result<VmUtilization, CloudError>>,
    lifecycle_error: Option<CloudError>,
}

/// Fake cloud with scripted responses and call recording.
#[derive(Clone, Default)]
pub struct FakeCloud {
    state: Arc<Mutex<FakeCloudState>>,
}

impl FakeCloud {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<CloudCall> {
        self.state.lock().calls.clone()
    }

    pub fn set_image_ids(&self, ids: Vec<&str>) {
        self.state.lock().image_ids = ids.into_iter().map(String::from).collect();
    }

    pub fn add_instance(&self, facts: VmFacts) {
        self.state.lock().instances.push(facts);
    }

    pub fn push_run_result(&self, result: Result<&str, CloudError>) {
        self.state
            .lock()
            .run_results
            .push_back(result.map(String::from));
    }

    pub fn set_status(&self, instance_id: &str, result: Result<VmStatusDetail, CloudError>) {
        self.state
            .lock()
            .statuses
            .insert(instance_id.to_string(), result);
    }

    pub fn set_utilization(&self, instance_id: &str, result: Result<VmUtilization, CloudError>) {
        self.state
            .lock()
            .utilization
            .insert(instance_id.to_string(), result);
    }

    /// Make start/stop/terminate fail with the given error.
    pub fn fail_lifecycle(&self, error: CloudError) {
        self.state.lock().lifecycle_error = Some(error);
    }

    pub fn terminate_calls(&self, instance_id: &str) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|c| matches!(c, CloudCall::Terminate { instance_id: id } if id == instance_id))
            .count()
    }

    fn lifecycle_result(&self) -> Result<(), CloudError> {
        match &self.state.lock().lifecycle_error {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl CloudCompute for FakeCloud {
    async fn describe_image_ids(
        &self,
        region: &str,
        name_pattern: &str,
    ) -> Result<Vec<String>, CloudError> {
        let mut state = self.state.lock();
        state.calls.push(CloudCall::DescribeImageIds {
            region: region.to_string(),
            pattern: name_pattern.to_string(),
        });
        Ok(state.image_ids.clone())
    }

    async fn list_instances(
        &self,
        region: &str,
        filters: &InstanceFilters,
    ) -> Result<Vec<VmFacts>, CloudError> {
        let mut state = self.state.lock();
        state.calls.push(CloudCall::ListInstances {
            region: region.to_string(),
        });
        let matches = state
            .instances
            .iter()
            .filter(|vm| {
                (filters.instance_ids.is_empty()
                    || filters.instance_ids.contains(&vm.instance_id))
                    && (filters.image_ids.is_empty()
                        || vm
                            .image_id
                            .as_ref()
                            .is_some_and(|img| filters.image_ids.contains(img)))
                    && !(filters.exclude_terminated && vm.state == "terminated")
            })
            .cloned()
            .collect();
        Ok(matches)
    }

    async fn describe_status(
        &self,
        region: &str,
        instance_id: &str,
    ) -> Result<VmStatusDetail, CloudError> {
        let mut state = self.state.lock();
        state.calls.push(CloudCall::DescribeStatus {
            region: region.to_string(),
            instance_id: instance_id.to_string(),
        });
        match state.statuses.get(instance_id) {
            Some(result) => result.clone(),
            None => Err(CloudError::not_found(format!(
                "instance {instance_id} not found"
            ))),
        }
    }

    async fn run_instance(
        &self,
        region: &str,
        spec: &RunInstanceSpec,
    ) -> Result<String, CloudError> {
        let mut state = self.state.lock();
        state.calls.push(CloudCall::RunInstance {
            region: region.to_string(),
            image_id: spec.image_id.clone(),
        });
        state
            .run_results
            .pop_front()
            .unwrap_or_else(|| Ok("i-fake".to_string()))
    }

    async fn start_instance(&self, _region: &str, instance_id: &str) -> Result<(), CloudError> {
        self.state.lock().calls.push(CloudCall::Start {
            instance_id: instance_id.to_string(),
        });
        self.lifecycle_result()
    }

    async fn stop_instance(&self, _region: &str, instance_id: &str) -> Result<(), CloudError> {
        self.state.lock().calls.push(CloudCall::Stop {
            instance_id: instance_id.to_string(),
        });
        self.lifecycle_result()
    }

    async fn terminate_instance(&self, _region: &str, instance_id: &str) -> Result<(), CloudError> {
        self.state.lock().calls.push(CloudCall::Terminate {
            instance_id: instance_id.to_string(),
        });
        self.lifecycle_result()
    }

    async fn set_tags(
        &self,
        _region: &str,
        instance_id: &str,
        _tags: &BTreeMap<String, String>,
    ) -> Result<(), CloudError> {
        self.state.lock().calls.push(CloudCall::SetTags {
            instance_id: instance_id.to_string(),
        });
        Ok(())
    }

    async fn set_detailed_monitoring(
        &self,
        _region: &str,
        instance_id: &str,
        enabled: bool,
    ) -> Result<(), CloudError> {
        self.state.lock().calls.push(CloudCall::SetDetailedMonitoring {
            instance_id: instance_id.to_string(),
            enabled,
        });
        Ok(())
    }

    async fn get_utilization(
        &self,
        _region: &str,
        instance_id: &str,
        _window: Duration,
    ) -> Result<VmUtilization, CloudError> {
        let mut state = self.state.lock();
        state.calls.push(CloudCall::GetUtilization {
            instance_id: instance_id.to_string(),
        });
        match state.utilization.get(instance_id) {
            Some(result) => result.clone(),
            None => Ok(VmUtilization::default()),
        }
    }
}
