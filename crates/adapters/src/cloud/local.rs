// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-process cloud backend for local development.
//!
//! Simulates a single region's worth of VMs so the daemon can run end to end
//! without a provider SDK wired in. Lifecycle calls settle instantly:
//! run → "running", stop → "stopped", terminate → gone.

use super::{
    CloudCompute, CloudError, CloudErrorKind, InstanceFilters, RunInstanceSpec, VmFacts,
    VmStatusDetail, VmUtilization,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

#[derive(Default)]
struct LocalCloudState {
    instances: BTreeMap<String, VmFacts>,
    next_id: u64,
}

/// Local development backend.
#[derive(Clone, Default)]
pub struct LocalCloud {
    state: Arc<Mutex<LocalCloudState>>,
}

impl LocalCloud {
    pub fn new() -> Self {
        Self::default()
    }

    fn get_mut<'a>(
        state: &'a mut LocalCloudState,
        instance_id: &str,
    ) -> Result<&'a mut VmFacts, CloudError> {
        state
            .instances
            .get_mut(instance_id)
            .ok_or_else(|| CloudError::not_found(format!("instance {instance_id} not found")))
    }
}

#[async_trait]
impl CloudCompute for LocalCloud {
    async fn describe_image_ids(
        &self,
        _region: &str,
        name_pattern: &str,
    ) -> Result<Vec<String>, CloudError> {
        // One well-known image per pattern keeps name-based flows working
        Ok(vec![format!("img-local-{}", name_pattern.trim_matches('*'))])
    }

    async fn list_instances(
        &self,
        _region: &str,
        filters: &InstanceFilters,
    ) -> Result<Vec<VmFacts>, CloudError> {
        let state = self.state.lock();
        Ok(state
            .instances
            .values()
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
            .collect())
    }

    async fn describe_status(
        &self,
        _region: &str,
        instance_id: &str,
    ) -> Result<VmStatusDetail, CloudError> {
        let state = self.state.lock();
        let vm = state
            .instances
            .get(instance_id)
            .ok_or_else(|| CloudError::not_found(format!("instance {instance_id} not found")))?;
        if vm.state == "terminated" {
            return Err(CloudError::not_found(format!(
                "instance {instance_id} not found"
            )));
        }
        Ok(VmStatusDetail {
            instance_state: Some(vm.state.clone()),
            system_status: Some("ok".to_string()),
        })
    }

    async fn run_instance(
        &self,
        _region: &str,
        spec: &RunInstanceSpec,
    ) -> Result<String, CloudError> {
        if spec.image_id.is_empty() {
            return Err(CloudError::new(
                CloudErrorKind::InvalidParameter,
                "image_id is required",
            ));
        }
        let mut state = self.state.lock();
        state.next_id += 1;
        let instance_id = format!("i-local-{:08x}", state.next_id);
        state.instances.insert(
            instance_id.clone(),
            VmFacts {
                instance_id: instance_id.clone(),
                state: "running".to_string(),
                instance_type: Some(spec.instance_type.clone()),
                image_id: Some(spec.image_id.clone()),
                image_name: None,
                public_ip: Some("127.0.0.1".to_string()),
                private_ip: Some("127.0.0.1".to_string()),
                subnet_id: spec.subnet_id.clone(),
                security_groups: spec.security_group_ids.clone(),
                tags: spec.tags.clone(),
            },
        );
        Ok(instance_id)
    }

    async fn start_instance(&self, _region: &str, instance_id: &str) -> Result<(), CloudError> {
        let mut state = self.state.lock();
        let vm = Self::get_mut(&mut state, instance_id)?;
        vm.state = "running".to_string();
        Ok(())
    }

    async fn stop_instance(&self, _region: &str, instance_id: &str) -> Result<(), CloudError> {
        let mut state = self.state.lock();
        let vm = Self::get_mut(&mut state, instance_id)?;
        vm.state = "stopped".to_string();
        Ok(())
    }

    async fn terminate_instance(&self, _region: &str, instance_id: &str) -> Result<(), CloudError> {
        let mut state = self.state.lock();
        let vm = Self::get_mut(&mut state, instance_id)?;
        vm.state = "terminated".to_string();
        Ok(())
    }

    async fn set_tags(
        &self,
        _region: &str,
        instance_id: &str,
        tags: &BTreeMap<String, String>,
    ) -> Result<(), CloudError> {
        let mut state = self.state.lock();
        let vm = Self::get_mut(&mut state, instance_id)?;
        vm.tags.extend(tags.clone());
        Ok(())
    }

    async fn set_detailed_monitoring(
        &self,
        _region: &str,
        instance_id: &str,
        _enabled: bool,
    ) -> Result<(), CloudError> {
        let mut state = self.state.lock();
        Self::get_mut(&mut state, instance_id)?;
        Ok(())
    }

    async fn get_utilization(
        &self,
        _region: &str,
        instance_id: &str,
        _window: Duration,
    ) -> Result<VmUtilization, CloudError> {
        let state = self.state.lock();
        let vm = state
            .instances
            .get(instance_id)
            .ok_or_else(|| CloudError::not_found(format!("instance {instance_id} not found")))?;
        Ok(VmUtilization {
            cpu_pct: if vm.state == "running" { Some(3.0) } else { Some(0.0) },
            mem_pct: Some(12.0),
        })
    }
}

#[cfg(test)]
#[path = "local_tests.rs"]
mod tests;
