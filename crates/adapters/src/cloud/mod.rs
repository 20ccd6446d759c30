// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cloud VM control port.
//!
//! The concrete SDK binding lives behind [`CloudCompute`]; the control plane
//! only ever talks to the trait, normally through the [`RetryingCloud`]
//! decorator which adds timeouts and bounded retries with jitter.

#[cfg(any(test, feature = "test-support"))]
pub mod fake;
mod local;
mod retry;

pub use local::LocalCloud;
pub use retry::{RetryPolicy, RetryingCloud};

use async_trait::async_trait;
use labfleet_core::CloudFacts;
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;

/// Error classification for cloud calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloudErrorKind {
    NotFound,
    InvalidParameter,
    Throttled,
    PermissionDenied,
    Transient,
    Other,
}

/// A failed cloud call. `Throttled` and `Transient` are retryable.
///
/// `resource_id` is set when the provider created a resource before the
/// call failed (run accepted, then the response errored); the provisioning
/// saga uses it to compensate.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("cloud {kind:?}: {message}")]
pub struct CloudError {
    pub kind: CloudErrorKind,
    pub message: String,
    pub resource_id: Option<String>,
}

impl CloudError {
    pub fn new(kind: CloudErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            resource_id: None,
        }
    }

    pub fn with_resource(mut self, resource_id: impl Into<String>) -> Self {
        self.resource_id = Some(resource_id.into());
        self
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(CloudErrorKind::NotFound, message)
    }

    pub fn throttled(message: impl Into<String>) -> Self {
        Self::new(CloudErrorKind::Throttled, message)
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(CloudErrorKind::Transient, message)
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind,
            CloudErrorKind::Throttled | CloudErrorKind::Transient
        )
    }
}

/// Facts describing one VM, as returned by a list/describe call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VmFacts {
    pub instance_id: String,
    /// Cloud state name: "pending", "running", "stopping", "stopped",
    /// "shutting-down", "terminated".
    pub state: String,
    pub instance_type: Option<String>,
    pub image_id: Option<String>,
    pub image_name: Option<String>,
    pub public_ip: Option<String>,
    pub private_ip: Option<String>,
    pub subnet_id: Option<String>,
    pub security_groups: Vec<String>,
    pub tags: BTreeMap<String, String>,
}

impl VmFacts {
    /// Display name from the cloud `Name` tag, falling back to the id.
    pub fn display_name(&self) -> String {
        self.tags
            .get("Name")
            .cloned()
            .unwrap_or_else(|| self.instance_id.clone())
    }

    /// Project onto the aggregate's fact block.
    pub fn to_cloud_facts(&self) -> CloudFacts {
        CloudFacts {
            instance_id: Some(self.instance_id.clone()),
            instance_type: self.instance_type.clone(),
            image_id: self.image_id.clone(),
            image_name: self.image_name.clone(),
            public_ip: self.public_ip.clone(),
            private_ip: self.private_ip.clone(),
            subnet_id: self.subnet_id.clone(),
            security_groups: self.security_groups.clone(),
            tags: self.tags.clone(),
        }
    }
}

/// Instance and system status detail from a describe-status call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VmStatusDetail {
    pub instance_state: Option<String>,
    pub system_status: Option<String>,
}

/// CPU/memory utilization over the requested window.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct VmUtilization {
    pub cpu_pct: Option<f64>,
    pub mem_pct: Option<f64>,
}

/// Filters for a list-instances call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstanceFilters {
    pub instance_ids: Vec<String>,
    pub image_ids: Vec<String>,
    /// Exclude instances in the "terminated" cloud state.
    pub exclude_terminated: bool,
}

impl InstanceFilters {
    pub fn by_instance_id(id: impl Into<String>) -> Self {
        Self {
            instance_ids: vec![id.into()],
            ..Default::default()
        }
    }

    pub fn by_image_ids(ids: Vec<String>) -> Self {
        Self {
            image_ids: ids,
            exclude_terminated: true,
            ..Default::default()
        }
    }
}

/// Specification for launching a new VM.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunInstanceSpec {
    pub image_id: String,
    pub instance_type: String,
    pub subnet_id: Option<String>,
    pub security_group_ids: Vec<String>,
    pub tags: BTreeMap<String, String>,
}

/// The cloud control port.
///
/// Implementations must not block the caller's scheduler: synchronous SDK
/// work belongs on a worker-thread pool inside the implementation.
#[async_trait]
pub trait CloudCompute: Send + Sync {
    async fn describe_image_ids(
        &self,
        region: &str,
        name_pattern: &str,
    ) -> Result<Vec<String>, CloudError>;

    async fn list_instances(
        &self,
        region: &str,
        filters: &InstanceFilters,
    ) -> Result<Vec<VmFacts>, CloudError>;

    async fn describe_status(
        &self,
        region: &str,
        instance_id: &str,
    ) -> Result<VmStatusDetail, CloudError>;

    async fn run_instance(
        &self,
        region: &str,
        spec: &RunInstanceSpec,
    ) -> Result<String, CloudError>;

    async fn start_instance(&self, region: &str, instance_id: &str) -> Result<(), CloudError>;

    async fn stop_instance(&self, region: &str, instance_id: &str) -> Result<(), CloudError>;

    async fn terminate_instance(&self, region: &str, instance_id: &str) -> Result<(), CloudError>;

    async fn set_tags(
        &self,
        region: &str,
        instance_id: &str,
        tags: &BTreeMap<String, String>,
    ) -> Result<(), CloudError>;

    async fn set_detailed_monitoring(
        &self,
        region: &str,
        instance_id: &str,
        enabled: bool,
    ) -> Result<(), CloudError>;

    async fn get_utilization(
        &self,
        region: &str,
        instance_id: &str,
        window: Duration,
    ) -> Result<VmUtilization, CloudError>;
}
