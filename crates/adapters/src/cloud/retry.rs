// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Timeout and retry decorator for the cloud port.

use super::{
    CloudCompute, CloudError, CloudErrorKind, InstanceFilters, RunInstanceSpec, VmFacts,
    VmStatusDetail, VmUtilization,
};
use async_trait::async_trait;
use rand::Rng;
use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;

/// Retry and timeout policy applied to every cloud call.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub attempts: u32,
    /// Backoff before attempt n+1 is `base_backoff * 2^n` plus jitter.
    pub base_backoff: Duration,
    /// Timeout for control-plane calls (run/start/stop/tag/describe).
    pub control_timeout: Duration,
    /// Timeout for metrics reads, which the provider serves slowly.
    pub metrics_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            base_backoff: Duration::from_millis(200),
            control_timeout: Duration::from_secs(15),
            metrics_timeout: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    fn backoff(&self, attempt: u32) -> Duration {
        let base = self.base_backoff * 2u32.saturating_pow(attempt);
        let jitter_cap = (base / 2).as_millis() as u64;
        let jitter = if jitter_cap == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..=jitter_cap)
        };
        base + Duration::from_millis(jitter)
    }
}

/// Wraps a [`CloudCompute`] with per-call timeouts and bounded retries on
/// retryable kinds.
pub struct RetryingCloud<C> {
    inner: C,
    policy: RetryPolicy,
}

impl<C: CloudCompute> RetryingCloud<C> {
    pub fn new(inner: C) -> Self {
        Self::with_policy(inner, RetryPolicy::default())
    }

    pub fn with_policy(inner: C, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    async fn call<T, F, Fut>(
        &self,
        op: &'static str,
        timeout: Duration,
        mut run: F,
    ) -> Result<T, CloudError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, CloudError>>,
    {
        let mut attempt = 0u32;
        loop {
            let result = match tokio::time::timeout(timeout, run()).await {
                Ok(result) => result,
                Err(_) => Err(CloudError::new(
                    CloudErrorKind::Transient,
                    format!("{op} timed out after {timeout:?}"),
                )),
            };
            match result {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt + 1 < self.policy.attempts => {
                    let backoff = self.policy.backoff(attempt);
                    tracing::debug!(op, attempt, kind = ?err.kind, backoff_ms = backoff.as_millis() as u64, "retrying cloud call");
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[async_trait]
impl<C: CloudCompute> CloudCompute for RetryingCloud<C> {
    async fn describe_image_ids(
        &self,
        region: &str,
        name_pattern: &str,
    ) -> Result<Vec<String>, CloudError> {
        self.call("describe_image_ids", self.policy.control_timeout, || {
            self.inner.describe_image_ids(region, name_pattern)
        })
        .await
    }

    async fn list_instances(
        &self,
        region: &str,
        filters: &InstanceFilters,
    ) -> Result<Vec<VmFacts>, CloudError> {
        self.call("list_instances", self.policy.control_timeout, || {
            self.inner.list_instances(region, filters)
        })
        .await
    }

    async fn describe_status(
        &self,
        region: &str,
        instance_id: &str,
    ) -> Result<VmStatusDetail, CloudError> {
        self.call("describe_status", self.policy.control_timeout, || {
            self.inner.describe_status(region, instance_id)
        })
        .await
    }

    async fn run_instance(
        &self,
        region: &str,
        spec: &RunInstanceSpec,
    ) -> Result<String, CloudError> {
        self.call("run_instance", self.policy.control_timeout, || {
            self.inner.run_instance(region, spec)
        })
        .await
    }

    async fn start_instance(&self, region: &str, instance_id: &str) -> Result<(), CloudError> {
        self.call("start_instance", self.policy.control_timeout, || {
            self.inner.start_instance(region, instance_id)
        })
        .await
    }

    async fn stop_instance(&self, region: &str, instance_id: &str) -> Result<(), CloudError> {
        self.call("stop_instance", self.policy.control_timeout, || {
            self.inner.stop_instance(region, instance_id)
        })
        .await
    }

    async fn terminate_instance(&self, region: &str, instance_id: &str) -> Result<(), CloudError> {
        self.call("terminate_instance", self.policy.control_timeout, || {
            self.inner.terminate_instance(region, instance_id)
        })
        .await
    }

    async fn set_tags(
        &self,
        region: &str,
        instance_id: &str,
        tags: &BTreeMap<String, String>,
    ) -> Result<(), CloudError> {
        self.call("set_tags", self.policy.control_timeout, || {
            self.inner.set_tags(region, instance_id, tags)
        })
        .await
    }

    async fn set_detailed_monitoring(
        &self,
        region: &str,
        instance_id: &str,
        enabled: bool,
    ) -> Result<(), CloudError> {
        self.call("set_detailed_monitoring", self.policy.control_timeout, || {
            self.inner.set_detailed_monitoring(region, instance_id, enabled)
        })
        .await
    }

    async fn get_utilization(
        &self,
        region: &str,
        instance_id: &str,
        window: Duration,
    ) -> Result<VmUtilization, CloudError> {
        self.call("get_utilization", self.policy.metrics_timeout, || {
            self.inner.get_utilization(region, instance_id, window)
        })
        .await
    }
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod tests;
