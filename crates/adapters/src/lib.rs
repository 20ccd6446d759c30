// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Adapters for external I/O: the cloud VM control port and the Service
//! HTTP client. Raw SDK/HTTP failures are translated into the structured
//! error taxonomies here; callers never see transport errors.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod cloud;
pub mod service;

pub use cloud::{
    CloudCompute, CloudError, CloudErrorKind, InstanceFilters, LocalCloud, RetryPolicy,
    RetryingCloud, RunInstanceSpec, VmFacts, VmStatusDetail, VmUtilization,
};
pub use service::{
    HttpServiceFactory, IntegrationError, IntegrationErrorKind, ServiceApi, ServiceClientFactory,
    ServiceCredentials, SystemInformation,
};

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
pub use cloud::fake::{CloudCall, FakeCloud};
#[cfg(any(test, feature = "test-support"))]
pub use service::fake::{FakeService, FakeServiceFactory, ServiceCall};
