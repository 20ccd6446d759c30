// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixtures for daemon tests.

use crate::context::{FleetConfig, FleetContext};
use crate::mediator::{Command, Mediator};
use labfleet_adapters::{FakeCloud, FakeService, FakeServiceFactory, VmFacts};
use labfleet_core::{
    Clock, CloudFacts, FakeClock, ImportWorkerSpec, OperationResult, Worker, WorkerStatus,
};
use labfleet_storage::FleetStore;
use labfleet_wire::Envelope;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

pub(crate) struct TestHarness {
    pub ctx: Arc<FleetContext<FakeClock>>,
    pub mediator: Mediator<FakeClock>,
    pub clock: FakeClock,
    pub cloud: FakeCloud,
    pub services: FakeServiceFactory,
}

pub(crate) fn harness() -> TestHarness {
    harness_with_config(FleetConfig {
        refresh_throttle: Duration::from_secs(60),
        idle_window: Duration::from_secs(1800),
        ..Default::default()
    })
}

pub(crate) fn harness_with_config(config: FleetConfig) -> TestHarness {
    let clock = FakeClock::new();
    let cloud = FakeCloud::new();
    let services = FakeServiceFactory::new();
    let ctx = Arc::new(FleetContext::new(
        Arc::new(FleetStore::new()),
        Arc::new(cloud.clone()),
        Arc::new(services.clone()),
        clock.clone(),
        config,
    ));
    let mediator = Mediator::new(ctx.clone());
    TestHarness {
        ctx,
        mediator,
        clock,
        cloud,
        services,
    }
}

impl TestHarness {
    pub async fn dispatch(&self, command: Command) -> OperationResult {
        self.mediator
            .dispatch(command, CancellationToken::new())
            .await
    }

    /// The Service fake handed out for every endpoint.
    pub fn service(&self) -> FakeService {
        self.services.default_service()
    }

    /// A worker with a cloud instance and a reachable address, persisted in
    /// the given status.
    pub fn insert_worker(&self, name: &str, instance_id: &str, status: WorkerStatus) -> Worker {
        let spec = ImportWorkerSpec {
            name: name.to_string(),
            region: "r1".to_string(),
            created_by: "tester".to_string(),
            facts: CloudFacts {
                instance_id: Some(instance_id.to_string()),
                instance_type: Some("t3.large".to_string()),
                public_ip: Some("203.0.113.10".to_string()),
                ..Default::default()
            },
            cloud_state: "running".to_string(),
        };
        let mut worker = match Worker::import_from_existing_instance(spec, self.clock.now_utc()) {
            Ok(worker) => worker,
            Err(err) => unreachable!("insert_worker: {err}"),
        };
        if status != WorkerStatus::Running {
            let path: &[WorkerStatus] = match status {
                WorkerStatus::Stopping => &[WorkerStatus::Stopping],
                WorkerStatus::Stopped => &[WorkerStatus::Stopping, WorkerStatus::Stopped],
                WorkerStatus::Terminating => &[WorkerStatus::Terminating],
                _ => &[],
            };
            for next in path {
                if let Err(err) = worker.transition_to(*next, self.clock.now_utc()) {
                    unreachable!("insert_worker transition: {err}");
                }
            }
        }
        let _ = worker.take_events();
        if let Err(err) = self.ctx.store.upsert_worker(&worker) {
            unreachable!("insert_worker upsert: {err}");
        }
        worker
    }

    /// Subscribe to the bus; drain with [`drain_envelopes`] after dispatch.
    pub fn subscribe(&self) -> broadcast::Receiver<Envelope> {
        self.ctx.bus.raw_subscribe()
    }
}

/// Everything currently buffered for this subscriber.
pub(crate) fn drain_envelopes(rx: &mut broadcast::Receiver<Envelope>) -> Vec<Envelope> {
    let mut envelopes = Vec::new();
    while let Ok(envelope) = rx.try_recv() {
        envelopes.push(envelope);
    }
    envelopes
}

/// Envelope kinds in arrival order.
pub(crate) fn kinds(envelopes: &[Envelope]) -> Vec<String> {
    envelopes.iter().map(|e| e.kind.clone()).collect()
}
