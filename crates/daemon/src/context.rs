// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared state for the command pipeline and scheduler.

use crate::env;
use crate::fanout::{publish_events, EnvelopeBus};
use crate::throttle::RefreshThrottle;
use labfleet_adapters::{CloudCompute, ServiceClientFactory};
use labfleet_core::{Clock, DomainEvent, Worker, WorkerId};
use labfleet_storage::{FleetStore, StoreError};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Snapshot of every tunable the pipeline and scheduler read.
#[derive(Debug, Clone)]
pub struct FleetConfig {
    pub metrics_interval: Duration,
    pub metrics_concurrency: usize,
    pub labs_refresh_interval: Duration,
    pub labs_concurrency: usize,
    pub activity_interval: Duration,
    pub activity_concurrency: usize,
    pub auto_import_enabled: bool,
    pub auto_import_interval: Duration,
    pub auto_import_region: Option<String>,
    pub auto_import_image_name: Option<String>,
    pub refresh_throttle: Duration,
    pub idle_window: Duration,
    pub shutdown_grace: Duration,
    pub subscriber_queue: usize,
    pub snapshot_interval: Duration,
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            metrics_interval: Duration::from_secs(300),
            metrics_concurrency: 10,
            labs_refresh_interval: Duration::from_secs(1800),
            labs_concurrency: 5,
            activity_interval: Duration::from_secs(600),
            activity_concurrency: 10,
            auto_import_enabled: false,
            auto_import_interval: Duration::from_secs(3600),
            auto_import_region: None,
            auto_import_image_name: None,
            refresh_throttle: Duration::from_secs(60),
            idle_window: Duration::from_secs(1800),
            shutdown_grace: Duration::from_secs(30),
            subscriber_queue: 1024,
            snapshot_interval: Duration::from_secs(300),
        }
    }
}

impl FleetConfig {
    pub fn from_env() -> Self {
        Self {
            metrics_interval: env::metrics_poll_interval(),
            labs_refresh_interval: env::labs_refresh_interval(),
            activity_interval: env::activity_detection_interval(),
            auto_import_enabled: env::auto_import_enabled(),
            auto_import_interval: env::auto_import_interval(),
            auto_import_region: env::auto_import_region(),
            auto_import_image_name: env::auto_import_image_name(),
            refresh_throttle: env::worker_refresh_throttle(),
            idle_window: env::worker_idle_window(),
            shutdown_grace: env::shutdown_grace(),
            subscriber_queue: env::subscriber_queue(),
            snapshot_interval: env::snapshot_interval(),
            ..Default::default()
        }
    }
}

/// Per-worker logical locks: two mutations of one worker never interleave.
#[derive(Default)]
pub struct WorkerLocks {
    locks: Mutex<HashMap<WorkerId, Arc<tokio::sync::Mutex<()>>>>,
}

impl WorkerLocks {
    pub fn lock_for(&self, worker: WorkerId) -> Arc<tokio::sync::Mutex<()>> {
        self.locks.lock().entry(worker).or_default().clone()
    }

    pub fn forget(&self, worker: WorkerId) {
        self.locks.lock().remove(&worker);
    }
}

/// Everything a command handler can touch.
pub struct FleetContext<C: Clock> {
    pub store: Arc<FleetStore>,
    pub cloud: Arc<dyn CloudCompute>,
    pub services: Arc<dyn ServiceClientFactory>,
    pub bus: EnvelopeBus,
    pub clock: C,
    pub config: FleetConfig,
    pub locks: WorkerLocks,
    pub throttle: RefreshThrottle<C>,
}

impl<C: Clock> FleetContext<C> {
    pub fn new(
        store: Arc<FleetStore>,
        cloud: Arc<dyn CloudCompute>,
        services: Arc<dyn ServiceClientFactory>,
        clock: C,
        config: FleetConfig,
    ) -> Self {
        let bus = EnvelopeBus::new(config.subscriber_queue);
        let throttle = RefreshThrottle::new(clock.clone(), config.refresh_throttle);
        Self {
            store,
            cloud,
            services,
            bus,
            clock,
            config,
            locks: WorkerLocks::default(),
            throttle,
        }
    }

    /// Persist the aggregate, then publish its drained events. Events are
    /// never published for state that failed to persist. Returns whether any
    /// published event warrants a `worker.snapshot` at command end.
    pub fn persist_and_publish(&self, worker: &mut Worker) -> Result<bool, StoreError> {
        self.store.upsert_worker(worker)?;
        let events: Vec<DomainEvent> = worker
            .take_events()
            .into_iter()
            .map(DomainEvent::from)
            .collect();
        let significant = crate::fanout::any_significant(&events);
        publish_events(&self.bus, self.clock.now_utc(), &events);
        Ok(significant)
    }

    /// Emit the full-projection resync envelope for this worker.
    pub fn publish_snapshot(&self, worker: &Worker) {
        crate::fanout::publish_snapshot(&self.bus, self.clock.now_utc(), worker);
    }

    /// Base URL of the Service on a worker, preferring the public address.
    pub fn service_endpoint(&self, worker: &Worker) -> Option<String> {
        worker
            .cloud
            .public_ip
            .as_ref()
            .or(worker.cloud.private_ip.as_ref())
            .map(|addr| format!("https://{addr}"))
    }
}
