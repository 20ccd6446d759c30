// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Domain events → envelopes, in emission order.

use super::EnvelopeBus;
use chrono::{DateTime, Utc};
use labfleet_core::{DomainEvent, Worker, WorkerEvent, WorkerId};
use labfleet_wire::{kind, Envelope, WorkerDto};

/// Publish a handler's drained events, in emission order.
pub fn publish_events(bus: &EnvelopeBus, now: DateTime<Utc>, events: &[DomainEvent]) {
    for event in events {
        bus.publish(Envelope::from_domain_event(event, now));
    }
}

/// Resync envelope carrying the full post-mutation projection, emitted once
/// per command after its significant mutations.
pub fn publish_snapshot(bus: &EnvelopeBus, now: DateTime<Utc>, worker: &Worker) {
    let dto = WorkerDto::from(worker);
    let data = serde_json::to_value(&dto).unwrap_or(serde_json::Value::Null);
    bus.publish(Envelope::new(
        kind::WORKER_SNAPSHOT,
        worker.id.to_string(),
        now,
        data,
    ));
}

/// Whether any event warrants a snapshot for late-joining subscribers.
pub fn any_significant(events: &[DomainEvent]) -> bool {
    events.iter().any(|event| match event {
        DomainEvent::Worker(event) => is_significant(event),
        DomainEvent::Lab(_) => false,
    })
}

/// Recoverable sync failures are surfaced to subscribers without internals.
pub fn publish_sync_failed(
    bus: &EnvelopeBus,
    worker_id: WorkerId,
    now: DateTime<Utc>,
    source: &str,
    message: &str,
) {
    bus.publish(Envelope::new(
        kind::WORKER_SYNC_FAILED,
        worker_id.to_string(),
        now,
        serde_json::json!({ "source": source, "message": message }),
    ));
}

/// Activity ticks alone don't warrant a snapshot; everything else does.
fn is_significant(event: &WorkerEvent) -> bool {
    !matches!(event, WorkerEvent::ActivityObserved { .. })
}
