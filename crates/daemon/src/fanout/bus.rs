// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only broadcast bus for change envelopes.
//!
//! Single writer per publisher, many readers. Each subscriber gets a
//! bounded queue; when a slow subscriber falls behind, the oldest entries
//! are dropped and the subscriber observes how many it missed. Publishers
//! never block on subscribers.

use labfleet_wire::Envelope;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;

/// What a subscriber reads off the bus.
#[derive(Debug, Clone)]
pub enum StreamMessage {
    Envelope(Envelope),
    /// The subscriber lagged and `missed` envelopes were dropped.
    Lagged { missed: u64 },
}

/// Handle for publishing and subscribing to envelopes.
#[derive(Clone)]
pub struct EnvelopeBus {
    tx: broadcast::Sender<Envelope>,
    lagged_total: Arc<AtomicU64>,
}

impl EnvelopeBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            tx,
            lagged_total: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Publish to all current subscribers. No subscribers is fine.
    pub fn publish(&self, envelope: Envelope) {
        if self.tx.send(envelope).is_err() {
            tracing::trace!("envelope published with no active subscribers");
        }
    }

    pub fn subscribe(&self) -> Subscriber {
        Subscriber {
            rx: self.tx.subscribe(),
            lagged_total: self.lagged_total.clone(),
        }
    }

    /// Raw receiver for stream wrappers; pair with [`Self::record_lagged`].
    pub fn raw_subscribe(&self) -> broadcast::Receiver<Envelope> {
        self.tx.subscribe()
    }

    pub fn record_lagged(&self, missed: u64) {
        self.lagged_total.fetch_add(missed, Ordering::Relaxed);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Total envelopes dropped across all subscribers since startup.
    pub fn lagged_total(&self) -> u64 {
        self.lagged_total.load(Ordering::Relaxed)
    }
}

/// One subscriber's view of the bus.
pub struct Subscriber {
    rx: broadcast::Receiver<Envelope>,
    lagged_total: Arc<AtomicU64>,
}

impl Subscriber {
    /// Next message; `None` when the bus is gone.
    pub async fn recv(&mut self) -> Option<StreamMessage> {
        match self.rx.recv().await {
            Ok(envelope) => Some(StreamMessage::Envelope(envelope)),
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                self.lagged_total.fetch_add(missed, Ordering::Relaxed);
                tracing::warn!(missed, "stream subscriber lagged, envelopes dropped");
                Some(StreamMessage::Lagged { missed })
            }
            Err(broadcast::error::RecvError::Closed) => None,
        }
    }
}
