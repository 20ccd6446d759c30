// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Live event stream.
//!
//! Long-lived `text/event-stream` response; every message is one JSON
//! envelope. A lagged subscriber gets a `stream.lagged` marker telling it
//! how many envelopes it missed so it can resync from the snapshots.

use super::AppState;
use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures_util::stream::Stream;
use futures_util::StreamExt;
use labfleet_core::Clock;
use std::convert::Infallible;
use std::sync::Arc;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;

pub async fn events<C: Clock>(
    State(state): State<Arc<AppState<C>>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let bus = state.mediator.context().bus.clone();
    let receiver = bus.raw_subscribe();
    tracing::debug!(
        subscribers = bus.subscriber_count(),
        "event stream subscriber connected"
    );

    let stream = BroadcastStream::new(receiver).map(move |message| {
        let event = match message {
            Ok(envelope) => {
                let data = serde_json::to_string(&envelope).unwrap_or_else(|_| "{}".to_string());
                Event::default().event(envelope.kind).data(data)
            }
            Err(BroadcastStreamRecvError::Lagged(missed)) => {
                bus.record_lagged(missed);
                Event::default()
                    .event("stream.lagged")
                    .data(format!("{{\"missed\":{missed}}}"))
            }
        };
        Ok(event)
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
