// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon startup and shutdown.
//!
//! Startup: load the snapshot, build the context, register the recurrent
//! jobs, bind HTTP. Shutdown: cancel every in-flight handler, drain the
//! scheduler within the grace period, write a final snapshot.

use crate::context::{FleetConfig, FleetContext};
use crate::env;
use crate::http::{self, AppState};
use crate::mediator::Mediator;
use crate::scheduler::Scheduler;
use labfleet_adapters::{
    HttpServiceFactory, IntegrationError, LocalCloud, RetryingCloud, ServiceCredentials,
};
use labfleet_core::SystemClock;
use labfleet_storage::{FleetStore, Snapshot, SnapshotError};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Error)]
pub enum RunError {
    #[error("snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),
    #[error("service factory: {0}")]
    Service(#[from] IntegrationError),
    #[error("bind {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },
    #[error("serve: {0}")]
    Serve(std::io::Error),
}

fn snapshot_path() -> Option<PathBuf> {
    env::state_dir().map(|dir| dir.join("fleet.json"))
}

fn load_store(path: Option<&PathBuf>) -> Result<Arc<FleetStore>, SnapshotError> {
    let Some(path) = path else {
        tracing::warn!("no state directory resolvable; running without persistence");
        return Ok(Arc::new(FleetStore::new()));
    };
    match Snapshot::load(path)? {
        Some(snapshot) => {
            tracing::info!(
                path = %path.display(),
                workers = snapshot.state.workers.len(),
                created_at = %snapshot.created_at,
                "restored fleet snapshot"
            );
            Ok(Arc::new(FleetStore::from_state(snapshot.state)))
        }
        None => {
            tracing::info!(path = %path.display(), "no snapshot found, starting fresh");
            Ok(Arc::new(FleetStore::new()))
        }
    }
}

/// Run the daemon until `cancel` fires.
pub async fn run(cancel: CancellationToken) -> Result<(), RunError> {
    let config = FleetConfig::from_env();
    let path = snapshot_path();
    let store = load_store(path.as_ref())?;

    let (username, password) = env::service_credentials();
    let services = HttpServiceFactory::new(
        ServiceCredentials { username, password },
        env::service_api_timeout(),
        env::tls_verify(),
    )?;
    // The in-process backend; a provider SDK binding slots in behind the
    // same trait.
    let cloud = Arc::new(RetryingCloud::new(LocalCloud::new()));
    tracing::info!("cloud backend: local (in-process)");

    let ctx = Arc::new(FleetContext::new(
        store.clone(),
        cloud,
        Arc::new(services),
        SystemClock,
        config.clone(),
    ));
    let mediator = Mediator::new(ctx);

    let scheduler = Scheduler::new(mediator.clone(), cancel.clone());
    for job in scheduler.jobs() {
        tracing::info!(job = job.name, interval_s = job.interval.as_secs(), concurrency = job.concurrency, "job declared");
    }
    let mut handles = scheduler.spawn();

    // Periodic snapshots bound the projection loss on a crash
    if let Some(path) = path.clone() {
        let store = store.clone();
        let interval = config.snapshot_interval;
        let cancel = cancel.clone();
        handles.push(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    _ = ticker.tick() => {}
                }
                let snapshot = Snapshot::new(store.export_state(), chrono::Utc::now());
                if let Err(err) = snapshot.save(&path) {
                    tracing::error!(error = %err, "periodic snapshot failed");
                }
            }
        }));
    }

    let state = AppState::new(mediator, env::auth_token(), cancel.clone());
    let router = http::router(state);
    let addr = env::http_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|source| RunError::Bind {
            addr: addr.clone(),
            source,
        })?;
    tracing::info!(addr, "http listening");

    let shutdown = cancel.clone();
    axum::serve(listener, router)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(RunError::Serve)?;

    // Drain background loops within the grace period, then give up on them
    let drain = futures_util::future::join_all(&mut handles);
    if tokio::time::timeout(config.shutdown_grace, drain).await.is_err() {
        tracing::warn!(
            grace_s = config.shutdown_grace.as_secs(),
            "grace period elapsed, aborting remaining tasks"
        );
        for handle in &handles {
            handle.abort();
        }
    }

    if let Some(path) = path {
        let snapshot = Snapshot::new(store.export_state(), chrono::Utc::now());
        match snapshot.save(&path) {
            Ok(()) => tracing::info!(path = %path.display(), "final snapshot written"),
            Err(err) => tracing::error!(error = %err, "final snapshot failed"),
        }
    }
    tracing::info!("shutdown complete");
    Ok(())
}
