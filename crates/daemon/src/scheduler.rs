// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Reconciliation scheduler.
//!
//! A declarative registry of recurrent jobs, each on its own interval.
//! Per tick a job fans out over the active worker set behind a semaphore,
//! consults the per-worker refresh throttle, and dispatches commands
//! through the mediator. One worker's failure never aborts a tick; jobs
//! log `{processed, skipped, errors}` and move on.

use crate::context::FleetContext;
use crate::mediator::{Command, Mediator};
use labfleet_core::{Clock, Worker};
use labfleet_wire::TickSummary;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

/// What a job does to each worker on a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    WorkerMetricsCollection,
    LabsRefresh,
    ActivityDetection,
    AutoImportWorkers,
}

/// A declared recurrent job. Identity is code-declared; nothing persists.
#[derive(Debug, Clone)]
pub struct RecurrentJob {
    pub name: &'static str,
    pub interval: Duration,
    pub concurrency: usize,
    pub kind: JobKind,
}

/// Owns the job registry and the tick loops.
pub struct Scheduler<C: Clock> {
    mediator: Mediator<C>,
    jobs: Vec<RecurrentJob>,
    cancel: CancellationToken,
}

impl<C: Clock> Scheduler<C> {
    pub fn new(mediator: Mediator<C>, cancel: CancellationToken) -> Self {
        let jobs = Self::jobs_from_config(mediator.context());
        Self {
            mediator,
            jobs,
            cancel,
        }
    }

    fn jobs_from_config(ctx: &FleetContext<C>) -> Vec<RecurrentJob> {
        let cfg = &ctx.config;
        let mut jobs = vec![
            RecurrentJob {
                name: "WorkerMetricsCollection",
                interval: cfg.metrics_interval,
                concurrency: cfg.metrics_concurrency,
                kind: JobKind::WorkerMetricsCollection,
            },
            RecurrentJob {
                name: "LabsRefresh",
                interval: cfg.labs_refresh_interval,
                concurrency: cfg.labs_concurrency,
                kind: JobKind::LabsRefresh,
            },
            RecurrentJob {
                name: "ActivityDetection",
                interval: cfg.activity_interval,
                concurrency: cfg.activity_concurrency,
                kind: JobKind::ActivityDetection,
            },
        ];
        if cfg.auto_import_enabled {
            jobs.push(RecurrentJob {
                name: "AutoImportWorkers",
                interval: cfg.auto_import_interval,
                concurrency: 1,
                kind: JobKind::AutoImportWorkers,
            });
        }
        jobs
    }

    pub fn jobs(&self) -> &[RecurrentJob] {
        &self.jobs
    }

    /// Spawn one loop per job. Returns the join handles so shutdown can
    /// drain them within the grace period.
    pub fn spawn(self) -> Vec<tokio::task::JoinHandle<()>> {
        let Scheduler {
            mediator,
            jobs,
            cancel,
        } = self;
        jobs.into_iter()
            .map(|job| {
                let mediator = mediator.clone();
                let cancel = cancel.clone();
                tokio::spawn(async move {
                    run_job_loop(mediator, job, cancel).await;
                })
            })
            .collect()
    }
}

async fn run_job_loop<C: Clock>(mediator: Mediator<C>, job: RecurrentJob, cancel: CancellationToken) {
    let mut interval = tokio::time::interval(job.interval);
    // First tick fires immediately; skip it so startup isn't a stampede
    interval.tick().await;
    tracing::info!(job = job.name, interval_s = job.interval.as_secs(), "recurrent job registered");
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::debug!(job = job.name, "job loop cancelled");
                return;
            }
            _ = interval.tick() => {}
        }
        let summary = run_tick(&mediator, &job, &cancel).await;
        tracing::info!(
            job = job.name,
            processed = summary.processed,
            skipped = summary.skipped,
            errors = summary.errors,
            "tick complete"
        );
    }
}

/// One tick of one job.
pub async fn run_tick<C: Clock>(
    mediator: &Mediator<C>,
    job: &RecurrentJob,
    cancel: &CancellationToken,
) -> TickSummary {
    match job.kind {
        JobKind::AutoImportWorkers => run_auto_import(mediator, cancel).await,
        _ => fan_out(mediator, job, cancel).await,
    }
}

async fn run_auto_import<C: Clock>(
    mediator: &Mediator<C>,
    cancel: &CancellationToken,
) -> TickSummary {
    let cfg = &mediator.context().config;
    let (Some(region), Some(image_name)) = (
        cfg.auto_import_region.clone(),
        cfg.auto_import_image_name.clone(),
    ) else {
        tracing::warn!("auto-import enabled without region/image_name, skipping");
        return TickSummary {
            skipped: 1,
            ..Default::default()
        };
    };
    let result = mediator
        .dispatch(
            Command::BulkImportWorkers {
                region,
                image_name,
                created_by: "auto-import".to_string(),
            },
            cancel.clone(),
        )
        .await;
    TickSummary {
        processed: 1,
        errors: usize::from(!result.is_ok()),
        ..Default::default()
    }
}

/// Fan out over active workers with bounded concurrency. Per worker the
/// job's commands run sequentially; across workers there is no ordering.
async fn fan_out<C: Clock>(
    mediator: &Mediator<C>,
    job: &RecurrentJob,
    cancel: &CancellationToken,
) -> TickSummary {
    let workers = mediator.context().store.active_workers();
    let semaphore = Arc::new(Semaphore::new(job.concurrency.max(1)));

    let runs = workers.into_iter().map(|worker| {
        let mediator = mediator.clone();
        let semaphore = semaphore.clone();
        let cancel = cancel.clone();
        let kind = job.kind;
        async move {
            let Ok(_permit) = semaphore.acquire().await else {
                return WorkerOutcome::Skipped;
            };
            if cancel.is_cancelled() {
                return WorkerOutcome::Skipped;
            }
            run_worker(&mediator, kind, &worker, &cancel).await
        }
    });

    let outcomes = futures_util::future::join_all(runs).await;
    let mut summary = TickSummary::default();
    for outcome in outcomes {
        match outcome {
            WorkerOutcome::Processed => summary.processed += 1,
            WorkerOutcome::Skipped => summary.skipped += 1,
            WorkerOutcome::Errored => summary.errors += 1,
        }
    }
    summary
}

enum WorkerOutcome {
    Processed,
    Skipped,
    Errored,
}

/// Commands for one worker on one tick, gated by the refresh throttle.
async fn run_worker<C: Clock>(
    mediator: &Mediator<C>,
    kind: JobKind,
    worker: &Worker,
    cancel: &CancellationToken,
) -> WorkerOutcome {
    let ctx = mediator.context();
    let (throttle_kind, commands): (&'static str, Vec<Command>) = match kind {
        JobKind::WorkerMetricsCollection => (
            "metrics",
            vec![Command::SyncWorkerCloudMetrics {
                worker_id: worker.id,
            }],
        ),
        JobKind::LabsRefresh => (
            "labs",
            vec![
                Command::SyncWorkerServiceData {
                    worker_id: worker.id,
                },
                Command::RefreshWorkerLabs {
                    worker_id: worker.id,
                },
            ],
        ),
        JobKind::ActivityDetection => (
            "activity",
            vec![Command::DetectWorkerIdle {
                worker_id: worker.id,
            }],
        ),
        JobKind::AutoImportWorkers => return WorkerOutcome::Skipped,
    };

    if !ctx.throttle.try_acquire(worker.id, throttle_kind) {
        return WorkerOutcome::Skipped;
    }

    let mut errored = false;
    for command in commands {
        let result = mediator.dispatch(command, cancel.clone()).await;
        if !result.is_ok() {
            errored = true;
            // Later commands of this tick depend on the earlier ones
            break;
        }
    }
    if errored {
        WorkerOutcome::Errored
    } else {
        WorkerOutcome::Processed
    }
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
