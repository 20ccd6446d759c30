// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Provisioning saga.
//!
//! 1. Persist the worker as PENDING and publish `worker:created`.
//! 2. Launch the VM. On success record the instance id, move to
//!    PROVISIONED, publish `worker:provisioned`.
//! 3. On failure move to FAILED, publish `worker:provision_failed`, and
//!    compensate by terminating the instance if the provider created one.
//!    A compensation failure is logged with the orphan instance id; the
//!    original launch error is the one returned.

use super::{cancelled, persist_ok, with_cancel, CreateWorkerPayload};
use crate::context::FleetContext;
use labfleet_adapters::RunInstanceSpec;
use labfleet_core::{Clock, CreateWorkerSpec, OperationResult, Worker};
use tokio_util::sync::CancellationToken;

pub(crate) async fn handle_create<C: Clock>(
    ctx: &FleetContext<C>,
    payload: CreateWorkerPayload,
    cancel: &CancellationToken,
) -> OperationResult {
    if payload.name.trim().is_empty() {
        return OperationResult::bad_request("worker name is required");
    }
    if payload.region.trim().is_empty() {
        return OperationResult::bad_request("region is required");
    }
    if payload.instance_type.trim().is_empty() {
        return OperationResult::bad_request("instance_type is required");
    }

    // Resolve the image up front so a bad name fails before anything exists
    let image_id = match resolve_image(ctx, &payload, cancel).await {
        Ok(Some(image_id)) => image_id,
        Ok(None) => {
            return OperationResult::bad_request("one of image_id or image_name is required")
        }
        Err(result) => return result,
    };

    let now = ctx.clock.now_utc();
    let mut worker = Worker::create(
        CreateWorkerSpec {
            name: payload.name.clone(),
            region: payload.region.clone(),
            created_by: payload.created_by.clone(),
            instance_type: Some(payload.instance_type.clone()),
            image_id: Some(image_id.clone()),
            image_name: payload.image_name.clone(),
            tags: payload.tags.clone(),
        },
        now,
    );
    if let Err(err) = ctx.persist_and_publish(&mut worker) {
        return OperationResult::internal(err.to_string());
    }

    let mut run_tags = payload.tags.clone();
    run_tags
        .entry("Name".to_string())
        .or_insert_with(|| payload.name.clone());
    let spec = RunInstanceSpec {
        image_id,
        instance_type: payload.instance_type.clone(),
        subnet_id: payload.subnet_id.clone(),
        security_group_ids: payload.security_group_ids.clone(),
        tags: run_tags,
    };

    let launched = match with_cancel(cancel, ctx.cloud.run_instance(&payload.region, &spec)).await {
        Some(result) => result,
        None => {
            // Cancelled before the provider was asked for anything new; the
            // PENDING worker stays for the operator to retry or terminate.
            return cancelled();
        }
    };

    match launched {
        Ok(instance_id) => {
            let now = ctx.clock.now_utc();

            // Best-effort: detailed monitoring makes the utilization poll
            // meaningful; a failure here is not a provisioning failure
            let monitored = match ctx
                .cloud
                .set_detailed_monitoring(&payload.region, &instance_id, true)
                .await
            {
                Ok(()) => true,
                Err(err) => {
                    tracing::warn!(worker = %worker.id, error = %err, "detailed monitoring not enabled");
                    false
                }
            };
            if let Err(err) = worker.record_provisioned(instance_id.as_str(), monitored, now) {
                return OperationResult::from(err);
            }

            tracing::info!(
                worker = %worker.id,
                instance = instance_id,
                region = payload.region,
                "worker provisioned"
            );
            persist_ok(ctx, &mut worker)
        }
        Err(err) => {
            let now = ctx.clock.now_utc();
            worker.record_provision_failed(err.to_string(), now);
            match ctx.persist_and_publish(&mut worker) {
                Ok(_) => ctx.publish_snapshot(&worker),
                Err(persist_err) => {
                    tracing::error!(worker = %worker.id, error = %persist_err, "failed to persist FAILED worker")
                }
            }

            // Compensate if the provider created a resource before failing
            if let Some(orphan) = &err.resource_id {
                match ctx.cloud.terminate_instance(&payload.region, orphan).await {
                    Ok(()) => {
                        tracing::info!(worker = %worker.id, instance = orphan, "compensated failed provision")
                    }
                    Err(comp_err) => tracing::error!(
                        worker = %worker.id,
                        instance = orphan,
                        error = %comp_err,
                        "provision compensation failed, cloud instance orphaned"
                    ),
                }
            }

            OperationResult::failed_dependency("cloud", err.to_string())
        }
    }
}

async fn resolve_image<C: Clock>(
    ctx: &FleetContext<C>,
    payload: &CreateWorkerPayload,
    cancel: &CancellationToken,
) -> Result<Option<String>, OperationResult> {
    if let Some(image_id) = &payload.image_id {
        return Ok(Some(image_id.clone()));
    }
    let Some(image_name) = &payload.image_name else {
        return Ok(None);
    };
    let ids = match with_cancel(
        cancel,
        ctx.cloud.describe_image_ids(&payload.region, image_name),
    )
    .await
    {
        Some(Ok(ids)) => ids,
        Some(Err(err)) => {
            return Err(OperationResult::failed_dependency("cloud", err.to_string()))
        }
        None => return Err(cancelled()),
    };
    match ids.into_iter().next() {
        Some(id) => Ok(Some(id)),
        None => Err(OperationResult::bad_request(format!(
            "no image matches '{image_name}'"
        ))),
    }
}

#[cfg(test)]
#[path = "create_tests.rs"]
mod tests;
