// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Adoption of pre-existing cloud instances.

use super::{cancelled, with_cancel, worker_data, ImportWorkerPayload};
use crate::context::FleetContext;
use labfleet_adapters::{InstanceFilters, VmFacts};
use labfleet_core::{Clock, ImportWorkerSpec, OperationResult, Worker};
use labfleet_wire::{BulkImportFailure, BulkImportSummary};
use tokio_util::sync::CancellationToken;

pub(crate) async fn handle_import<C: Clock>(
    ctx: &FleetContext<C>,
    payload: ImportWorkerPayload,
    cancel: &CancellationToken,
) -> OperationResult {
    if payload.region.trim().is_empty() {
        return OperationResult::bad_request("region is required");
    }

    let filters = match import_filters(ctx, &payload, cancel).await {
        Ok(filters) => filters,
        Err(result) => return result,
    };

    let instances = match with_cancel(cancel, ctx.cloud.list_instances(&payload.region, &filters))
        .await
    {
        Some(Ok(instances)) => instances,
        Some(Err(err)) => return OperationResult::failed_dependency("cloud", err.to_string()),
        None => return cancelled(),
    };
    let Some(facts) = instances.into_iter().next() else {
        return OperationResult::not_found("no matching instance found");
    };

    import_one(ctx, &payload.region, &facts, payload.name.as_deref(), &payload.created_by)
}

/// Import a single discovered instance. Shared by the single-import command
/// and the bulk sweep.
pub(crate) fn import_one<C: Clock>(
    ctx: &FleetContext<C>,
    region: &str,
    facts: &VmFacts,
    name: Option<&str>,
    created_by: &str,
) -> OperationResult {
    // Re-importing an instance we already track is a conflict, always
    if let Some(owner) = ctx.store.worker_id_for_instance(&facts.instance_id) {
        return OperationResult::conflict(format!(
            "instance {} already imported by worker {owner}",
            facts.instance_id
        ));
    }

    let spec = ImportWorkerSpec {
        name: name
            .map(str::to_string)
            .unwrap_or_else(|| facts.display_name()),
        region: region.to_string(),
        created_by: created_by.to_string(),
        facts: facts.to_cloud_facts(),
        cloud_state: facts.state.clone(),
    };
    let mut worker = match Worker::import_from_existing_instance(spec, ctx.clock.now_utc()) {
        Ok(worker) => worker,
        Err(err) => return OperationResult::from(err),
    };

    match ctx.persist_and_publish(&mut worker) {
        Ok(significant) => {
            if significant {
                ctx.publish_snapshot(&worker);
            }
        }
        // Lost a race with a concurrent import of the same instance
        Err(err) => return OperationResult::conflict(err.to_string()),
    }
    tracing::info!(worker = %worker.id, instance = facts.instance_id, "worker imported");
    OperationResult::ok(worker_data(&worker))
}

pub(crate) async fn handle_bulk_import<C: Clock>(
    ctx: &FleetContext<C>,
    region: &str,
    image_name: &str,
    created_by: &str,
    cancel: &CancellationToken,
) -> OperationResult {
    if region.trim().is_empty() || image_name.trim().is_empty() {
        return OperationResult::bad_request("region and image_name are required");
    }

    let image_ids = match with_cancel(cancel, ctx.cloud.describe_image_ids(region, image_name))
        .await
    {
        Some(Ok(ids)) => ids,
        Some(Err(err)) => return OperationResult::failed_dependency("cloud", err.to_string()),
        None => return cancelled(),
    };
    if image_ids.is_empty() {
        return OperationResult::bad_request(format!("no image matches '{image_name}'"));
    }

    let filters = InstanceFilters::by_image_ids(image_ids);
    let instances = match with_cancel(cancel, ctx.cloud.list_instances(region, &filters)).await {
        Some(Ok(instances)) => instances,
        Some(Err(err)) => return OperationResult::failed_dependency("cloud", err.to_string()),
        None => return cancelled(),
    };

    // Partition, then import each new instance independently: one bad
    // instance never aborts the sweep.
    let mut summary = BulkImportSummary::default();
    for facts in &instances {
        if ctx
            .store
            .worker_id_for_instance(&facts.instance_id)
            .is_some()
        {
            summary.already_imported.push(facts.instance_id.clone());
            continue;
        }
        let result = import_one(ctx, region, facts, None, created_by);
        if result.is_ok() {
            summary.imported.push(facts.instance_id.clone());
        } else {
            summary.failed.push(BulkImportFailure {
                instance_id: facts.instance_id.clone(),
                error: result.message.unwrap_or_else(|| "import failed".to_string()),
            });
        }
    }

    tracing::info!(
        region,
        image_name,
        imported = summary.imported.len(),
        already = summary.already_imported.len(),
        failed = summary.failed.len(),
        "bulk import complete"
    );
    OperationResult::ok(serde_json::to_value(&summary).ok())
}

async fn import_filters<C: Clock>(
    ctx: &FleetContext<C>,
    payload: &ImportWorkerPayload,
    cancel: &CancellationToken,
) -> Result<InstanceFilters, OperationResult> {
    if let Some(instance_id) = &payload.instance_id {
        return Ok(InstanceFilters::by_instance_id(instance_id.clone()));
    }
    if let Some(image_id) = &payload.image_id {
        return Ok(InstanceFilters::by_image_ids(vec![image_id.clone()]));
    }
    if let Some(image_name) = &payload.image_name {
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
        if ids.is_empty() {
            return Err(OperationResult::bad_request(format!(
                "no image matches '{image_name}'"
            )));
        }
        return Ok(InstanceFilters::by_image_ids(ids));
    }
    Err(OperationResult::bad_request(
        "one of instance_id, image_id or image_name is required",
    ))
}

#[cfg(test)]
#[path = "import_tests.rs"]
mod tests;
