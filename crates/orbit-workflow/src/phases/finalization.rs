//! Order finalization.

use std::collections::HashSet;

use super::PhaseEnv;
use crate::context::WorkflowContext;
use crate::error::{Result, WorkflowError};
use crate::model::{FolderLayout, OrderStatus, OrderUpdate, UnitStatus};

/// Terminal verdict written to the order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Finalized {
    pub status: OrderStatus,
    pub complete: usize,
    pub total: usize,
}

/// Recount units from the data store, corroborate against the blob
/// store, and write the order's terminal stage.
///
/// The recount is authoritative: in-memory counters from processing are
/// not consulted.
pub(crate) async fn run(env: &PhaseEnv<'_>, ctx: &mut WorkflowContext) -> Result<Finalized> {
    let data = &env.collaborators.data;
    let blobs = &env.collaborators.blobs;
    let order_id = ctx.order_id.clone();

    let units = env
        .retry
        .run_counted("finalization.recount", &mut ctx.retry_count, || {
            data.list_units(&order_id)
        })
        .await?;
    let total = units.len();
    let complete: Vec<_> = units
        .iter()
        .filter(|u| u.status == UnitStatus::Complete)
        .collect();
    let status = OrderStatus::derive(complete.len(), total);
    ctx.total_units = total;

    if complete.is_empty() {
        let update = OrderUpdate::terminal(OrderStatus::Failed);
        env.retry
            .run_counted("finalization.mark_failed", &mut ctx.retry_count, || {
                data.update_order(&order_id, &update)
            })
            .await?;
        return Err(WorkflowError::Unknown(format!(
            "no units of order {order_id} reached complete ({total} total)"
        )));
    }

    let folder = env.settings.layout.processed_folder(&order_id);
    let listed = env
        .retry
        .run_counted("finalization.list_artifacts", &mut ctx.retry_count, || {
            blobs.list(&folder)
        })
        .await?;
    let names: HashSet<&str> = listed.iter().map(|e| e.name.as_str()).collect();

    let missing: Vec<&str> = complete
        .iter()
        .filter(|u| !names.contains(FolderLayout::artifact_name(u).as_str()))
        .map(|u| u.id.as_str())
        .collect();
    if !missing.is_empty() {
        return Err(WorkflowError::StorageAccess(format!(
            "{} completed units have no artifact in {folder}: {}",
            missing.len(),
            missing.join(", ")
        )));
    }
    if listed.len() > complete.len() {
        tracing::warn!(
            order_id = %order_id,
            artifacts = listed.len(),
            complete = complete.len(),
            "processed folder holds more files than completed units"
        );
    }

    let update = OrderUpdate::terminal(status);
    env.retry
        .run_counted("finalization.write_status", &mut ctx.retry_count, || {
            data.update_order(&order_id, &update)
        })
        .await?;

    tracing::info!(
        order_id = %order_id,
        status = status.as_str(),
        complete = complete.len(),
        total,
        "order finalized"
    );
    Ok(Finalized {
        status,
        complete: complete.len(),
        total,
    })
}
