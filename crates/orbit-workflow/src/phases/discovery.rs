//! Order discovery.

use super::PhaseEnv;
use crate::context::WorkflowContext;
use crate::error::{Result, WorkflowError};
use crate::model::{ImageUnit, Order, OrderUpdate, PaymentStatus, ProcessingStage};

/// What discovery found.
#[derive(Debug, Clone)]
pub(crate) struct Discovered {
    pub order: Order,
    pub units: Vec<ImageUnit>,
}

/// Load the order and its units and check them against the blob store.
///
/// With `mark_processing`, the order's stage is moved to `processing`
/// once everything checks out.
pub(crate) async fn run(
    env: &PhaseEnv<'_>,
    ctx: &mut WorkflowContext,
    mark_processing: bool,
) -> Result<Discovered> {
    let data = &env.collaborators.data;
    let blobs = &env.collaborators.blobs;
    let order_id = ctx.order_id.clone();

    let order = env
        .retry
        .run_counted("discovery.get_order", &mut ctx.retry_count, || {
            data.get_order(&order_id)
        })
        .await?
        .ok_or_else(|| WorkflowError::DataStore(format!("order {order_id} not found")))?;

    if order.payment_status != PaymentStatus::Completed {
        return Err(WorkflowError::DataStore(format!(
            "order {order_id} is not eligible for processing: payment is {:?}",
            order.payment_status
        )));
    }

    let units = env
        .retry
        .run_counted("discovery.list_units", &mut ctx.retry_count, || {
            data.list_units(&order_id)
        })
        .await?;
    if units.is_empty() {
        return Err(WorkflowError::DataStore(format!(
            "order {order_id} has no image records"
        )));
    }

    let folder = env.settings.layout.original_folder(&order_id);
    let files = env
        .retry
        .run_counted("discovery.list_originals", &mut ctx.retry_count, || {
            blobs.list(&folder)
        })
        .await?;
    if files.len() != units.len() {
        return Err(WorkflowError::StorageAccess(format!(
            "file count mismatch in {folder}: {} files for {} image records",
            files.len(),
            units.len()
        )));
    }

    ctx.total_units = units.len();

    if mark_processing {
        let update = OrderUpdate::stage(ProcessingStage::Processing);
        env.retry
            .run_counted("discovery.mark_processing", &mut ctx.retry_count, || {
                data.update_order(&order_id, &update)
            })
            .await?;
    }

    tracing::info!(
        order_id = %order_id,
        units = units.len(),
        "order discovered"
    );
    Ok(Discovered { order, units })
}
