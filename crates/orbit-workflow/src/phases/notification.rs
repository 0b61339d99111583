//! Email and cleanup.

use super::{Finalized, PhaseEnv};
use crate::collaborators::CompletionNotice;
use crate::context::{PhaseStatus, WorkflowContext};
use crate::error::{Result, WorkflowError};
use crate::model::OrderUpdate;

/// Send the completion notice once per order.
///
/// Returns [`PhaseStatus::Skipped`] when the order's notification flag is
/// already set. The flag is written only after the notifier succeeds.
pub(crate) async fn run(
    env: &PhaseEnv<'_>,
    ctx: &mut WorkflowContext,
    finalized: Finalized,
) -> Result<PhaseStatus> {
    let data = &env.collaborators.data;
    let notifier = &env.collaborators.notifier;
    let order_id = ctx.order_id.clone();

    let order = env
        .retry
        .run_counted("email.reload_order", &mut ctx.retry_count, || {
            data.get_order(&order_id)
        })
        .await?
        .ok_or_else(|| WorkflowError::DataStore(format!("order {order_id} not found")))?;

    if order.notification_sent {
        tracing::info!(order_id = %order_id, "completion notice already sent");
        return Ok(PhaseStatus::Skipped);
    }

    let notice = CompletionNotice {
        order_id: order_id.clone(),
        customer_email: order.customer_email,
        status: finalized.status,
        processed: finalized.complete,
        total: finalized.total,
    };
    env.retry
        .run_counted("email.send", &mut ctx.retry_count, || {
            notifier.order_completed(&notice)
        })
        .await?;

    let update = OrderUpdate::notified();
    env.retry
        .run_counted("email.mark_sent", &mut ctx.retry_count, || {
            data.update_order(&order_id, &update)
        })
        .await?;

    tracing::info!(order_id = %order_id, "completion notice sent");
    Ok(PhaseStatus::Completed)
}
