//! Process command - runs one order through the workflow.

use anyhow::{Result, bail};
use clap::{Args, ValueEnum};
use console::style;
use orbit_workflow::{Action, PhaseStatus, ProcessRequest, WorkflowEvent};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::Context;

/// What to do with the order.
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum ActionArg {
    /// Full run
    #[default]
    Process,
    /// Recount and finalize only
    Finalize,
}

impl From<ActionArg> for Action {
    fn from(arg: ActionArg) -> Self {
        match arg {
            ActionArg::Process => Action::Process,
            ActionArg::Finalize => Action::Finalize,
        }
    }
}

/// Arguments for the process command.
#[derive(Args, Debug)]
pub struct ProcessArgs {
    /// Order to process
    pub order_id: String,

    /// Action to take
    #[arg(short, long, value_enum, default_value_t = ActionArg::Process)]
    pub action: ActionArg,

    /// Correlation id for tracing (generated when omitted)
    #[arg(long)]
    pub correlation_id: Option<String>,
}

/// Run the process command.
///
/// Progress goes to stderr; the JSON report goes to stdout.
pub async fn run(args: ProcessArgs, ctx: &Context) -> Result<()> {
    let (tx, rx) = mpsc::unbounded_channel();
    let orchestrator = ctx.orchestrator()?.with_event_sink(tx);
    let printer = tokio::spawn(print_progress(rx, ctx.verbose));

    let mut request = ProcessRequest::new(&args.order_id).with_action(args.action.into());
    request.correlation_id = args.correlation_id;
    let report = orchestrator.run(request).await;

    drop(orchestrator);
    join_printer(printer).await;

    println!("{}", serde_json::to_string_pretty(&report)?);
    if !report.success {
        bail!("workflow failed for order {}", args.order_id);
    }
    Ok(())
}

/// Wait for the progress printer to drain. Returns false if it died.
async fn join_printer(printer: JoinHandle<()>) -> bool {
    match printer.await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(error = %e, "progress output stopped early");
            false
        }
    }
}

async fn print_progress(mut rx: mpsc::UnboundedReceiver<WorkflowEvent>, verbose: bool) {
    while let Some(event) = rx.recv().await {
        match event {
            WorkflowEvent::PhaseFinished {
                phase,
                status,
                duration_ms,
            } => {
                let marker = match status {
                    PhaseStatus::Completed => style("✓").green(),
                    PhaseStatus::Failed => style("✗").red(),
                    _ => style("-").dim(),
                };
                eprintln!("{} {} ({} ms)", marker, phase, duration_ms);
            }
            WorkflowEvent::UnitFinished {
                unit_id, status, ..
            } if verbose => {
                eprintln!("    {} {}", style(unit_id).dim(), status);
            }
            WorkflowEvent::Retrying {
                operation,
                attempt,
                delay_ms,
                ..
            } if verbose => {
                eprintln!(
                    "    {} {} attempt {} in {} ms",
                    style("retry").yellow(),
                    operation,
                    attempt,
                    delay_ms
                );
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orbit_workflow::Phase;

    #[tokio::test]
    async fn test_printer_drains_after_sender_drops() {
        let (tx, rx) = mpsc::unbounded_channel();
        let printer = tokio::spawn(print_progress(rx, true));
        tx.send(WorkflowEvent::PhaseFinished {
            phase: Phase::PreFlightValidation,
            status: PhaseStatus::Completed,
            duration_ms: 3,
        })
        .unwrap();
        drop(tx);

        assert!(join_printer(printer).await);
    }

    #[tokio::test]
    async fn test_panicked_printer_is_reported() {
        let printer = tokio::spawn(async { panic!("terminal went away") });
        assert!(!join_printer(printer).await);
    }
}
