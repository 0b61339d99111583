//! Structured progress events.
//!
//! The orchestrator writes phase transitions to a single-consumer channel
//! when one is attached. Nobody listening is fine: a closed receiver is
//! ignored.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::context::{Phase, PhaseStatus};
use crate::error::ErrorKind;
use crate::model::{OrderStatus, UnitStatus};

/// One progress event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkflowEvent {
    /// A run began.
    RunStarted {
        order_id: String,
        correlation_id: String,
    },
    /// A phase began.
    PhaseStarted { phase: Phase },
    /// A phase ended.
    PhaseFinished {
        phase: Phase,
        status: PhaseStatus,
        duration_ms: u64,
    },
    /// One unit's attempt ended.
    UnitFinished {
        unit_id: String,
        status: UnitStatus,
        duration_ms: u64,
    },
    /// An operation failed and will be retried.
    Retrying {
        operation: String,
        kind: ErrorKind,
        attempt: u32,
        delay_ms: u64,
    },
    /// A run ended.
    RunFinished {
        success: bool,
        order_status: Option<OrderStatus>,
    },
}

/// Sending half of the event channel.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<WorkflowEvent>,
}

impl EventSink {
    /// Wrap a sender.
    pub fn new(tx: mpsc::UnboundedSender<WorkflowEvent>) -> Self {
        Self { tx }
    }

    /// A sink and its receiver.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<WorkflowEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    /// Deliver an event.
    pub fn emit(&self, event: WorkflowEvent) {
        if self.tx.send(event).is_err() {
            tracing::trace!("event receiver dropped");
        }
    }
}

/// Emit through an optional sink.
pub(crate) fn emit(sink: Option<&EventSink>, event: WorkflowEvent) {
    if let Some(sink) = sink {
        sink.emit(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_wire_shape() {
        let event = WorkflowEvent::PhaseFinished {
            phase: Phase::OrderDiscovery,
            status: PhaseStatus::Failed,
            duration_ms: 12,
        };
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({
                "type": "phase_finished",
                "phase": "order-discovery",
                "status": "failed",
                "duration_ms": 12
            })
        );
    }

    #[test]
    fn test_closed_receiver_is_ignored() {
        let (sink, rx) = EventSink::channel();
        drop(rx);
        sink.emit(WorkflowEvent::PhaseStarted {
            phase: Phase::PreFlightValidation,
        });
    }

    #[tokio::test]
    async fn test_events_arrive_in_order() {
        let (sink, mut rx) = EventSink::channel();
        emit(
            Some(&sink),
            WorkflowEvent::PhaseStarted {
                phase: Phase::PreFlightValidation,
            },
        );
        emit(
            Some(&sink),
            WorkflowEvent::PhaseStarted {
                phase: Phase::OrderDiscovery,
            },
        );
        emit(None, WorkflowEvent::RunFinished {
            success: true,
            order_status: None,
        });
        drop(sink);

        let mut phases = Vec::new();
        while let Some(WorkflowEvent::PhaseStarted { phase }) = rx.recv().await {
            phases.push(phase);
        }
        assert_eq!(phases, vec![Phase::PreFlightValidation, Phase::OrderDiscovery]);
    }
}
