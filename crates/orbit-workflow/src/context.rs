//! Per-run state.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ErrorKind, WorkflowError};

/// The five phases, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    PreFlightValidation,
    OrderDiscovery,
    AtomicImageProcessing,
    OrderFinalization,
    EmailAndCleanup,
}

impl Phase {
    /// Every phase in order.
    pub const ALL: [Phase; 5] = [
        Self::PreFlightValidation,
        Self::OrderDiscovery,
        Self::AtomicImageProcessing,
        Self::OrderFinalization,
        Self::EmailAndCleanup,
    ];

    /// Wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PreFlightValidation => "pre-flight-validation",
            Self::OrderDiscovery => "order-discovery",
            Self::AtomicImageProcessing => "atomic-image-processing",
            Self::OrderFinalization => "order-finalization",
            Self::EmailAndCleanup => "email-and-cleanup",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Failed,
    Skipped,
}

/// Status of every phase, serialized as `{phaseName: status}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseStatuses {
    #[serde(rename = "pre-flight-validation")]
    pub pre_flight_validation: PhaseStatus,
    #[serde(rename = "order-discovery")]
    pub order_discovery: PhaseStatus,
    #[serde(rename = "atomic-image-processing")]
    pub atomic_image_processing: PhaseStatus,
    #[serde(rename = "order-finalization")]
    pub order_finalization: PhaseStatus,
    #[serde(rename = "email-and-cleanup")]
    pub email_and_cleanup: PhaseStatus,
}

impl PhaseStatuses {
    fn slot(&mut self, phase: Phase) -> &mut PhaseStatus {
        match phase {
            Phase::PreFlightValidation => &mut self.pre_flight_validation,
            Phase::OrderDiscovery => &mut self.order_discovery,
            Phase::AtomicImageProcessing => &mut self.atomic_image_processing,
            Phase::OrderFinalization => &mut self.order_finalization,
            Phase::EmailAndCleanup => &mut self.email_and_cleanup,
        }
    }

    /// Status of `phase`.
    pub fn get(&self, phase: Phase) -> PhaseStatus {
        match phase {
            Phase::PreFlightValidation => self.pre_flight_validation,
            Phase::OrderDiscovery => self.order_discovery,
            Phase::AtomicImageProcessing => self.atomic_image_processing,
            Phase::OrderFinalization => self.order_finalization,
            Phase::EmailAndCleanup => self.email_and_cleanup,
        }
    }

    /// Record the status of `phase`.
    pub fn set(&mut self, phase: Phase, status: PhaseStatus) {
        *self.slot(phase) = status;
    }

    /// Mark every phase still pending as skipped.
    pub fn skip_pending(&mut self) {
        for phase in Phase::ALL {
            if self.get(phase) == PhaseStatus::Pending {
                self.set(phase, PhaseStatus::Skipped);
            }
        }
    }
}

/// One entry of the run's error log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorRecord {
    /// Phase the error was raised in.
    pub phase: Phase,
    /// Unit the error belongs to, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_id: Option<String>,
    /// Error text.
    pub message: String,
    /// Classification.
    pub kind: ErrorKind,
    /// When it was recorded.
    pub timestamp: DateTime<Utc>,
}

/// Mutable state of one orchestration run.
///
/// Owned by exactly one run. Phases write to it as they go; once the run
/// ends it is only read to build the report.
#[derive(Debug, Clone)]
pub struct WorkflowContext {
    pub order_id: String,
    pub correlation_id: String,
    pub started_at: DateTime<Utc>,
    pub current_phase: Option<Phase>,
    pub phases: PhaseStatuses,
    pub total_units: usize,
    pub processed_units: usize,
    pub failed_units: usize,
    pub skipped_units: usize,
    pub retry_count: u32,
    errors: Vec<ErrorRecord>,
    unit_durations: Vec<Duration>,
}

impl WorkflowContext {
    /// Fresh context stamped now.
    pub fn new(order_id: impl Into<String>, correlation_id: impl Into<String>) -> Self {
        Self {
            order_id: order_id.into(),
            correlation_id: correlation_id.into(),
            started_at: Utc::now(),
            current_phase: None,
            phases: PhaseStatuses::default(),
            total_units: 0,
            processed_units: 0,
            failed_units: 0,
            skipped_units: 0,
            retry_count: 0,
            errors: Vec::new(),
            unit_durations: Vec::new(),
        }
    }

    /// Enter `phase`.
    pub fn begin(&mut self, phase: Phase) {
        self.current_phase = Some(phase);
        self.phases.set(phase, PhaseStatus::Running);
    }

    /// Leave `phase` with `status`.
    pub fn finish(&mut self, phase: Phase, status: PhaseStatus) {
        self.phases.set(phase, status);
    }

    /// Append to the error log.
    pub fn record_error(&mut self, phase: Phase, err: &WorkflowError) {
        self.push_error(phase, None, err);
    }

    /// Append a unit failure to the error log.
    pub fn record_unit_error(&mut self, phase: Phase, unit_id: &str, err: &WorkflowError) {
        self.push_error(phase, Some(unit_id.to_string()), err);
    }

    fn push_error(&mut self, phase: Phase, unit_id: Option<String>, err: &WorkflowError) {
        tracing::error!(
            order_id = %self.order_id,
            correlation_id = %self.correlation_id,
            phase = %phase,
            unit_id = unit_id.as_deref().unwrap_or(""),
            kind = %err.kind(),
            error = %err.message(),
            "workflow error"
        );
        self.errors.push(ErrorRecord {
            phase,
            unit_id,
            message: err.to_string(),
            kind: err.kind(),
            timestamp: Utc::now(),
        });
    }

    /// Record how long one unit took.
    pub fn record_unit_duration(&mut self, elapsed: Duration) {
        self.unit_durations.push(elapsed);
    }

    /// The error log, oldest first.
    pub fn errors(&self) -> &[ErrorRecord] {
        &self.errors
    }

    /// Summary statistics as of `finished_at`.
    pub fn stats(&self, finished_at: DateTime<Utc>) -> ExecutionStats {
        let duration_ms = (finished_at - self.started_at).num_milliseconds().max(0) as u64;
        let average_unit_ms = if self.unit_durations.is_empty() {
            0
        } else {
            let sum: Duration = self.unit_durations.iter().sum();
            (sum.as_millis() / self.unit_durations.len() as u128) as u64
        };
        let success_rate = if self.total_units == 0 {
            0.0
        } else {
            (self.processed_units + self.skipped_units) as f64 / self.total_units as f64
        };
        ExecutionStats {
            started_at: self.started_at,
            finished_at,
            duration_ms,
            average_unit_ms,
            success_rate,
        }
    }
}

/// Timing and yield of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionStats {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: u64,
    /// Mean time of the unit attempts made this run.
    pub average_unit_ms: u64,
    /// Complete units over total units.
    pub success_rate: f64,
}
