//! Orders, image units, and their status model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ErrorKind;

// ─────────────────────────────────────────────────────────────────────────────
// Units
// ─────────────────────────────────────────────────────────────────────────────

/// Lifecycle of one image.
///
/// ```text
/// pending → in_progress → analyzed → embedded → verified → complete
///                 └──────────────┴──────────┴─────────┴──→ error
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitStatus {
    /// Not yet attempted.
    #[default]
    Pending,
    /// An attempt is running.
    InProgress,
    /// Analysis persisted.
    Analyzed,
    /// Metadata embedded into the artifact.
    Embedded,
    /// Artifact confirmed present in the blob store.
    Verified,
    /// Final path persisted.
    Complete,
    /// The last attempt failed.
    Error,
}

impl UnitStatus {
    /// Wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Analyzed => "analyzed",
            Self::Embedded => "embedded",
            Self::Verified => "verified",
            Self::Complete => "complete",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for UnitStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One image belonging to an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageUnit {
    /// Unit id.
    pub id: String,
    /// Owning order.
    pub order_id: String,
    /// Original file name.
    pub file_name: String,
    /// Blob path of the original. Empty means "derive from the layout".
    #[serde(default)]
    pub original_path: String,
    /// Current status.
    #[serde(default)]
    pub status: UnitStatus,
    /// Persisted analysis payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis: Option<Value>,
    /// Blob path of the processed artifact.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processed_path: Option<String>,
    /// Why the last attempt failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Classification of the last failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    /// Status the unit held before the failed attempt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_good_status: Option<UnitStatus>,
    /// When the unit reached `complete`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processed_at: Option<DateTime<Utc>>,
}

impl ImageUnit {
    /// A pending unit with no original path recorded.
    pub fn new(id: impl Into<String>, order_id: impl Into<String>, file_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            order_id: order_id.into(),
            file_name: file_name.into(),
            original_path: String::new(),
            status: UnitStatus::Pending,
            analysis: None,
            processed_path: None,
            error_message: None,
            error_kind: None,
            last_good_status: None,
            processed_at: None,
        }
    }
}

/// A write to one unit record. `status` is always written; the remaining
/// fields are written only when set, except the error fields, which are
/// cleared by any non-error update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitUpdate {
    /// New status.
    pub status: UnitStatus,
    /// Analysis payload to persist.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis: Option<Value>,
    /// Artifact path to persist.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processed_path: Option<String>,
    /// Failure message (error updates only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Failure kind (error updates only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    /// Status to remember as last known good (error updates only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_good_status: Option<UnitStatus>,
    /// Completion time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processed_at: Option<DateTime<Utc>>,
}

impl UnitUpdate {
    /// Status-only update.
    pub fn status(status: UnitStatus) -> Self {
        Self {
            status,
            analysis: None,
            processed_path: None,
            error_message: None,
            error_kind: None,
            last_good_status: None,
            processed_at: None,
        }
    }

    /// Persist an analysis and mark the unit analyzed.
    pub fn analyzed(analysis: Value) -> Self {
        Self {
            analysis: Some(analysis),
            ..Self::status(UnitStatus::Analyzed)
        }
    }

    /// Persist the artifact path and mark the unit complete.
    pub fn complete(processed_path: impl Into<String>) -> Self {
        Self {
            processed_path: Some(processed_path.into()),
            processed_at: Some(Utc::now()),
            ..Self::status(UnitStatus::Complete)
        }
    }

    /// Mark the unit failed.
    pub fn failed(message: impl Into<String>, kind: ErrorKind, last_good: UnitStatus) -> Self {
        Self {
            error_message: Some(message.into()),
            error_kind: Some(kind),
            last_good_status: Some(last_good),
            ..Self::status(UnitStatus::Error)
        }
    }

    /// Apply this update to a unit record.
    pub fn apply_to(&self, unit: &mut ImageUnit) {
        unit.status = self.status;
        if let Some(analysis) = &self.analysis {
            unit.analysis = Some(analysis.clone());
        }
        if let Some(path) = &self.processed_path {
            unit.processed_path = Some(path.clone());
        }
        if let Some(at) = self.processed_at {
            unit.processed_at = Some(at);
        }
        if self.status == UnitStatus::Error {
            unit.error_message = self.error_message.clone();
            unit.error_kind = self.error_kind;
            unit.last_good_status = self.last_good_status;
        } else {
            unit.error_message = None;
            unit.error_kind = None;
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Orders
// ─────────────────────────────────────────────────────────────────────────────

/// Payment state of an order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// Awaiting payment.
    #[default]
    Pending,
    /// Paid; eligible for processing.
    Completed,
    /// Payment failed.
    Failed,
    /// Refunded.
    Refunded,
}

/// Persisted processing stage of an order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStage {
    /// Not started.
    #[default]
    Pending,
    /// A run is underway.
    Processing,
    /// Every unit completed.
    Completed,
    /// Some units completed.
    CompletedWithErrors,
    /// No unit completed.
    Failed,
}

/// Terminal status of an order, derived from unit counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// All units complete.
    Completed,
    /// At least one complete and at least one not.
    CompletedWithErrors,
    /// Nothing complete.
    Failed,
}

impl OrderStatus {
    /// Derive from the number of complete units out of `total`.
    pub fn derive(complete: usize, total: usize) -> Self {
        if complete == 0 {
            Self::Failed
        } else if complete >= total {
            Self::Completed
        } else {
            Self::CompletedWithErrors
        }
    }

    /// Wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::CompletedWithErrors => "completed_with_errors",
            Self::Failed => "failed",
        }
    }
}

impl From<OrderStatus> for ProcessingStage {
    fn from(status: OrderStatus) -> Self {
        match status {
            OrderStatus::Completed => Self::Completed,
            OrderStatus::CompletedWithErrors => Self::CompletedWithErrors,
            OrderStatus::Failed => Self::Failed,
        }
    }
}

/// An order record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    /// Order id.
    pub id: String,
    /// Owning user.
    #[serde(default)]
    pub user_id: String,
    /// Upload batch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_id: Option<String>,
    /// Where the completion notice goes.
    #[serde(default)]
    pub customer_email: String,
    /// Payment state.
    #[serde(default)]
    pub payment_status: PaymentStatus,
    /// Persisted stage.
    #[serde(default)]
    pub processing_stage: ProcessingStage,
    /// Whether the completion notice has been sent.
    #[serde(default)]
    pub notification_sent: bool,
    /// When the order reached a terminal stage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Order {
    /// A paid order with nothing processed.
    pub fn paid(id: impl Into<String>, customer_email: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            user_id: String::new(),
            batch_id: None,
            customer_email: customer_email.into(),
            payment_status: PaymentStatus::Completed,
            processing_stage: ProcessingStage::Pending,
            notification_sent: false,
            completed_at: None,
        }
    }

    /// Paid and not yet picked up by a run.
    pub fn is_awaiting_processing(&self) -> bool {
        self.payment_status == PaymentStatus::Completed
            && self.processing_stage == ProcessingStage::Pending
    }
}

/// A write to one order record; unset fields are left alone.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderUpdate {
    /// New stage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processing_stage: Option<ProcessingStage>,
    /// New notification flag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notification_sent: Option<bool>,
    /// Completion time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl OrderUpdate {
    /// Set the stage.
    pub fn stage(stage: ProcessingStage) -> Self {
        Self {
            processing_stage: Some(stage),
            ..Self::default()
        }
    }

    /// Write a terminal stage stamped now.
    pub fn terminal(status: OrderStatus) -> Self {
        Self {
            processing_stage: Some(status.into()),
            completed_at: Some(Utc::now()),
            ..Self::default()
        }
    }

    /// Record that the completion notice went out.
    pub fn notified() -> Self {
        Self {
            notification_sent: Some(true),
            ..Self::default()
        }
    }

    /// Apply this update to an order record.
    pub fn apply_to(&self, order: &mut Order) {
        if let Some(stage) = self.processing_stage {
            order.processing_stage = stage;
        }
        if let Some(sent) = self.notification_sent {
            order.notification_sent = sent;
        }
        if let Some(at) = self.completed_at {
            order.completed_at = Some(at);
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Blob layout
// ─────────────────────────────────────────────────────────────────────────────

/// Where an order's files live in the blob store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderLayout {
    /// Subfolder holding originals.
    pub original: String,
    /// Subfolder holding processed artifacts.
    pub processed: String,
}

impl Default for FolderLayout {
    fn default() -> Self {
        Self {
            original: "original".to_string(),
            processed: "processed".to_string(),
        }
    }
}

impl FolderLayout {
    /// `{order_id}/original`
    pub fn original_folder(&self, order_id: &str) -> String {
        format!("{order_id}/{}", self.original)
    }

    /// `{order_id}/processed`
    pub fn processed_folder(&self, order_id: &str) -> String {
        format!("{order_id}/{}", self.processed)
    }

    /// Where the unit's original lives.
    pub fn original_path(&self, unit: &ImageUnit) -> String {
        if unit.original_path.is_empty() {
            format!("{}/{}", self.original_folder(&unit.order_id), unit.file_name)
        } else {
            unit.original_path.clone()
        }
    }

    /// `{order_id}/processed/{unit_id}_{file_name}`
    pub fn processed_path(&self, unit: &ImageUnit) -> String {
        format!(
            "{}/{}",
            self.processed_folder(&unit.order_id),
            Self::artifact_name(unit)
        )
    }

    /// File name of the unit's artifact.
    pub fn artifact_name(unit: &ImageUnit) -> String {
        format!("{}_{}", unit.id, unit.file_name)
    }

    /// Whether a processed-folder entry belongs to `unit_id`.
    pub fn is_artifact_of(name: &str, unit_id: &str) -> bool {
        name.strip_prefix(unit_id)
            .is_some_and(|rest| rest.starts_with('_'))
    }
}
