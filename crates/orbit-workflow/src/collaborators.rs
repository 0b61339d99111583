//! The external systems the workflow drives.
//!
//! Each trait is object-safe and async so the orchestrator can hold them
//! as `Arc<dyn ...>`. Production implementations talk to pooled RPC
//! services (see [`crate::rpc_backed`]); in-memory ones live behind the
//! `testing` feature.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use orbit_config::AnalysisType;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::model::{ImageUnit, Order, OrderStatus, OrderUpdate, UnitUpdate};

/// Order and unit records.
#[async_trait]
pub trait DataStore: Send + Sync {
    /// Cheap reachability probe.
    async fn ping(&self) -> Result<()>;

    /// Load an order; `None` when it does not exist.
    async fn get_order(&self, order_id: &str) -> Result<Option<Order>>;

    /// Every unit of an order.
    async fn list_units(&self, order_id: &str) -> Result<Vec<ImageUnit>>;

    /// Write to one unit.
    async fn update_unit(&self, unit_id: &str, update: &UnitUpdate) -> Result<()>;

    /// Write to one order.
    async fn update_order(&self, order_id: &str, update: &OrderUpdate) -> Result<()>;

    /// Number of paid orders still at the `pending` stage.
    async fn count_pending_orders(&self) -> Result<u64>;
}

/// One entry of a blob folder listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobEntry {
    /// File name within the folder.
    pub name: String,
    /// Full path within the bucket.
    pub path: String,
    /// Size in bytes, when known.
    #[serde(default)]
    pub size: Option<u64>,
}

/// Blob storage for originals and processed artifacts.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Cheap reachability probe.
    async fn ping(&self) -> Result<()>;

    /// Files directly inside `folder`.
    async fn list(&self, folder: &str) -> Result<Vec<BlobEntry>>;

    /// Whether `path` exists.
    async fn exists(&self, path: &str) -> Result<bool>;

    /// Delete `path`. Deleting a missing file is not an error.
    async fn delete(&self, path: &str) -> Result<()>;

    /// Copy `from` to `to`, overwriting.
    async fn copy(&self, from: &str, to: &str) -> Result<()>;

    /// A time-limited URL for reading `path`.
    async fn signed_url(&self, path: &str, ttl: Duration) -> Result<String>;
}

/// Payload of the completion notice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionNotice {
    /// Order id.
    pub order_id: String,
    /// Recipient.
    pub customer_email: String,
    /// Terminal status of the order.
    pub status: OrderStatus,
    /// Units that reached `complete`.
    pub processed: usize,
    /// Units in the order.
    pub total: usize,
}

/// Sends the completion notice.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Notify the customer that their order finished.
    async fn order_completed(&self, notice: &CompletionNotice) -> Result<()>;
}

/// Structured result of AI analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageAnalysis {
    /// Flavour of analysis performed.
    pub analysis_type: AnalysisType,
    /// Title, description, tags, and the rest of the descriptive payload.
    pub metadata: Value,
    /// Model confidence in `[0, 1]`.
    #[serde(default)]
    pub confidence: f64,
    /// Model that produced the analysis.
    #[serde(default)]
    pub model_version: String,
}

/// Input to metadata embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbedRequest {
    /// Blob path of the original.
    pub source_path: String,
    /// Blob path the artifact must be written to.
    pub output_path: String,
    /// Metadata to embed.
    pub metadata: Value,
    /// Output quality, 1-100.
    pub compression_quality: u8,
}

/// Outcome of metadata embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbedResult {
    /// Where the artifact was written.
    pub processed_path: String,
    /// Metadata fields written into the artifact.
    #[serde(default)]
    pub embedded_fields: Vec<String>,
}

/// The opaque remote image capabilities.
#[async_trait]
pub trait ImageServices: Send + Sync {
    /// Analyze the image at `image_url`.
    async fn analyze(&self, image_url: &str, analysis_type: AnalysisType) -> Result<ImageAnalysis>;

    /// Embed metadata into a copy of the original.
    async fn embed(&self, request: &EmbedRequest) -> Result<EmbedResult>;
}

/// Everything the orchestrator talks to.
#[derive(Clone)]
pub struct Collaborators {
    /// Order and unit records.
    pub data: Arc<dyn DataStore>,
    /// Originals and artifacts.
    pub blobs: Arc<dyn BlobStore>,
    /// Completion notices.
    pub notifier: Arc<dyn Notifier>,
    /// Analysis and embedding.
    pub images: Arc<dyn ImageServices>,
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}
