//! In-memory collaborators for tests and local development.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use orbit_config::AnalysisType;
use parking_lot::Mutex;

use crate::collaborators::{
    BlobEntry, BlobStore, Collaborators, CompletionNotice, DataStore, EmbedRequest, EmbedResult,
    ImageAnalysis, ImageServices, Notifier,
};
use crate::error::{ErrorKind, Result, WorkflowError};
use crate::mock;
use crate::model::{FolderLayout, ImageUnit, Order, OrderUpdate, UnitStatus, UnitUpdate};

// ─────────────────────────────────────────────────────────────────────────────
// Data store
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
struct DataInner {
    orders: HashMap<String, Order>,
    units: Vec<ImageUnit>,
    history: HashMap<String, Vec<UnitStatus>>,
    order_writes: Vec<(String, OrderUpdate)>,
}

/// Orders and units held in memory. Every status write is recorded.
pub struct MemoryDataStore {
    inner: Mutex<DataInner>,
    reachable: AtomicBool,
}

impl Default for MemoryDataStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDataStore {
    /// An empty, reachable store.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(DataInner::default()),
            reachable: AtomicBool::new(true),
        }
    }

    /// Insert or replace an order.
    pub fn insert_order(&self, order: Order) {
        self.inner.lock().orders.insert(order.id.clone(), order);
    }

    /// Append a unit.
    pub fn insert_unit(&self, unit: ImageUnit) {
        self.inner.lock().units.push(unit);
    }

    /// Current state of an order.
    pub fn order(&self, order_id: &str) -> Option<Order> {
        self.inner.lock().orders.get(order_id).cloned()
    }

    /// Current state of a unit.
    pub fn unit(&self, unit_id: &str) -> Option<ImageUnit> {
        self.inner
            .lock()
            .units
            .iter()
            .find(|u| u.id == unit_id)
            .cloned()
    }

    /// Current state of every unit of an order.
    pub fn units(&self, order_id: &str) -> Vec<ImageUnit> {
        self.inner
            .lock()
            .units
            .iter()
            .filter(|u| u.order_id == order_id)
            .cloned()
            .collect()
    }

    /// Every status written to a unit, oldest first.
    pub fn status_history(&self, unit_id: &str) -> Vec<UnitStatus> {
        self.inner
            .lock()
            .history
            .get(unit_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Every order write, oldest first.
    pub fn order_writes(&self) -> Vec<(String, OrderUpdate)> {
        self.inner.lock().order_writes.clone()
    }

    /// Simulate an outage.
    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    fn check_reachable(&self) -> Result<()> {
        if self.reachable.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(WorkflowError::DataStore("database connection refused".into()))
        }
    }
}

#[async_trait]
impl DataStore for MemoryDataStore {
    async fn ping(&self) -> Result<()> {
        self.check_reachable()
    }

    async fn get_order(&self, order_id: &str) -> Result<Option<Order>> {
        self.check_reachable()?;
        Ok(self.order(order_id))
    }

    async fn list_units(&self, order_id: &str) -> Result<Vec<ImageUnit>> {
        self.check_reachable()?;
        Ok(self.units(order_id))
    }

    async fn update_unit(&self, unit_id: &str, update: &UnitUpdate) -> Result<()> {
        self.check_reachable()?;
        let mut inner = self.inner.lock();
        let unit = inner
            .units
            .iter_mut()
            .find(|u| u.id == unit_id)
            .ok_or_else(|| WorkflowError::DataStore(format!("record for unit {unit_id} not found")))?;
        update.apply_to(unit);
        inner
            .history
            .entry(unit_id.to_string())
            .or_default()
            .push(update.status);
        Ok(())
    }

    async fn update_order(&self, order_id: &str, update: &OrderUpdate) -> Result<()> {
        self.check_reachable()?;
        let mut inner = self.inner.lock();
        let order = inner
            .orders
            .get_mut(order_id)
            .ok_or_else(|| WorkflowError::DataStore(format!("record for order {order_id} not found")))?;
        update.apply_to(order);
        inner
            .order_writes
            .push((order_id.to_string(), update.clone()));
        Ok(())
    }

    async fn count_pending_orders(&self) -> Result<u64> {
        self.check_reachable()?;
        Ok(self
            .inner
            .lock()
            .orders
            .values()
            .filter(|o| o.is_awaiting_processing())
            .count() as u64)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Blob store
// ─────────────────────────────────────────────────────────────────────────────

/// A flat path → size map.
pub struct MemoryBlobStore {
    files: Mutex<BTreeMap<String, u64>>,
    deleted: Mutex<Vec<String>>,
    reachable: AtomicBool,
}

impl Default for MemoryBlobStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBlobStore {
    /// An empty, reachable store.
    pub fn new() -> Self {
        Self {
            files: Mutex::new(BTreeMap::new()),
            deleted: Mutex::new(Vec::new()),
            reachable: AtomicBool::new(true),
        }
    }

    /// Write a file.
    pub fn put(&self, path: impl Into<String>, size: u64) {
        self.files.lock().insert(path.into(), size);
    }

    /// Whether `path` is present.
    pub fn contains(&self, path: &str) -> bool {
        self.files.lock().contains_key(path)
    }

    /// Every stored path, sorted.
    pub fn paths(&self) -> Vec<String> {
        self.files.lock().keys().cloned().collect()
    }

    /// Size of `path`.
    pub fn size_of(&self, path: &str) -> Option<u64> {
        self.files.lock().get(path).copied()
    }

    /// Paths removed through [`BlobStore::delete`], oldest first.
    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().clone()
    }

    /// Simulate an outage.
    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    fn check_reachable(&self) -> Result<()> {
        if self.reachable.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(WorkflowError::StorageAccess("storage bucket unreachable".into()))
        }
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn ping(&self) -> Result<()> {
        self.check_reachable()
    }

    async fn list(&self, folder: &str) -> Result<Vec<BlobEntry>> {
        self.check_reachable()?;
        let prefix = format!("{}/", folder.trim_end_matches('/'));
        Ok(self
            .files
            .lock()
            .iter()
            .filter_map(|(path, size)| {
                let name = path.strip_prefix(&prefix)?;
                (!name.contains('/')).then(|| BlobEntry {
                    name: name.to_string(),
                    path: path.clone(),
                    size: Some(*size),
                })
            })
            .collect())
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        self.check_reachable()?;
        Ok(self.contains(path))
    }

    async fn delete(&self, path: &str) -> Result<()> {
        self.check_reachable()?;
        if self.files.lock().remove(path).is_some() {
            self.deleted.lock().push(path.to_string());
        }
        Ok(())
    }

    async fn copy(&self, from: &str, to: &str) -> Result<()> {
        self.check_reachable()?;
        let mut files = self.files.lock();
        let size = files
            .get(from)
            .copied()
            .ok_or_else(|| WorkflowError::StorageAccess(format!("file not found: {from}")))?;
        files.insert(to.to_string(), size);
        Ok(())
    }

    async fn signed_url(&self, path: &str, ttl: Duration) -> Result<String> {
        self.check_reachable()?;
        if !self.contains(path) {
            return Err(WorkflowError::StorageAccess(format!("file not found: {path}")));
        }
        Ok(format!("memory://{path}?expires_in={}", ttl.as_secs()))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Notifier
// ─────────────────────────────────────────────────────────────────────────────

/// Records every notice; can be told to fail.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<CompletionNotice>>,
    failures_left: Mutex<u32>,
}

impl RecordingNotifier {
    /// A notifier that always succeeds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `count` calls.
    pub fn fail_next(&self, count: u32) {
        *self.failures_left.lock() = count;
    }

    /// Notices delivered so far.
    pub fn sent(&self) -> Vec<CompletionNotice> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn order_completed(&self, notice: &CompletionNotice) -> Result<()> {
        {
            let mut left = self.failures_left.lock();
            if *left > 0 {
                *left -= 1;
                return Err(WorkflowError::Notification("email relay rejected message".into()));
            }
        }
        self.sent.lock().push(notice.clone());
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Image services
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
struct Script {
    analyze_failures: HashMap<String, u32>,
    embed_failures: HashMap<String, u32>,
    skip_write: Vec<String>,
    analyze_calls: HashMap<String, u32>,
    embed_calls: HashMap<String, u32>,
}

/// Mock analysis and embedding that write real artifacts into a
/// [`MemoryBlobStore`]. Failures are scripted per original file name.
pub struct ScriptedImageServices {
    blobs: Arc<MemoryBlobStore>,
    script: Mutex<Script>,
}

impl ScriptedImageServices {
    /// Services writing into `blobs`.
    pub fn new(blobs: Arc<MemoryBlobStore>) -> Self {
        Self {
            blobs,
            script: Mutex::new(Script::default()),
        }
    }

    /// Every analysis of `file_name` fails.
    pub fn fail_analyze(&self, file_name: &str) {
        self.script
            .lock()
            .analyze_failures
            .insert(file_name.to_string(), u32::MAX);
    }

    /// Every embed of `file_name` fails.
    pub fn fail_embed(&self, file_name: &str) {
        self.fail_embed_times(file_name, u32::MAX);
    }

    /// The next `times` embeds of `file_name` fail.
    pub fn fail_embed_times(&self, file_name: &str, times: u32) {
        self.script
            .lock()
            .embed_failures
            .insert(file_name.to_string(), times);
    }

    /// Embeds of `file_name` report success without writing the artifact.
    pub fn skip_write(&self, file_name: &str) {
        self.script.lock().skip_write.push(file_name.to_string());
    }

    /// How many times `file_name` was analyzed.
    pub fn analyze_calls(&self, file_name: &str) -> u32 {
        self.script
            .lock()
            .analyze_calls
            .get(file_name)
            .copied()
            .unwrap_or(0)
    }

    /// How many times `file_name` was embedded.
    pub fn embed_calls(&self, file_name: &str) -> u32 {
        self.script
            .lock()
            .embed_calls
            .get(file_name)
            .copied()
            .unwrap_or(0)
    }

    fn take_failure(failures: &mut HashMap<String, u32>, file_name: &str) -> bool {
        match failures.get_mut(file_name) {
            Some(left) if *left > 0 => {
                if *left != u32::MAX {
                    *left -= 1;
                }
                true
            }
            _ => false,
        }
    }
}

fn file_name_of(path_or_url: &str) -> &str {
    let path = path_or_url.split('?').next().unwrap_or(path_or_url);
    path.rsplit('/').next().unwrap_or(path)
}

#[async_trait]
impl ImageServices for ScriptedImageServices {
    async fn analyze(&self, image_url: &str, analysis_type: AnalysisType) -> Result<ImageAnalysis> {
        let file = file_name_of(image_url);
        {
            let mut script = self.script.lock();
            *script.analyze_calls.entry(file.to_string()).or_default() += 1;
            if Self::take_failure(&mut script.analyze_failures, file) {
                return Err(WorkflowError::AiService(format!(
                    "ai analysis failed for {file}: 503"
                )));
            }
        }
        Ok(mock::mock_analysis(image_url, analysis_type))
    }

    async fn embed(&self, request: &EmbedRequest) -> Result<EmbedResult> {
        let file = file_name_of(&request.source_path);
        let skip = {
            let mut script = self.script.lock();
            *script.embed_calls.entry(file.to_string()).or_default() += 1;
            if Self::take_failure(&mut script.embed_failures, file) {
                return Err(WorkflowError::MetadataEmbedding(format!(
                    "metadata embedding failed for {file}: 500"
                )));
            }
            script.skip_write.iter().any(|f| f == file)
        };
        if !skip {
            self.blobs.copy(&request.source_path, &request.output_path).await?;
        }
        Ok(mock::mock_embed_result(request))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Fixture
// ─────────────────────────────────────────────────────────────────────────────

/// A wired set of in-memory collaborators.
pub struct Fixture {
    pub data: Arc<MemoryDataStore>,
    pub blobs: Arc<MemoryBlobStore>,
    pub notifier: Arc<RecordingNotifier>,
    pub images: Arc<ScriptedImageServices>,
}

impl Default for Fixture {
    fn default() -> Self {
        Self::new()
    }
}

impl Fixture {
    /// Empty stores.
    pub fn new() -> Self {
        let blobs = Arc::new(MemoryBlobStore::new());
        Self {
            data: Arc::new(MemoryDataStore::new()),
            images: Arc::new(ScriptedImageServices::new(blobs.clone())),
            blobs,
            notifier: Arc::new(RecordingNotifier::new()),
        }
    }

    /// A paid order with `files.len()` pending units (`u1`, `u2`, ...)
    /// and their originals uploaded under the default layout.
    pub fn with_order(self, order_id: &str, files: &[&str]) -> Self {
        let layout = FolderLayout::default();
        self.data
            .insert_order(Order::paid(order_id, format!("{order_id}@example.com")));
        for (i, file) in files.iter().enumerate() {
            let unit = ImageUnit::new(format!("u{}", i + 1), order_id, *file);
            self.blobs.put(layout.original_path(&unit), 1_024);
            self.data.insert_unit(unit);
        }
        self
    }

    /// Trait-object handles for the orchestrator.
    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            data: self.data.clone(),
            blobs: self.blobs.clone(),
            notifier: self.notifier.clone(),
            images: self.images.clone(),
        }
    }
}

/// Check that an error is of `kind`.
pub fn assert_kind<T: std::fmt::Debug>(result: &Result<T>, kind: ErrorKind) {
    match result {
        Err(e) => assert_eq!(e.kind(), kind, "unexpected error: {e}"),
        Ok(v) => panic!("expected {kind} error, got Ok({v:?})"),
    }
}
