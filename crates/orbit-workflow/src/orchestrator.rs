//! Phase sequencing and the run report.
//!
//! ```text
//! pre-flight ──fail──► health check ──healthy──► pre-flight (once more)
//!     │                      └──unhealthy──► run fails
//!     ▼
//! discovery ──fail──► run fails (later phases skipped)
//!     ▼
//! processing (action = process only)
//!     ▼
//! finalization ──fail──► email skipped
//!     ▼
//! email-and-cleanup (failure is non-fatal)
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use orbit_config::{AnalysisType, WorkflowConfig};
use orbit_rpc::ConnectionPool;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::Instrument;

use crate::collaborators::Collaborators;
use crate::context::{ErrorRecord, ExecutionStats, Phase, PhaseStatus, PhaseStatuses, WorkflowContext};
use crate::error::{Result, WorkflowError};
use crate::events::{self, EventSink, WorkflowEvent};
use crate::health::{self, HealthReport, ReadinessReport};
use crate::model::{FolderLayout, OrderStatus};
use crate::phases::{self, Finalized, PhaseEnv};
use crate::retry::{RetryExecutor, RetryPolicies};

/// Resolved settings for a run.
#[derive(Debug, Clone)]
pub struct WorkflowSettings {
    /// Bucket holding order folders.
    pub bucket: String,
    /// Folder names within an order.
    pub layout: FolderLayout,
    /// Units processed at once.
    pub unit_concurrency: usize,
    /// Flavour of analysis.
    pub analysis_type: AnalysisType,
    /// Quality passed to embedding.
    pub compression_quality: u8,
    /// Lifetime of signed URLs.
    pub signed_url_ttl: Duration,
    /// Services that must be in the pool for pre-flight to pass.
    pub required_services: Vec<String>,
    /// Per-kind retry policies.
    pub retry: RetryPolicies,
}

impl Default for WorkflowSettings {
    /// Config defaults, requiring no pooled services.
    fn default() -> Self {
        let config = WorkflowConfig::default();
        Self {
            bucket: config.storage_bucket,
            layout: FolderLayout::default(),
            unit_concurrency: config.unit_concurrency,
            analysis_type: config.analysis_type,
            compression_quality: config.compression_quality,
            signed_url_ttl: Duration::from_secs(config.signed_url_ttl_secs),
            required_services: Vec::new(),
            retry: RetryPolicies::default(),
        }
    }
}

impl WorkflowSettings {
    /// Resolve settings from the `[workflow]` section.
    ///
    /// In mock mode the AI and metadata services are served locally and
    /// are dropped from the required set.
    pub fn from_config(config: &WorkflowConfig) -> Result<Self> {
        let required_services = config
            .required_services
            .iter()
            .filter(|name| !(config.mock_mode && config.services.is_mockable(name)))
            .cloned()
            .collect();
        Ok(Self {
            bucket: config.storage_bucket.clone(),
            layout: FolderLayout {
                original: config.original_folder.clone(),
                processed: config.processed_folder.clone(),
            },
            unit_concurrency: config.unit_concurrency.max(1),
            analysis_type: config.analysis_type,
            compression_quality: config.compression_quality,
            signed_url_ttl: Duration::from_secs(config.signed_url_ttl_secs),
            required_services,
            retry: RetryPolicies::default().with_overrides(&config.retry)?,
        })
    }
}

/// What a run should do.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Full run.
    #[default]
    Process,
    /// Recount and finalize without processing units.
    Finalize,
}

/// Trigger for one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessRequest {
    pub order_id: String,
    #[serde(default)]
    pub action: Action,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
}

impl ProcessRequest {
    /// A full run of `order_id`.
    pub fn new(order_id: impl Into<String>) -> Self {
        Self {
            order_id: order_id.into(),
            action: Action::Process,
            correlation_id: None,
        }
    }

    /// Use `action`.
    pub fn with_action(mut self, action: Action) -> Self {
        self.action = action;
        self
    }

    /// Use a caller-supplied correlation id.
    pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }
}

/// Aggregate unit counts of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitCounts {
    pub total: usize,
    pub processed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub retries: u32,
}

/// Outcome of a run. Always produced, even when the run fails.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowReport {
    pub success: bool,
    pub order_id: String,
    pub correlation_id: String,
    pub action: Action,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_status: Option<OrderStatus>,
    pub phases: PhaseStatuses,
    pub results: UnitCounts,
    pub errors: Vec<ErrorRecord>,
    pub stats: ExecutionStats,
}

/// Drives runs over a set of collaborators.
pub struct Orchestrator {
    pool: Arc<ConnectionPool>,
    collaborators: Collaborators,
    settings: WorkflowSettings,
    events: Option<EventSink>,
}

impl Orchestrator {
    /// Orchestrator over explicit collaborators. `pool` is probed by the
    /// health check and consulted for required services.
    pub fn new(pool: Arc<ConnectionPool>, collaborators: Collaborators, settings: WorkflowSettings) -> Self {
        Self {
            pool,
            collaborators,
            settings,
            events: None,
        }
    }

    /// Orchestrator whose collaborators are all RPC-backed through `pool`.
    pub fn from_config(pool: Arc<ConnectionPool>, config: &WorkflowConfig) -> Result<Self> {
        let settings = WorkflowSettings::from_config(config)?;
        let collaborators = Collaborators::rpc(pool.clone(), config);
        Ok(Self::new(pool, collaborators, settings))
    }

    /// Send progress events to `tx`.
    pub fn with_event_sink(mut self, tx: mpsc::UnboundedSender<WorkflowEvent>) -> Self {
        self.events = Some(EventSink::new(tx));
        self
    }

    /// Resolved settings.
    pub fn settings(&self) -> &WorkflowSettings {
        &self.settings
    }

    /// The collaborators runs go through.
    pub fn collaborators(&self) -> &Collaborators {
        &self.collaborators
    }

    /// The pool probed by health checks.
    pub fn pool(&self) -> &Arc<ConnectionPool> {
        &self.pool
    }

    /// Probe both stores and every pooled service.
    pub async fn health_check(&self) -> HealthReport {
        health::check(
            self.collaborators.data.as_ref(),
            self.collaborators.blobs.as_ref(),
            &self.pool,
        )
        .await
    }

    /// Pending paid orders and bucket access.
    pub async fn readiness(&self) -> ReadinessReport {
        health::readiness(
            self.collaborators.data.as_ref(),
            self.collaborators.blobs.as_ref(),
        )
        .await
    }

    /// Run the workflow for one order.
    pub async fn run(&self, request: ProcessRequest) -> WorkflowReport {
        let correlation_id = request
            .correlation_id
            .clone()
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let span = tracing::info_span!(
            "workflow",
            order_id = %request.order_id,
            correlation_id = %correlation_id,
            action = ?request.action,
        );
        self.run_inner(request, correlation_id).instrument(span).await
    }

    async fn run_inner(&self, request: ProcessRequest, correlation_id: String) -> WorkflowReport {
        let mut ctx = WorkflowContext::new(&request.order_id, &correlation_id);
        let retry = RetryExecutor::new(self.settings.retry.clone()).with_events(self.events.clone());
        let env = PhaseEnv {
            collaborators: &self.collaborators,
            settings: &self.settings,
            retry: &retry,
            pool: &self.pool,
            events: self.events.as_ref(),
        };

        tracing::info!("workflow started");
        self.emit(WorkflowEvent::RunStarted {
            order_id: ctx.order_id.clone(),
            correlation_id: correlation_id.clone(),
        });

        let outcome = self.drive(&env, &mut ctx, request.action).await;
        ctx.phases.skip_pending();

        let finished_at = Utc::now();
        let complete = ctx.processed_units + ctx.skipped_units;
        let (success, order_status) = match outcome {
            Some(finalized) => (true, Some(finalized.status)),
            None if ctx.phases.order_discovery == PhaseStatus::Completed && complete > 0 => {
                (true, None)
            }
            None if ctx.phases.order_finalization == PhaseStatus::Failed => {
                (false, Some(OrderStatus::Failed))
            }
            None => (false, None),
        };

        let report = WorkflowReport {
            success,
            order_id: ctx.order_id.clone(),
            correlation_id: ctx.correlation_id.clone(),
            action: request.action,
            order_status,
            phases: ctx.phases.clone(),
            results: UnitCounts {
                total: ctx.total_units,
                processed: ctx.processed_units,
                failed: ctx.failed_units,
                skipped: ctx.skipped_units,
                retries: ctx.retry_count,
            },
            errors: ctx.errors().to_vec(),
            stats: ctx.stats(finished_at),
        };

        tracing::info!(
            success = report.success,
            status = report.order_status.map(OrderStatus::as_str).unwrap_or("none"),
            processed = report.results.processed,
            failed = report.results.failed,
            retries = report.results.retries,
            duration_ms = report.stats.duration_ms,
            "workflow finished"
        );
        self.emit(WorkflowEvent::RunFinished {
            success: report.success,
            order_status: report.order_status,
        });
        report
    }

    /// Run the phases in order. Returns the finalization verdict when
    /// finalization succeeded.
    async fn drive(&self, env: &PhaseEnv<'_>, ctx: &mut WorkflowContext, action: Action) -> Option<Finalized> {
        if !self.preflight_with_recovery(env, ctx).await {
            return None;
        }

        self.begin(ctx, Phase::OrderDiscovery);
        let started = Instant::now();
        let discovered = match phases::discovery::run(env, ctx, action == Action::Process).await {
            Ok(found) => {
                self.end(ctx, Phase::OrderDiscovery, PhaseStatus::Completed, started);
                found
            }
            Err(err) => {
                ctx.record_error(Phase::OrderDiscovery, &err);
                self.end(ctx, Phase::OrderDiscovery, PhaseStatus::Failed, started);
                return None;
            }
        };
        tracing::debug!(
            user_id = %discovered.order.user_id,
            stage = ?discovered.order.processing_stage,
            "loaded order"
        );

        match action {
            Action::Process => {
                self.begin(ctx, Phase::AtomicImageProcessing);
                let started = Instant::now();
                let status = match phases::processing::run(env, ctx, discovered.units).await {
                    Ok(()) => PhaseStatus::Completed,
                    Err(err) => {
                        ctx.record_error(Phase::AtomicImageProcessing, &err);
                        PhaseStatus::Failed
                    }
                };
                self.end(ctx, Phase::AtomicImageProcessing, status, started);
            }
            Action::Finalize => {
                ctx.skipped_units = discovered
                    .units
                    .iter()
                    .filter(|u| u.status == crate::model::UnitStatus::Complete)
                    .count();
                self.end(ctx, Phase::AtomicImageProcessing, PhaseStatus::Skipped, Instant::now());
            }
        }

        self.begin(ctx, Phase::OrderFinalization);
        let started = Instant::now();
        let finalized = match phases::finalization::run(env, ctx).await {
            Ok(finalized) => {
                self.end(ctx, Phase::OrderFinalization, PhaseStatus::Completed, started);
                finalized
            }
            Err(err) => {
                ctx.record_error(Phase::OrderFinalization, &err);
                self.end(ctx, Phase::OrderFinalization, PhaseStatus::Failed, started);
                return None;
            }
        };

        self.begin(ctx, Phase::EmailAndCleanup);
        let started = Instant::now();
        let status = match phases::notification::run(env, ctx, finalized).await {
            Ok(status) => status,
            Err(err) => {
                tracing::warn!(error = %err, "completion notice failed; order still processed");
                ctx.record_error(Phase::EmailAndCleanup, &err);
                PhaseStatus::Failed
            }
        };
        self.end(ctx, Phase::EmailAndCleanup, status, started);

        Some(finalized)
    }

    /// Pre-flight, with one health-gated second attempt.
    async fn preflight_with_recovery(&self, env: &PhaseEnv<'_>, ctx: &mut WorkflowContext) -> bool {
        self.begin(ctx, Phase::PreFlightValidation);
        let started = Instant::now();

        let first = phases::preflight::run(env, ctx).await;
        let outcome = match first {
            Ok(()) => Ok(()),
            Err(err) => {
                ctx.record_error(Phase::PreFlightValidation, &err);
                let report = self.health_check().await;
                if report.is_healthy() {
                    tracing::info!("health recovered, retrying pre-flight");
                    ctx.retry_count += 1;
                    phases::preflight::run(env, ctx).await
                } else {
                    Err(WorkflowError::new(
                        err.kind(),
                        format!(
                            "health recovery failed: {} unavailable",
                            report.failing().join(", ")
                        ),
                    ))
                }
            }
        };

        match outcome {
            Ok(()) => {
                self.end(ctx, Phase::PreFlightValidation, PhaseStatus::Completed, started);
                true
            }
            Err(err) => {
                ctx.record_error(Phase::PreFlightValidation, &err);
                self.end(ctx, Phase::PreFlightValidation, PhaseStatus::Failed, started);
                false
            }
        }
    }

    fn begin(&self, ctx: &mut WorkflowContext, phase: Phase) {
        tracing::info!(phase = %phase, "phase started");
        ctx.begin(phase);
        self.emit(WorkflowEvent::PhaseStarted { phase });
    }

    fn end(&self, ctx: &mut WorkflowContext, phase: Phase, status: PhaseStatus, started: Instant) {
        let duration_ms = started.elapsed().as_millis() as u64;
        tracing::info!(phase = %phase, status = ?status, duration_ms, "phase finished");
        ctx.finish(phase, status);
        self.emit(WorkflowEvent::PhaseFinished {
            phase,
            status,
            duration_ms,
        });
    }

    fn emit(&self, event: WorkflowEvent) {
        events::emit(self.events.as_ref(), event);
    }
}
