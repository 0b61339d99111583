//! Atomic per-unit image processing.
//!
//! Each unit runs through its own pipeline:
//!
//! ```text
//! in_progress → signed url → analyze → analyzed → embed → embedded
//!             → verify artifact → verified → complete
//! ```
//!
//! Every step is retried by the policy of its failure's kind. When a step
//! gives up, the unit is rolled back (status restored, partial artifacts
//! deleted) and then marked `error`. One failed unit never stops the
//! others.

use std::time::{Duration, Instant};

use futures::StreamExt;
use tracing::Instrument;

use super::PhaseEnv;
use crate::collaborators::EmbedRequest;
use crate::context::{Phase, WorkflowContext};
use crate::error::{ErrorKind, Result, WorkflowError};
use crate::events::{self, WorkflowEvent};
use crate::model::{FolderLayout, ImageUnit, UnitStatus, UnitUpdate};
use crate::retry::fail;

/// Result of one unit's attempt.
#[derive(Debug)]
struct UnitOutcome {
    unit_id: String,
    error: Option<WorkflowError>,
    retries: u32,
    elapsed: Duration,
}

/// Process every unit not already complete.
///
/// Succeeds when at least one unit of the order is complete afterwards.
pub(crate) async fn run(env: &PhaseEnv<'_>, ctx: &mut WorkflowContext, units: Vec<ImageUnit>) -> Result<()> {
    let (done, pending): (Vec<ImageUnit>, Vec<ImageUnit>) = units
        .into_iter()
        .partition(|u| u.status == UnitStatus::Complete);
    ctx.skipped_units = done.len();
    if !done.is_empty() {
        tracing::info!(
            order_id = %ctx.order_id,
            skipped = done.len(),
            "skipping units already complete"
        );
    }

    let concurrency = env.settings.unit_concurrency.max(1);
    let mut outcomes: Vec<(usize, UnitOutcome)> = futures::stream::iter(pending.into_iter().enumerate())
        .map(|(index, unit)| async move { (index, process_unit(env, unit).await) })
        .buffer_unordered(concurrency)
        .collect()
        .await;
    outcomes.sort_by_key(|(index, _)| *index);

    for (_, outcome) in outcomes {
        ctx.retry_count += outcome.retries;
        ctx.record_unit_duration(outcome.elapsed);
        match outcome.error {
            None => ctx.processed_units += 1,
            Some(err) => {
                ctx.failed_units += 1;
                ctx.record_unit_error(Phase::AtomicImageProcessing, &outcome.unit_id, &err);
            }
        }
    }

    tracing::info!(
        order_id = %ctx.order_id,
        processed = ctx.processed_units,
        failed = ctx.failed_units,
        skipped = ctx.skipped_units,
        "image processing finished"
    );

    if ctx.processed_units + ctx.skipped_units == 0 {
        return fail(
            ErrorKind::Unknown,
            format!("none of {} units reached complete", ctx.failed_units),
        );
    }
    Ok(())
}

async fn process_unit(env: &PhaseEnv<'_>, unit: ImageUnit) -> UnitOutcome {
    let started = Instant::now();
    let before = unit.status;
    let mut retries = 0;

    let span = tracing::info_span!("unit", unit_id = %unit.id, file = %unit.file_name);
    let result = run_pipeline(env, &unit, &mut retries)
        .instrument(span)
        .await;

    let status = match &result {
        Ok(()) => {
            tracing::info!(unit_id = %unit.id, "unit complete");
            UnitStatus::Complete
        }
        Err(err) => {
            tracing::warn!(unit_id = %unit.id, kind = %err.kind(), error = %err.message(), "unit failed, rolling back");
            rollback(env, &unit, before).await;

            let last_good = match before {
                UnitStatus::Error => unit.last_good_status.unwrap_or_default(),
                other => other,
            };
            let update = UnitUpdate::failed(err.to_string(), err.kind(), last_good);
            let data = &env.collaborators.data;
            if let Err(e) = env
                .retry
                .run_counted("unit.mark_error", &mut retries, || data.update_unit(&unit.id, &update))
                .await
            {
                tracing::error!(unit_id = %unit.id, error = %e, "could not record unit failure");
            }
            UnitStatus::Error
        }
    };

    let elapsed = started.elapsed();
    events::emit(
        env.events,
        WorkflowEvent::UnitFinished {
            unit_id: unit.id.clone(),
            status,
            duration_ms: elapsed.as_millis() as u64,
        },
    );

    UnitOutcome {
        unit_id: unit.id,
        error: result.err(),
        retries,
        elapsed,
    }
}

async fn run_pipeline(env: &PhaseEnv<'_>, unit: &ImageUnit, retries: &mut u32) -> Result<()> {
    let data = &env.collaborators.data;
    let blobs = &env.collaborators.blobs;
    let images = &env.collaborators.images;
    let settings = env.settings;
    let unit_id = unit.id.as_str();
    let original = settings.layout.original_path(unit);
    let processed = settings.layout.processed_path(unit);

    let in_progress = UnitUpdate::status(UnitStatus::InProgress);
    env.retry
        .run_counted("unit.mark_in_progress", retries, || data.update_unit(unit_id, &in_progress))
        .await?;

    let url = env
        .retry
        .run_counted("unit.signed_url", retries, || {
            blobs.signed_url(&original, settings.signed_url_ttl)
        })
        .await?;

    let analysis = env
        .retry
        .run_counted("unit.analyze", retries, || {
            images.analyze(&url, settings.analysis_type)
        })
        .await?;

    let payload = serde_json::to_value(&analysis)
        .map_err(|e| WorkflowError::AiService(format!("analysis could not be encoded: {e}")))?;
    let analyzed = UnitUpdate::analyzed(payload);
    env.retry
        .run_counted("unit.persist_analysis", retries, || data.update_unit(unit_id, &analyzed))
        .await?;

    let request = EmbedRequest {
        source_path: original.clone(),
        output_path: processed.clone(),
        metadata: analysis.metadata.clone(),
        compression_quality: settings.compression_quality,
    };
    let embedded = env
        .retry
        .run_counted("unit.embed", retries, || images.embed(&request))
        .await?;
    if embedded.processed_path != processed {
        tracing::warn!(
            expected = %processed,
            reported = %embedded.processed_path,
            "embedding service reported a different output path"
        );
    }
    let embedded_update = UnitUpdate::status(UnitStatus::Embedded);
    env.retry
        .run_counted("unit.mark_embedded", retries, || data.update_unit(unit_id, &embedded_update))
        .await?;

    let artifact = processed.as_str();
    env.retry
        .run_counted("unit.verify_artifact", retries, || async move {
            if blobs.exists(artifact).await? {
                Ok(())
            } else {
                fail(ErrorKind::StorageAccess, format!("file not found: {artifact}"))
            }
        })
        .await?;
    let verified = UnitUpdate::status(UnitStatus::Verified);
    env.retry
        .run_counted("unit.mark_verified", retries, || data.update_unit(unit_id, &verified))
        .await?;

    let complete = UnitUpdate::complete(processed.clone());
    env.retry
        .run_counted("unit.mark_complete", retries, || data.update_unit(unit_id, &complete))
        .await?;

    Ok(())
}

/// Restore the pre-attempt status and delete any artifact of this unit.
/// Best effort: failures are logged, never raised.
async fn rollback(env: &PhaseEnv<'_>, unit: &ImageUnit, before: UnitStatus) {
    let data = &env.collaborators.data;
    let blobs = &env.collaborators.blobs;

    if let Err(e) = data.update_unit(&unit.id, &UnitUpdate::status(before)).await {
        tracing::warn!(unit_id = %unit.id, error = %e, "rollback could not restore status");
    }

    let folder = env.settings.layout.processed_folder(&unit.order_id);
    let entries = match blobs.list(&folder).await {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!(unit_id = %unit.id, error = %e, "rollback could not list artifacts");
            return;
        }
    };

    for entry in entries
        .iter()
        .filter(|e| FolderLayout::is_artifact_of(&e.name, &unit.id))
    {
        match blobs.delete(&entry.path).await {
            Ok(()) => tracing::debug!(unit_id = %unit.id, path = %entry.path, "removed partial artifact"),
            Err(e) => tracing::warn!(unit_id = %unit.id, path = %entry.path, error = %e, "rollback could not delete artifact"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::DataStore;
    use crate::orchestrator::WorkflowSettings;
    use crate::retry::{RetryExecutor, RetryPolicies};
    use crate::testing::Fixture;
    use orbit_rpc::ConnectionPool;

    struct Harness {
        fixture: Fixture,
        settings: WorkflowSettings,
        retry: RetryExecutor,
        pool: ConnectionPool,
    }

    impl Harness {
        fn new(fixture: Fixture) -> Self {
            Self {
                fixture,
                settings: WorkflowSettings::default(),
                retry: RetryExecutor::default(),
                pool: ConnectionPool::new(),
            }
        }

        async fn process(&self, order_id: &str) -> (Result<()>, WorkflowContext) {
            let collaborators = self.fixture.collaborators();
            let env = PhaseEnv {
                collaborators: &collaborators,
                settings: &self.settings,
                retry: &self.retry,
                pool: &self.pool,
                events: None,
            };
            let units = self.fixture.data.units(order_id);
            let mut ctx = WorkflowContext::new(order_id, "c1");
            ctx.total_units = units.len();
            let result = run(&env, &mut ctx, units).await;
            (result, ctx)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_units_complete() {
        let harness = Harness::new(Fixture::new().with_order("o1", &["a.jpg", "b.jpg"]));
        let (result, ctx) = harness.process("o1").await;

        assert!(result.is_ok());
        assert_eq!(ctx.processed_units, 2);
        let data = &harness.fixture.data;
        assert_eq!(
            data.status_history("u1"),
            vec![
                UnitStatus::InProgress,
                UnitStatus::Analyzed,
                UnitStatus::Embedded,
                UnitStatus::Verified,
                UnitStatus::Complete,
            ]
        );
        let unit = data.unit("u1").unwrap();
        assert_eq!(unit.processed_path.as_deref(), Some("o1/processed/u1_a.jpg"));
        assert!(unit.analysis.is_some());
        assert!(harness.fixture.blobs.contains("o1/processed/u2_b.jpg"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_unit_rolls_back_and_others_continue() {
        let harness = Harness::new(Fixture::new().with_order("o1", &["a.jpg", "b.jpg", "c.jpg"]));
        harness.fixture.images.fail_embed("b.jpg");

        let (result, ctx) = harness.process("o1").await;
        assert!(result.is_ok());
        assert_eq!(ctx.processed_units, 2);
        assert_eq!(ctx.failed_units, 1);
        assert_eq!(ctx.errors().len(), 1);
        assert_eq!(ctx.errors()[0].kind, ErrorKind::MetadataEmbedding);

        let failed = harness.fixture.data.unit("u2").unwrap();
        assert_eq!(failed.status, UnitStatus::Error);
        assert_eq!(failed.error_kind, Some(ErrorKind::MetadataEmbedding));
        assert_eq!(failed.last_good_status, Some(UnitStatus::Pending));

        let history = harness.fixture.data.status_history("u2");
        assert_eq!(
            &history[history.len() - 2..],
            &[UnitStatus::Pending, UnitStatus::Error]
        );
        assert_eq!(harness.fixture.images.embed_calls("b.jpg"), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rollback_removes_only_this_units_artifacts() {
        let files: Vec<String> = (1..=10).map(|i| format!("f{i}.jpg")).collect();
        let names: Vec<&str> = files.iter().map(String::as_str).collect();
        let harness = Harness::new(Fixture::new().with_order("o1", &names));
        harness.fixture.images.skip_write("f1.jpg");
        harness.fixture.blobs.put("o1/processed/u1_stale.jpg", 1);

        let (result, _) = harness.process("o1").await;
        assert!(result.is_ok());

        let blobs = &harness.fixture.blobs;
        assert!(!blobs.contains("o1/processed/u1_stale.jpg"));
        assert!(blobs.contains("o1/processed/u10_f10.jpg"));
        assert_eq!(blobs.deleted(), vec!["o1/processed/u1_stale.jpg".to_string()]);
        assert_eq!(
            harness.fixture.data.unit("u1").unwrap().error_kind,
            Some(ErrorKind::StorageAccess)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_every_unit_failing_fails_the_phase() {
        let mut harness = Harness::new(Fixture::new().with_order("o1", &["a.jpg", "b.jpg"]));
        harness.retry = RetryExecutor::new(RetryPolicies::none());
        harness.fixture.images.fail_analyze("a.jpg");
        harness.fixture.images.fail_analyze("b.jpg");

        let (result, ctx) = harness.process("o1").await;
        assert!(result.is_err());
        assert_eq!(ctx.failed_units, 2);
        assert_eq!(ctx.retry_count, 0);
        assert_eq!(harness.fixture.images.analyze_calls("a.jpg"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_complete_units_are_skipped() {
        let harness = Harness::new(Fixture::new().with_order("o1", &["a.jpg", "b.jpg"]));
        harness
            .fixture
            .data
            .update_unit("u1", &UnitUpdate::complete("o1/processed/u1_a.jpg"))
            .await
            .unwrap();

        let (result, ctx) = harness.process("o1").await;
        assert!(result.is_ok());
        assert_eq!(ctx.skipped_units, 1);
        assert_eq!(ctx.processed_units, 1);
        assert_eq!(harness.fixture.images.analyze_calls("a.jpg"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_bounded_concurrency_processes_everything() {
        let mut harness = Harness::new(Fixture::new().with_order(
            "o1",
            &["a.jpg", "b.jpg", "c.jpg", "d.jpg", "e.jpg"],
        ));
        harness.settings.unit_concurrency = 3;
        harness.fixture.images.fail_embed("c.jpg");

        let (result, ctx) = harness.process("o1").await;
        assert!(result.is_ok());
        assert_eq!(ctx.processed_units, 4);
        assert_eq!(ctx.failed_units, 1);
        assert_eq!(ctx.errors()[0].unit_id.as_deref(), Some("u3"));
    }
}
