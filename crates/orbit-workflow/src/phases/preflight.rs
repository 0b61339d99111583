//! Pre-flight validation.

use super::PhaseEnv;
use crate::context::WorkflowContext;
use crate::error::{Result, WorkflowError};

/// Check configuration, then probe both stores once each.
///
/// Probes are not retried: recovery from a failed pre-flight is a health
/// check followed by one more pre-flight, driven by the orchestrator.
pub(crate) async fn run(env: &PhaseEnv<'_>, ctx: &WorkflowContext) -> Result<()> {
    let mut problems = Vec::new();

    if ctx.order_id.trim().is_empty() {
        problems.push("order id is required".to_string());
    }
    if env.settings.bucket.trim().is_empty() {
        problems.push("storage bucket is not configured".to_string());
    }

    let missing: Vec<&str> = env
        .settings
        .required_services
        .iter()
        .filter(|name| !env.pool.contains(name))
        .map(String::as_str)
        .collect();
    if !missing.is_empty() {
        problems.push(format!("required services not configured: {}", missing.join(", ")));
    }

    if !problems.is_empty() {
        return Err(WorkflowError::Configuration(problems.join("; ")));
    }

    env.collaborators.data.ping().await?;
    env.collaborators.blobs.ping().await?;

    tracing::debug!(order_id = %ctx.order_id, "pre-flight checks passed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::orchestrator::WorkflowSettings;
    use crate::retry::RetryExecutor;
    use crate::testing::{Fixture, assert_kind};
    use orbit_rpc::ConnectionPool;

    async fn preflight(fixture: &Fixture, settings: &WorkflowSettings, order_id: &str) -> Result<()> {
        let collaborators = fixture.collaborators();
        let retry = RetryExecutor::default();
        let pool = ConnectionPool::new();
        let env = PhaseEnv {
            collaborators: &collaborators,
            settings,
            retry: &retry,
            pool: &pool,
            events: None,
        };
        run(&env, &WorkflowContext::new(order_id, "c1")).await
    }

    #[tokio::test]
    async fn test_passes_with_reachable_stores() {
        let fixture = Fixture::new();
        assert!(preflight(&fixture, &WorkflowSettings::default(), "o1").await.is_ok());
    }

    #[tokio::test]
    async fn test_collects_configuration_problems() {
        let fixture = Fixture::new();
        let settings = WorkflowSettings {
            bucket: String::new(),
            required_services: vec!["ai".into(), "data".into()],
            ..WorkflowSettings::default()
        };
        let result = preflight(&fixture, &settings, " ").await;
        assert_kind(&result, ErrorKind::Configuration);
        let message = result.unwrap_err().to_string();
        assert!(message.contains("order id"));
        assert!(message.contains("bucket"));
        assert!(message.contains("ai, data"));
    }

    #[tokio::test]
    async fn test_unreachable_store_fails() {
        let fixture = Fixture::new();
        fixture.data.set_reachable(false);
        assert_kind(
            &preflight(&fixture, &WorkflowSettings::default(), "o1").await,
            ErrorKind::DataStore,
        );
    }
}
