//! Per-kind retry policies and the executor that applies them.

use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;

use orbit_config::RetryPolicyConfig;

use crate::error::{ErrorKind, Result, WorkflowError};
use crate::events::{EventSink, WorkflowEvent};

/// Exponential backoff with a cap.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Growth per retry.
    pub multiplier: f64,
    /// Upper bound on one delay.
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// A policy that never retries.
    pub const NEVER: RetryPolicy = RetryPolicy {
        max_retries: 0,
        base_delay: Duration::ZERO,
        multiplier: 1.0,
        max_delay: Duration::ZERO,
    };

    const fn new(max_retries: u32, base_ms: u64, max_ms: u64) -> Self {
        Self {
            max_retries,
            base_delay: Duration::from_millis(base_ms),
            multiplier: 2.0,
            max_delay: Duration::from_millis(max_ms),
        }
    }

    /// Delay before retry number `retry` (1-based): `base × multiplier^(retry-1)`,
    /// capped at `max_delay`.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(i32::MAX as u32) as i32;
        let scaled = self.base_delay.as_secs_f64() * self.multiplier.powi(exponent);
        let capped = scaled.min(self.max_delay.as_secs_f64());
        if capped.is_finite() && capped > 0.0 {
            Duration::from_secs_f64(capped)
        } else {
            Duration::ZERO
        }
    }

    fn with_override(mut self, patch: &RetryPolicyConfig) -> Self {
        if let Some(retries) = patch.max_retries {
            self.max_retries = retries;
        }
        if let Some(ms) = patch.base_delay_ms {
            self.base_delay = Duration::from_millis(ms);
        }
        if let Some(m) = patch.multiplier {
            self.multiplier = m;
        }
        if let Some(ms) = patch.max_delay_ms {
            self.max_delay = Duration::from_millis(ms);
        }
        self
    }
}

/// One policy per error kind.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicies {
    policies: BTreeMap<ErrorKind, RetryPolicy>,
}

impl Default for RetryPolicies {
    fn default() -> Self {
        let policies = BTreeMap::from([
            (ErrorKind::AiService, RetryPolicy::new(3, 2_000, 30_000)),
            (ErrorKind::StorageAccess, RetryPolicy::new(5, 1_000, 60_000)),
            (ErrorKind::MetadataEmbedding, RetryPolicy::new(3, 2_000, 30_000)),
            (ErrorKind::DataStore, RetryPolicy::new(3, 500, 10_000)),
            (ErrorKind::Notification, RetryPolicy::new(2, 1_000, 10_000)),
            (ErrorKind::Configuration, RetryPolicy::NEVER),
            (ErrorKind::Unknown, RetryPolicy::new(1, 1_000, 5_000)),
        ]);
        Self { policies }
    }
}

impl RetryPolicies {
    /// Policy for `kind`.
    pub fn for_kind(&self, kind: ErrorKind) -> RetryPolicy {
        self.policies
            .get(&kind)
            .copied()
            .unwrap_or(RetryPolicy::NEVER)
    }

    /// Replace the policy for one kind.
    pub fn set(&mut self, kind: ErrorKind, policy: RetryPolicy) {
        self.policies.insert(kind, policy);
    }

    /// Apply `[workflow.retry.<kind>]` overrides on top of the defaults.
    pub fn with_overrides(mut self, overrides: &BTreeMap<String, RetryPolicyConfig>) -> Result<Self> {
        for (name, patch) in overrides {
            let kind: ErrorKind = name.parse()?;
            let policy = self.for_kind(kind).with_override(patch);
            self.policies.insert(kind, policy);
        }
        Ok(self)
    }

    /// A table where nothing is retried.
    pub fn none() -> Self {
        Self {
            policies: ErrorKind::ALL
                .into_iter()
                .map(|k| (k, RetryPolicy::NEVER))
                .collect(),
        }
    }
}

/// The final result of a retried operation.
#[derive(Debug)]
pub struct RetryOutcome<T> {
    /// Last attempt's result.
    pub result: Result<T>,
    /// Retries performed (attempts minus one).
    pub retries: u32,
}

/// Runs an operation, retrying each failure by the policy of its kind.
///
/// The policy is chosen per failure, so an operation whose failures
/// change kind between attempts uses whichever budget applies to the
/// failure at hand. Retries are counted across the whole run.
#[derive(Debug, Clone, Default)]
pub struct RetryExecutor {
    policies: RetryPolicies,
    events: Option<EventSink>,
}

impl RetryExecutor {
    /// Executor over a policy table.
    pub fn new(policies: RetryPolicies) -> Self {
        Self {
            policies,
            events: None,
        }
    }

    /// Report retries as events.
    pub fn with_events(mut self, events: Option<EventSink>) -> Self {
        self.events = events;
        self
    }

    /// The policy table.
    pub fn policies(&self) -> &RetryPolicies {
        &self.policies
    }

    /// Run `op` until it succeeds or its failure's budget is spent.
    pub async fn run<T, F, Fut>(&self, operation: &str, mut op: F) -> RetryOutcome<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut retries = 0u32;
        loop {
            let err = match op().await {
                Ok(value) => {
                    return RetryOutcome {
                        result: Ok(value),
                        retries,
                    };
                }
                Err(e) => e,
            };

            let kind = err.kind();
            let policy = self.policies.for_kind(kind);
            if retries >= policy.max_retries {
                if policy.max_retries > 0 {
                    tracing::warn!(
                        operation,
                        kind = %kind,
                        attempts = retries + 1,
                        error = %err,
                        "retry budget exhausted"
                    );
                }
                return RetryOutcome {
                    result: Err(err),
                    retries,
                };
            }

            retries += 1;
            let delay = policy.delay_for(retries);
            tracing::warn!(
                operation,
                kind = %kind,
                attempt = retries,
                max_retries = policy.max_retries,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "operation failed, retrying"
            );
            crate::events::emit(
                self.events.as_ref(),
                WorkflowEvent::Retrying {
                    operation: operation.to_string(),
                    kind,
                    attempt: retries,
                    delay_ms: delay.as_millis() as u64,
                },
            );
            tokio::time::sleep(delay).await;
        }
    }

    /// [`run`](Self::run), adding the retries to `counter`.
    pub async fn run_counted<T, F, Fut>(&self, operation: &str, counter: &mut u32, op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let outcome = self.run(operation, op).await;
        *counter += outcome.retries;
        outcome.result
    }
}

/// Convenience for failing with a fixed kind.
pub(crate) fn fail<T>(kind: ErrorKind, message: impl Into<String>) -> Result<T> {
    Err(WorkflowError::new(kind, message))
}
