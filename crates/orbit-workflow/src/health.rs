//! System health checks used for pre-flight recovery and the health tool.

use std::collections::BTreeMap;
use std::time::Instant;

use chrono::{DateTime, Utc};
use orbit_rpc::ConnectionPool;
use serde::{Deserialize, Serialize};

use crate::collaborators::{BlobStore, DataStore};

/// Component name of the data store in a report.
pub const DATA_STORE: &str = "data_store";
/// Component name of the blob store in a report.
pub const BLOB_STORE: &str = "blob_store";

/// Overall verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    /// Everything answered.
    Healthy,
    /// The stores answered; some tool service did not.
    Degraded,
    /// The data store or the blob store did not answer.
    Unhealthy,
}

/// Health of one component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub healthy: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub latency_ms: u64,
}

/// Result of a full health check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub components: BTreeMap<String, ComponentHealth>,
    pub checked_at: DateTime<Utc>,
}

impl HealthReport {
    /// Whether the workflow can run.
    pub fn is_healthy(&self) -> bool {
        self.status == HealthStatus::Healthy
    }

    /// Names of failing components.
    pub fn failing(&self) -> Vec<&str> {
        self.components
            .iter()
            .filter(|(_, c)| !c.healthy)
            .map(|(name, _)| name.as_str())
            .collect()
    }
}

/// Probe both stores and every pooled service.
///
/// A tool service that answers with an error still counts as healthy:
/// it was reachable, which is all recovery needs to know.
pub async fn check(data: &dyn DataStore, blobs: &dyn BlobStore, pool: &ConnectionPool) -> HealthReport {
    let data_probe = async {
        let started = Instant::now();
        let result = data.ping().await;
        component(result.err().map(|e| e.to_string()), started)
    };
    let blob_probe = async {
        let started = Instant::now();
        let result = blobs.ping().await;
        component(result.err().map(|e| e.to_string()), started)
    };
    let services_probe = async {
        let started = Instant::now();
        let results = pool.ping_all().await;
        (results, started.elapsed().as_millis() as u64)
    };

    let (data_health, blob_health, (pings, services_ms)) =
        tokio::join!(data_probe, blob_probe, services_probe);

    let mut components = BTreeMap::new();
    let stores_ok = data_health.healthy && blob_health.healthy;
    components.insert(DATA_STORE.to_string(), data_health);
    components.insert(BLOB_STORE.to_string(), blob_health);

    let mut services_ok = true;
    for (name, result) in pings {
        let health = match result {
            Ok(_) => ComponentHealth {
                healthy: true,
                detail: None,
                latency_ms: services_ms,
            },
            Err(e) if e.service_reachable() => ComponentHealth {
                healthy: true,
                detail: Some(format!("reachable: {e}")),
                latency_ms: services_ms,
            },
            Err(e) => {
                services_ok = false;
                ComponentHealth {
                    healthy: false,
                    detail: Some(e.to_string()),
                    latency_ms: services_ms,
                }
            }
        };
        components.insert(name, health);
    }

    let status = match (stores_ok, services_ok) {
        (false, _) => HealthStatus::Unhealthy,
        (true, false) => HealthStatus::Degraded,
        (true, true) => HealthStatus::Healthy,
    };

    let report = HealthReport {
        status,
        components,
        checked_at: Utc::now(),
    };
    if report.is_healthy() {
        tracing::debug!("health check passed");
    } else {
        tracing::warn!(status = ?report.status, failing = ?report.failing(), "health check failed");
    }
    report
}

/// Whether there is work to do and the workflow could do it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadinessReport {
    /// Paid orders still at the `pending` stage.
    pub pending_orders_count: u64,
    /// The bucket could be listed.
    pub storage_accessible: bool,
    /// At least one order is waiting and storage is accessible.
    pub system_ready: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Count pending paid orders and confirm the bucket can be listed.
///
/// Failures are reported in the result, never raised: a store that
/// cannot answer counts as zero orders or inaccessible storage.
pub async fn readiness(data: &dyn DataStore, blobs: &dyn BlobStore) -> ReadinessReport {
    let (count, listing) = tokio::join!(data.count_pending_orders(), blobs.list(""));

    let mut problems = Vec::new();
    let pending_orders_count = count.unwrap_or_else(|e| {
        problems.push(e.to_string());
        0
    });
    let storage_accessible = match listing {
        Ok(_) => true,
        Err(e) => {
            problems.push(e.to_string());
            false
        }
    };

    let report = ReadinessReport {
        pending_orders_count,
        storage_accessible,
        system_ready: pending_orders_count > 0 && storage_accessible,
        error: (!problems.is_empty()).then(|| problems.join("; ")),
        timestamp: Utc::now(),
    };
    tracing::info!(
        pending = report.pending_orders_count,
        storage_accessible = report.storage_accessible,
        ready = report.system_ready,
        "workflow readiness"
    );
    report
}

fn component(error: Option<String>, started: Instant) -> ComponentHealth {
    ComponentHealth {
        healthy: error.is_none(),
        detail: error,
        latency_ms: started.elapsed().as_millis() as u64,
    }
}
