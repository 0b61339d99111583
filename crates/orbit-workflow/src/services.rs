//! Builds the connection pool from `[[services]]`.

use std::time::Duration;

use orbit_config::{OrbitConfig, ServiceEntry};
use orbit_rpc::{ConnectionPool, PoolDefaults, ServiceConfig};

use crate::error::{Result, WorkflowError};

/// Client settings for one configured service. Without its own token the
/// service gets `default_token`.
pub fn service_config(entry: &ServiceEntry, default_token: Option<&str>) -> ServiceConfig {
    let mut config = ServiceConfig::new(&entry.name, &entry.url)
        .with_timeout(Duration::from_secs(entry.timeout_secs))
        .with_retries(entry.retries)
        .with_retry_delay(Duration::from_millis(entry.retry_delay_ms));
    for (key, value) in &entry.headers {
        config = config.with_header(key, value);
    }
    if let Some(token) = entry.bearer_token.as_deref().or(default_token) {
        config = config.with_bearer_token(token);
    }
    config
}

/// A pool with every configured service registered.
///
/// Clients are created but not contacted; the handshake happens on first
/// use.
pub fn connect_pool(config: &OrbitConfig) -> Result<ConnectionPool> {
    let workflow = config.workflow();
    let pool = ConnectionPool::with_defaults(PoolDefaults {
        bearer_token: workflow.service_token.clone(),
        ..PoolDefaults::default()
    });
    for entry in &config.services {
        pool.register(service_config(entry, workflow.service_token.as_deref()))
            .map_err(|e| WorkflowError::Configuration(format!("service '{}': {e}", entry.name)))?;
        tracing::debug!(service = %entry.name, url = %entry.url, "service registered");
    }
    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::testing::assert_kind;

    #[test]
    fn test_registers_every_service() {
        let config = OrbitConfig::from_toml(
            r#"
            [workflow]
            service_token = "shared"

            [[services]]
            name = "data"
            url = "http://localhost:8081/rpc"

            [[services]]
            name = "storage"
            url = "http://localhost:8082/rpc"
            bearer_token = "own"
            "#,
        )
        .unwrap();

        let pool = connect_pool(&config).unwrap();
        let mut names = pool.names();
        names.sort();
        assert_eq!(names, vec!["data", "storage"]);
        assert_eq!(
            pool.get("data").unwrap().config().bearer_token.as_deref(),
            Some("shared")
        );
        assert_eq!(
            pool.get("storage").unwrap().config().bearer_token.as_deref(),
            Some("own")
        );
    }

    #[test]
    fn test_bad_url_is_configuration_error() {
        let mut config = OrbitConfig::new();
        config.services.push(ServiceEntry::new("ai", "not a url"));
        assert_kind(&connect_pool(&config).map(|_| ()), ErrorKind::Configuration);
    }
}
