//! Connection pool setup.

use std::time::{Duration, Instant};

use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::info;

use etl_core::defaults::{DB_ACQUIRE_TIMEOUT_SECS, DB_MAX_CONNECTIONS};
use etl_core::Result;

/// Pool sizing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    pub max_connections: u32,
    /// Wait for a free connection before a query fails.
    pub acquire_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: DB_MAX_CONNECTIONS,
            acquire_timeout: Duration::from_secs(DB_ACQUIRE_TIMEOUT_SECS),
        }
    }
}

impl PoolConfig {
    pub fn with_max_connections(mut self, n: u32) -> Self {
        self.max_connections = n.max(1);
        self
    }

    pub fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }
}

/// Open a pool against `database_url`.
///
/// Connects eagerly, so an unreachable server fails here rather than on the
/// first insert.
pub async fn connect_pool(database_url: &str, config: &PoolConfig) -> Result<PgPool> {
    let start = Instant::now();

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(config.acquire_timeout)
        .connect(database_url)
        .await?;

    info!(
        subsystem = "database",
        component = "pool",
        op = "connect",
        max_connections = config.max_connections,
        pool_size = pool.size(),
        duration_ms = start.elapsed().as_millis() as u64,
        "Database connection pool established"
    );
    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_pool_config() {
        let config = PoolConfig::default();
        assert_eq!(config.max_connections, 10);
        assert_eq!(config.acquire_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_pool_never_sized_to_zero() {
        let config = PoolConfig::default()
            .with_max_connections(0)
            .with_acquire_timeout(Duration::from_secs(2));
        assert_eq!(config.max_connections, 1);
        assert_eq!(config.acquire_timeout, Duration::from_secs(2));
    }
}
