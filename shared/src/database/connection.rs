use std::time::Duration;

use sqlx::{
    postgres::{PgPool, PgPoolOptions},
    Pool, Postgres,
};
use tracing::{debug, info, warn};

use super::{DatabaseConfig, DatabaseError, DatabaseResult};

/// Type alias for the database pool
pub type DbPool = Pool<Postgres>;

fn pool_options(config: &DatabaseConfig) -> PgPoolOptions {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.connect_timeout))
        .idle_timeout(Some(Duration::from_secs(config.idle_timeout)))
}

/// Create a connection pool, retrying while the database is not reachable yet.
pub async fn create_connection_pool(config: &DatabaseConfig) -> DatabaseResult<DbPool> {
    if config.url.trim().is_empty() {
        return Err(DatabaseError::Config("database url is empty".to_string()));
    }

    let attempts = config.connect_retries.max(1);
    let delay = Duration::from_secs(config.retry_delay_secs);
    let mut attempt = 1;

    loop {
        debug!(attempt, max_connections = config.max_connections, "Connecting to database");

        match pool_options(config).connect(&config.url).await {
            Ok(pool) => {
                info!(attempt, "Database connection pool created");
                return Ok(pool);
            }
            Err(source) if attempt >= attempts => {
                return Err(DatabaseError::RetriesExhausted { attempts, source });
            }
            Err(e) => {
                warn!(
                    attempt,
                    retry_in_secs = delay.as_secs(),
                    error = %e,
                    "Database connection failed, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

/// Cheap liveness probe used by the health endpoint
pub async fn health_check(pool: &PgPool) -> DatabaseResult<()> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_url_is_rejected() {
        let config = DatabaseConfig {
            url: "  ".to_string(),
            ..Default::default()
        };

        let result = tokio_test::block_on(create_connection_pool(&config));
        assert!(matches!(result, Err(DatabaseError::Config(_))));
    }

    #[test]
    fn test_default_config() {
        let config = DatabaseConfig::default();
        assert_eq!(config.max_connections, 20);
        assert_eq!(config.retry_delay_secs, 3);
        assert!(config.connect_retries > 0);
    }
}
