//! Database connection pooling utilities

use crate::config::{DatabaseConfig, ReplicaConfig};
use crate::error::{Error, Result};
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;

/// Type alias for the database pool
pub type DbPool = PgPool;

/// Create a new database connection pool
///
/// # Arguments
///
/// * `config` - Database configuration
///
/// # Returns
///
/// A configured PostgreSQL connection pool
///
/// # Errors
///
/// Returns an error if the pool cannot be created or if the connection fails
pub async fn create_pool(config: &DatabaseConfig) -> Result<DbPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(Duration::from_secs(30))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .connect(&config.connection_url())
        .await?;

    tracing::info!(
        "Database connection pool created with {} max connections",
        config.max_connections
    );

    Ok(pool)
}

/// Run database migrations
///
/// # Arguments
///
/// * `pool` - Database connection pool
///
/// # Returns
///
/// Ok if migrations succeed
///
/// # Errors
///
/// Returns an error if migrations fail
pub async fn run_migrations(_pool: &DbPool) -> Result<()> {
    // Note: Migrations are run manually using database/run-migrations.sh
    // This function is a placeholder for future automatic migration support
    // For now, it just logs a message
    tracing::info!("Database migrations should be run manually (see database/README.md)");
    Ok(())
}

/// Check database connection health
///
/// # Arguments
///
/// * `pool` - Database connection pool
///
/// # Returns
///
/// Ok if the database is healthy
///
/// # Errors
///
/// Returns an error if the connection check fails
pub async fn check_health(pool: &DbPool) -> Result<()> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// Build the replica `PgPool`s the resolver's provider wraps in circuit
/// breaker slots. This is the external collaborator §4.6/§6.3 of the
/// routing contract describes only by the environment variables it
/// consumes: `DB_REPLICA_HOSTS` is parsed into `host:port` pairs, and the
/// idle/open connection bounds are clamped before being handed to
/// `PgPoolOptions`.
///
/// Returns an empty `Vec` (zero replicas, every read falls through to
/// primary) if `DB_REPLICA_HOSTS` is unset.
///
/// # Errors
///
/// Returns an error if a host entry is malformed or a pool cannot connect.
pub async fn create_replica_pools() -> Result<Vec<PgPool>> {
    let config = ReplicaConfig::from_env().map_err(|_| Error::config("invalid replica configuration"))?;

    let mut pools = Vec::with_capacity(config.hosts.len());
    for host_port in &config.hosts {
        let (host, port) = host_port
            .split_once(':')
            .ok_or_else(|| Error::config(format!("invalid DB_REPLICA_HOSTS entry: {host_port}")))?;
        let url = format!(
            "postgres://{}:{}@{}:{}/{}",
            config.user, config.password, host, port, config.db_name
        );

        let pool = PgPoolOptions::new()
            .max_connections(config.max_open_connections)
            .min_connections(config.max_idle_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .max_lifetime(Duration::from_secs(1800))
            .connect(&url)
            .await?;

        tracing::info!(host = %host_port, "Replica connection pool created");
        pools.push(pool);
    }

    Ok(pools)
}
