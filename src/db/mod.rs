//! Postgres pool, embedded migrations and the `/health` database check

use std::time::{Duration, Instant};

use sqlx::migrate::{MigrateError, Migrator};
use sqlx::postgres::{PgPool, PgPoolOptions};

use crate::config::Config;

/// Schema for users, sessions, coins, wallets, the ledger, blog and tickets
static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("Failed to connect to database: {0}")]
    Connect(#[source] sqlx::Error),

    #[error("Failed to run migrations: {0}")]
    Migrate(#[from] MigrateError),

    #[error("Database health check failed: {0}")]
    Health(#[source] sqlx::Error),
}

/// Connect using the pool settings from `Config`
pub async fn create_pool(config: &Config) -> Result<PgPool, DbError> {
    tracing::info!(
        url = %config.database_url_masked(),
        max_connections = config.db_max_connections,
        "Connecting to database"
    );

    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .acquire_timeout(Duration::from_secs(config.db_acquire_timeout_seconds))
        .idle_timeout(Duration::from_secs(600))
        .connect(&config.database_url)
        .await
        .map_err(DbError::Connect)?;

    Ok(pool)
}

/// Apply any pending migrations. Returns the number of migrations known to the
/// binary.
pub async fn run_migrations(pool: &PgPool) -> Result<usize, DbError> {
    let known = MIGRATOR.iter().count();
    let latest = MIGRATOR.iter().map(|m| m.version).max().unwrap_or_default();

    MIGRATOR.run(pool).await?;

    tracing::info!(known, latest, "Database schema up to date");
    Ok(known)
}

/// Round-trip a trivial query; the elapsed time is reported by `/health`
pub async fn check_health(pool: &PgPool) -> Result<Duration, DbError> {
    let started = Instant::now();
    sqlx::query("SELECT 1")
        .execute(pool)
        .await
        .map_err(DbError::Health)?;
    Ok(started.elapsed())
}
