//! Database pool construction and migrations.

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;

/// Create the shared connection pool.
///
/// Pool sizing matches what the gateway is provisioned for: webhook bursts
/// from Stripe plus steady API traffic. Connections are health-checked on
/// acquire and recycled hourly so a restarted database is picked up without
/// a process restart.
pub async fn create_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .min_connections(5)
        .max_connections(25)
        .acquire_timeout(Duration::from_secs(10))
        .idle_timeout(Duration::from_secs(30 * 60))
        .max_lifetime(Duration::from_secs(60 * 60))
        .test_before_acquire(true)
        .connect(database_url)
        .await
}

/// Apply pending migrations from the workspace `migrations/` directory.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("../../migrations").run(pool).await
}
