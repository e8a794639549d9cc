//! Database pool and schema migrations.
//!
//! Violations and driver profiles live in PostgreSQL. The schema is kept in
//! `migrations/` and applied by `init-db` and on `serve` startup.

use std::time::Duration;

use sqlx::{Pool, Postgres, postgres::PgPoolOptions};

/// PostgreSQL connection pool shared by the handlers.
pub type DbPool = Pool<Postgres>;

/// Open a pool against `database_url`.
///
/// # Errors
///
/// Fails when the URL is malformed or the first connection cannot be made,
/// so a misconfigured server stops at startup instead of on the first report.
pub async fn create_pool(database_url: &str) -> Result<DbPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(5)
        .acquire_timeout(Duration::from_secs(5))
        .connect(database_url)
        .await
}

/// Apply pending migrations from `migrations/`.
///
/// Applied versions are tracked in `_sqlx_migrations`, so running this on an
/// initialized database is a no-op.
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}
