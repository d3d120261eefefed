//! PostgreSQL access for the liveness monitor.
//!
//! The monitor only reads: it asks whether a set of devices has written
//! a sample since some cutoff. Schema ownership stays with whatever
//! ingests the eGauge readings.

use std::time::Duration;

use sqlx::postgres::PgPoolOptions;

pub mod freshness;
pub mod samples;

pub use freshness::PgFreshnessChecker;
pub use samples::{SampleRepo, SamplesTable, SamplesTableError};

pub type DbPool = sqlx::PgPool;

/// How long to wait for a free connection before a query fails.
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(10);

/// Create a connection pool from a database URL.
pub async fn create_pool(database_url: &str, max_connections: u32) -> Result<DbPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(ACQUIRE_TIMEOUT)
        .connect(database_url)
        .await
}

/// Round-trip a trivial query to confirm the database is reachable.
pub async fn health_check(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}
