//! Read access to the eGauge samples table (append-only time-series).
//!
//! Expected shape: one row per reading with at least a `device TEXT`
//! column and a `"timestamp" TIMESTAMPTZ` column. An index on
//! `(device, "timestamp" DESC)` keeps the freshness query cheap.

use std::fmt;

use ewatch_core::types::Timestamp;

/// Default table name when `SAMPLES_TABLE` is not set.
pub const DEFAULT_SAMPLES_TABLE: &str = "egauge";

/// A table name that is safe to interpolate into SQL.
///
/// Accepts `name` or `schema.name`, where each part matches
/// `[A-Za-z_][A-Za-z0-9_]*`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SamplesTable(String);

#[derive(Debug, thiserror::Error)]
#[error("Invalid samples table name '{0}'")]
pub struct SamplesTableError(pub String);

impl SamplesTable {
    pub fn parse(name: &str) -> Result<Self, SamplesTableError> {
        let name = name.trim();
        let parts: Vec<&str> = name.split('.').collect();
        if parts.len() > 2 || !parts.iter().all(|p| is_identifier(p)) {
            return Err(SamplesTableError(name.to_string()));
        }
        Ok(Self(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SamplesTable {
    fn default() -> Self {
        Self(DEFAULT_SAMPLES_TABLE.to_string())
    }
}

impl fmt::Display for SamplesTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn is_identifier(part: &str) -> bool {
    let mut chars = part.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Provides query operations for eGauge samples.
pub struct SampleRepo;

impl SampleRepo {
    /// SQL for the most recent sample at or after `$1` whose device is in `$2`.
    pub fn latest_timestamp_sql(table: &SamplesTable) -> String {
        format!(
            "SELECT \"timestamp\" FROM {table} \
             WHERE \"timestamp\" >= $1 AND device = ANY($2) \
             ORDER BY \"timestamp\" DESC \
             LIMIT 1"
        )
    }

    /// Timestamp of the newest sample from any of `devices` since `since`.
    ///
    /// Returns `Ok(None)` when no such sample exists.
    pub async fn latest_timestamp(
        pool: &sqlx::PgPool,
        table: &SamplesTable,
        devices: &[String],
        since: Timestamp,
    ) -> Result<Option<Timestamp>, sqlx::Error> {
        let query = Self::latest_timestamp_sql(table);
        sqlx::query_scalar::<_, Timestamp>(&query)
            .bind(since)
            .bind(devices)
            .fetch_optional(pool)
            .await
    }
}
