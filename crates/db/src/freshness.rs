//! [`FreshnessChecker`] backed by the samples table.

use async_trait::async_trait;
use ewatch_core::types::Timestamp;
use ewatch_core::{DeviceGroup, FreshnessChecker, FreshnessWindow};

use crate::samples::{SampleRepo, SamplesTable};
use crate::DbPool;

/// Answers freshness questions with a single indexed lookup per group.
///
/// Query errors are logged and reported as "not fresh" so a database
/// outage shows up as silent devices rather than a dead monitor.
pub struct PgFreshnessChecker {
    pool: DbPool,
    table: SamplesTable,
}

impl PgFreshnessChecker {
    pub fn new(pool: DbPool, table: SamplesTable) -> Self {
        Self { pool, table }
    }
}

#[async_trait]
impl FreshnessChecker for PgFreshnessChecker {
    async fn has_recent_record(
        &self,
        group: &DeviceGroup,
        window: FreshnessWindow,
        now: Timestamp,
    ) -> bool {
        let since = window.cutoff(now);
        match SampleRepo::latest_timestamp(&self.pool, &self.table, group.devices(), since).await {
            Ok(Some(latest)) => {
                tracing::debug!(group = group.label(), %latest, "Recent sample found");
                true
            }
            Ok(None) => false,
            Err(e) => {
                tracing::error!(
                    group = group.label(),
                    table = %self.table,
                    error = %e,
                    "Error checking recent data",
                );
                false
            }
        }
    }

    async fn close(&self) {
        self.pool.close().await;
        tracing::info!("Database pool closed");
    }
}
